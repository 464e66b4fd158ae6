//! Worker-side machinery: the claim/execute pool.

mod pool;

pub use pool::{
    JobHandler, JobResult, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus,
};
