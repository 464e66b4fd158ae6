//! # Durable Job Queue
//!
//! A PostgreSQL-backed work queue for deckcast's background jobs.
//!
//! ## Guarantees
//!
//! - **Atomic enqueue**: exactly one job row per successful submission
//! - **Exclusive hand-off**: `FOR UPDATE SKIP LOCKED` claiming means no two
//!   workers ever run the same job attempt
//! - **Automatic retries**: failed attempts are re-offered after a fixed
//!   back-off schedule until the attempt ceiling is reached
//! - **Timeout enforcement**: attempts running past their wall-clock budget
//!   are failed and retried like any other failure
//! - **Immutable outcomes**: once a job is `finished` or `failed`, late
//!   reports from stale workers are discarded
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                submission / status              │
//! │        (enqueue + fetch, one round-trip each)   │
//! └─────────────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │                    JobStore                     │
//! │          (PostgreSQL `jobs` table)              │
//! └─────────────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │                   WorkerPool                    │
//! │   (claims jobs, runs handlers under timeout)    │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod postgres;
pub mod retry;
pub mod store;
pub mod worker;

pub use memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;
pub use retry::RetryPolicy;
pub use store::{
    ClaimedJob, FailureOutcome, JobOptions, JobSnapshot, JobState, JobStore, NewJob, StoreError,
};
pub use worker::{JobResult, WorkerPool, WorkerPoolConfig, WorkerPoolError, WorkerPoolStatus};
