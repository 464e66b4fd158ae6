// Public API DTOs shared by the HTTP server, the worker, and clients.

mod jobs;
mod summaries;

pub use jobs::*;
pub use summaries::*;
