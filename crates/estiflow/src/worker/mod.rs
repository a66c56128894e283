pub mod job;
pub mod lease;
pub mod pool;

pub use crate::error::WorkerError;
pub use job::DispatchHandle;
pub use lease::{JobLease, JobLeases};
pub use pool::WorkerPool;
