use serde::Serialize;
use uuid::Uuid;

use crate::job::spec::JobSpec;

/// Opaque receipt for an accepted dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchHandle {
    pub dispatch_id: String,
    pub job_id: String,
}

impl DispatchHandle {
    pub fn new(job_id: &str) -> Self {
        Self {
            dispatch_id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
        }
    }
}

/// A job travelling through the queue.
#[derive(Debug, Clone)]
pub(crate) struct QueuedJob {
    pub job: JobSpec,
    pub dispatch_id: String,
}
