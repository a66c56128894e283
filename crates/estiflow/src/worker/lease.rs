//! Per-job mutual exclusion. A job id must never be processed by two workers
//! at once: a second dispatch would duplicate CRM opportunities or race on
//! the canonical destination files. The lease is held for the whole run and
//! released on drop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct JobLeases {
    held: Mutex<HashSet<String>>,
}

impl JobLeases {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the lease for `job_id`, or `None` when another worker holds it.
    pub fn try_acquire(self: &Arc<Self>, job_id: &str) -> Option<JobLease> {
        let mut held = self.held.lock().expect("lease lock");
        if held.contains(job_id) {
            return None;
        }
        held.insert(job_id.to_string());
        Some(JobLease {
            leases: Arc::clone(self),
            job_id: job_id.to_string(),
        })
    }

    pub fn is_held(&self, job_id: &str) -> bool {
        self.held.lock().expect("lease lock").contains(job_id)
    }
}

/// RAII guard for one job id.
pub struct JobLease {
    leases: Arc<JobLeases>,
    job_id: String,
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.leases
            .held
            .lock()
            .expect("lease lock")
            .remove(&self.job_id);
    }
}
