use std::path::PathBuf;

use crate::crm::OpportunityRecord;
use crate::extract::EstimateResult;
use crate::job::spec::JobSpec;
use crate::notify::NotifyOutcome;
use crate::portal::PortalMeta;
use crate::store::paths::{CanonicalPaths, JobDirs};

pub struct PipelineContext {
    // Input
    pub job: JobSpec,
    pub dirs: JobDirs,

    // Stage 1 result: guaranteed Some after create_opportunity
    pub opportunity: Option<OpportunityRecord>,

    // Stage 2 results: guaranteed Some after generate_sof
    pub sof_path: Option<PathBuf>,
    pub sof_fingerprint: Option<String>,

    // Stage 3 results: guaranteed Some after run_portal
    pub portal: Option<PortalMeta>,
    pub estimate_path: Option<PathBuf>,

    // Stage 4 result
    pub estimate: Option<EstimateResult>,

    // Stage 5 result
    pub canonical: Option<CanonicalPaths>,

    // Stage 6 result
    pub notify: Option<NotifyOutcome>,

    // Non-fatal warnings collected along the way
    pub warnings: Vec<String>,
}

impl PipelineContext {
    pub fn new(job: JobSpec, dirs: JobDirs) -> Self {
        Self {
            job,
            dirs,
            opportunity: None,
            sof_path: None,
            sof_fingerprint: None,
            portal: None,
            estimate_path: None,
            estimate: None,
            canonical: None,
            notify: None,
            warnings: Vec::new(),
        }
    }
}
