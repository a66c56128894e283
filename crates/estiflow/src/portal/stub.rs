//! Stand-in portal: copies the uploaded SOF back as the "estimate". Keeps the
//! whole pipeline runnable end to end before portal credentials exist, and
//! gives tests a deterministic driver.

use std::path::Path;

use crate::job::spec::JobSpec;
use crate::portal::{place_estimate, AutomationError, EstimatePortal, PortalMeta};

#[derive(Debug, Default)]
pub struct StubPortal {
    estimate_no: Option<String>,
}

impl StubPortal {
    pub fn new() -> Self {
        Self { estimate_no: None }
    }

    /// Stub that reports a fixed estimate number, for exercising the
    /// estimate-number filing path.
    pub fn with_estimate_no(estimate_no: &str) -> Self {
        Self {
            estimate_no: Some(estimate_no.to_string()),
        }
    }
}

impl EstimatePortal for StubPortal {
    fn generate_estimate(
        &self,
        _job: &JobSpec,
        sof_path: &Path,
        out_path: &Path,
    ) -> Result<PortalMeta, AutomationError> {
        let bytes = std::fs::read(sof_path).map_err(|e| AutomationError::Io {
            path: sof_path.to_path_buf(),
            source: e,
        })?;
        place_estimate(out_path, &bytes)?;

        Ok(PortalMeta {
            estimate_no: self.estimate_no.clone(),
            session_log: vec!["stub portal copied SOF as estimate".to_string()],
        })
    }
}
