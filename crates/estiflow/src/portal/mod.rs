pub mod session;
pub mod stub;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DriverKind, PortalConfig};
use crate::job::spec::JobSpec;

pub use session::HttpPortalDriver;
pub use stub::StubPortal;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Portal unreachable: {0}")]
    Unavailable(String),

    #[error("Portal login failed: {0}")]
    Login(String),

    #[error("SOF upload failed: {0}")]
    Upload(String),

    #[error("Estimate download failed: {0}")]
    Download(String),

    #[error("Downloaded estimate is not a usable PDF: {0}")]
    BadDownload(String),

    #[error("Failed to stage estimate file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the portal session reported. The session log is persisted with the
/// stage result so a failed run can be diagnosed without re-driving the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalMeta {
    #[serde(default)]
    pub estimate_no: Option<String>,
    #[serde(default)]
    pub session_log: Vec<String>,
}

/// The third-party estimating application, modeled as one blocking remote
/// procedure: upload the SOF, trigger generation, download the estimate PDF
/// into `out_path`. Implementations must not assume any prior session state
/// survived; every call authenticates from scratch. On failure `out_path` is
/// left untouched.
pub trait EstimatePortal: Send + Sync {
    fn generate_estimate(
        &self,
        job: &JobSpec,
        sof_path: &Path,
        out_path: &Path,
    ) -> Result<PortalMeta, AutomationError>;
}

/// Places verified bytes at `out_path` via a temporary sibling so a failed
/// download never corrupts the working directory.
pub(crate) fn place_estimate(out_path: &Path, bytes: &[u8]) -> Result<(), AutomationError> {
    if bytes.is_empty() {
        return Err(AutomationError::BadDownload("empty download".to_string()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(AutomationError::BadDownload(
            "missing PDF header".to_string(),
        ));
    }
    crate::store::filesystem::write_bytes(out_path, bytes).map_err(|e| AutomationError::Io {
        path: out_path.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })
}

/// Builds the configured portal implementation.
pub fn driver_from_config(
    config: &PortalConfig,
) -> Result<std::sync::Arc<dyn EstimatePortal>, AutomationError> {
    match config.driver {
        DriverKind::Http => Ok(std::sync::Arc::new(HttpPortalDriver::new(config)?)),
        DriverKind::Stub => Ok(std::sync::Arc::new(StubPortal::new())),
    }
}
