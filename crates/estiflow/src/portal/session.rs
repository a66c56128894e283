//! Drives the estimating portal over HTTP. The portal has no API contract,
//! so the driver scripts the same interactive sequence a user performs:
//! log in, upload the SOF, trigger generation, download the result. Cookies
//! live only for the duration of one call; a retry starts a fresh session.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info_span};

use crate::config::PortalConfig;
use crate::job::spec::JobSpec;
use crate::portal::{place_estimate, AutomationError, EstimatePortal, PortalMeta};

pub struct HttpPortalDriver {
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct UploadDto {
    estimate_id: String,
    #[serde(default)]
    estimate_no: Option<String>,
}

impl HttpPortalDriver {
    pub fn new(config: &PortalConfig) -> Result<Self, AutomationError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// One session = one cookie jar. Never reused across calls.
    fn session(&self) -> Result<reqwest::blocking::Client, AutomationError> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| AutomationError::Unavailable(e.to_string()))
    }

    fn login(
        &self,
        session: &reqwest::blocking::Client,
        log: &mut Vec<String>,
    ) -> Result<(), AutomationError> {
        let response = session
            .post(format!("{}/login", self.base_url))
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .map_err(|e| AutomationError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AutomationError::Login(format!(
                "login returned status {}",
                response.status()
            )));
        }
        log.push("authenticated".to_string());
        Ok(())
    }

    fn upload_sof(
        &self,
        session: &reqwest::blocking::Client,
        job: &JobSpec,
        sof_path: &Path,
        log: &mut Vec<String>,
    ) -> Result<UploadDto, AutomationError> {
        let bytes = std::fs::read(sof_path).map_err(|e| AutomationError::Io {
            path: sof_path.to_path_buf(),
            source: e,
        })?;

        let part = reqwest::blocking::multipart::Part::bytes(bytes)
            .file_name(format!("SOF-{}.pdf", job.job_id))
            .mime_str("application/pdf")
            .map_err(|e| AutomationError::Upload(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("job_id", job.job_id.clone())
            .part("sof", part);

        let response = session
            .post(format!("{}/estimates", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| AutomationError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AutomationError::Upload(format!(
                "upload returned status {}",
                response.status()
            )));
        }

        let dto: UploadDto = response
            .json()
            .map_err(|e| AutomationError::Upload(e.to_string()))?;
        log.push(format!("uploaded SOF, estimate id {}", dto.estimate_id));
        Ok(dto)
    }

    fn download_estimate(
        &self,
        session: &reqwest::blocking::Client,
        estimate_id: &str,
        log: &mut Vec<String>,
    ) -> Result<Vec<u8>, AutomationError> {
        let response = session
            .get(format!("{}/estimates/{}/pdf", self.base_url, estimate_id))
            .send()
            .map_err(|e| AutomationError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AutomationError::Download(format!(
                "download returned status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| AutomationError::Download(e.to_string()))?
            .to_vec();
        log.push(format!("downloaded {} bytes", bytes.len()));
        Ok(bytes)
    }
}

impl EstimatePortal for HttpPortalDriver {
    fn generate_estimate(
        &self,
        job: &JobSpec,
        sof_path: &Path,
        out_path: &Path,
    ) -> Result<PortalMeta, AutomationError> {
        let _span = info_span!("portal.session", job_id = %job.job_id).entered();
        let mut log = Vec::new();

        let session = self.session()?;
        self.login(&session, &mut log)?;
        let upload = self.upload_sof(&session, job, sof_path, &mut log)?;
        let bytes = self.download_estimate(&session, &upload.estimate_id, &mut log)?;

        place_estimate(out_path, &bytes)?;
        log.push(format!("estimate placed at {}", out_path.display()));
        debug!(job_id = %job.job_id, "portal session complete");

        Ok(PortalMeta {
            estimate_no: upload.estimate_no,
            session_log: log,
        })
    }
}
