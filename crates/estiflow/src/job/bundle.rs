//! The persisted intake document: one `job.json` per captured job, holding the
//! building geometry and scope alongside the job header. Written once by
//! intake and read back by anything that needs the original capture.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::job::spec::{Customer, JobSpec, LineItem, Project, ProjectSource};
use crate::store::filesystem::{read_json, write_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpeningKind {
    Door,
    Dock,
    Window,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opening {
    #[serde(rename = "type")]
    pub kind: OpeningKind,
    pub width_ft: f64,
    pub height_ft: f64,
    pub wall_index: usize,
    pub offset_ft: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub length_ft: f64,
    pub angle_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateType {
    #[serde(rename = "NSD")]
    Portal,
    Excel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub client: String,
    pub site_address: String,
    pub estimator: String,
    pub estimate_type: EstimateType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    #[serde(rename = "type")]
    pub kind: String,
    pub material: String,
    pub height_ft: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footprint {
    #[serde(default = "default_origin")]
    pub origin: (f64, f64),
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub openings: Vec<Opening>,
}

fn default_origin() -> (f64, f64) {
    (0.0, 0.0)
}

impl Default for Footprint {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            segments: Vec::new(),
            openings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub description: String,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub labor_rate: Option<f64>,
    #[serde(default)]
    pub markup_pct: Option<f64>,
    #[serde(default)]
    pub tax_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outputs {
    pub project_root: String,
    #[serde(default)]
    pub portal_profile: Option<String>,
    #[serde(default)]
    pub excel_template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobBundle {
    pub job: JobInfo,
    pub building: Building,
    pub footprint: Footprint,
    pub scope: Scope,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    pub outputs: Outputs,
}

impl JobBundle {
    /// Writes the bundle as UTF-8 JSON, creating parent directories.
    pub fn to_json(&self, path: &Path) -> Result<PathBuf, StorageError> {
        write_json(path, self)?;
        Ok(path.to_path_buf())
    }

    pub fn from_json(path: &Path) -> Result<Self, StorageError> {
        read_json(path)
    }

    /// Lowers the captured bundle into the pipeline's input spec. The scope
    /// description seeds a single line item; richer line items are attached
    /// by the estimator before dispatch.
    pub fn to_spec(&self) -> JobSpec {
        JobSpec {
            job_id: self.job.id.clone(),
            customer: Customer {
                name: self.job.client.clone(),
                email: None,
                phone: None,
                address: None,
                crm_key: None,
                metadata: None,
            },
            project: Project {
                site: self.job.site_address.clone(),
                due_date: None,
                source: ProjectSource::Manual,
            },
            line_items: vec![LineItem {
                room: self.building.kind.clone(),
                opening: "scope".to_string(),
                size: format!("{} ft walls", self.building.height_ft),
                qty: 1,
                spec: self.scope.description.clone(),
                price: None,
            }],
            attachments: None,
            tags: if self.scope.exclusions.is_empty() {
                None
            } else {
                Some(self.scope.exclusions.clone())
            },
        }
    }
}
