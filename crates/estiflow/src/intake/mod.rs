//! Intake boundary: raw form fields in, a validated, persisted job bundle
//! out. Anything malformed is rejected here with a specific message, before a
//! job id is ever assigned.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::error::EstiflowError;
use crate::geometry;
use crate::job::bundle::{
    Building, EstimateType, Footprint, JobBundle, JobInfo, Opening, Outputs, Scope, Segment,
};
use crate::job::id::make_job_id;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("Field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Field '{field}' is not valid JSON: {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown estimate type '{0}' (expected 'NSD' or 'Excel')")]
    UnknownEstimateType(String),
}

/// Raw intake form, exactly as posted. Geometry arrives as two JSON arrays.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntakeForm {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub site_address: String,
    #[serde(default)]
    pub estimator: String,
    #[serde(default)]
    pub estimate_type: String,
    #[serde(default)]
    pub building_type: String,
    #[serde(default)]
    pub building_material: String,
    #[serde(default)]
    pub building_height: String,
    #[serde(default)]
    pub scope_description: String,
    /// Comma-separated exclusion list.
    #[serde(default)]
    pub exclusions: String,
    #[serde(default)]
    pub segments_json: String,
    #[serde(default)]
    pub openings_json: String,
}

/// Validated form contents, not yet bound to a job id.
#[derive(Debug, Clone)]
pub struct ValidatedIntake {
    pub client: String,
    pub site_address: String,
    pub estimator: String,
    pub estimate_type: EstimateType,
    pub building: Building,
    pub footprint: Footprint,
    pub scope: Scope,
}

pub fn validate(form: &IntakeForm) -> Result<ValidatedIntake, ValidationError> {
    let client = form.client.trim();
    if client.is_empty() {
        return Err(ValidationError::MissingField("client"));
    }
    let site_address = form.site_address.trim();
    if site_address.is_empty() {
        return Err(ValidationError::MissingField("site_address"));
    }

    let estimate_type = match form.estimate_type.trim() {
        "" | "NSD" => EstimateType::Portal,
        "Excel" => EstimateType::Excel,
        other => return Err(ValidationError::UnknownEstimateType(other.to_string())),
    };

    let height_raw = form.building_height.trim();
    let height_ft = if height_raw.is_empty() {
        0.0
    } else {
        height_raw
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidNumber {
                field: "building_height",
                value: height_raw.to_string(),
            })?
    };

    let segments: Vec<Segment> = parse_json_field("segments_json", &form.segments_json)?;
    let openings: Vec<Opening> = parse_json_field("openings_json", &form.openings_json)?;

    let footprint = Footprint {
        origin: (0.0, 0.0),
        segments,
        openings,
    };

    // An open footprint is worth flagging but is not the intake's call to
    // reject: partial captures get refined later.
    if !footprint.segments.is_empty() {
        let pts = geometry::poly_points(footprint.origin, &footprint.segments);
        if !geometry::closes_to_origin(&pts, 1e-6) {
            warn!(client = %client, "intake footprint does not close back to its origin");
        }
    }

    let exclusions: Vec<String> = form
        .exclusions
        .split(',')
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    Ok(ValidatedIntake {
        client: client.to_string(),
        site_address: site_address.to_string(),
        estimator: form.estimator.trim().to_string(),
        estimate_type,
        building: Building {
            kind: form.building_type.trim().to_string(),
            material: form.building_material.trim().to_string(),
            height_ft,
        },
        footprint,
        scope: Scope {
            description: form.scope_description.trim().to_string(),
            exclusions,
            notes: None,
        },
    })
}

fn parse_json_field<T: serde::de::DeserializeOwned>(
    field: &'static str,
    raw: &str,
) -> Result<Vec<T>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|source| ValidationError::InvalidJson { field, source })
}

/// Full intake: validate, assign a job id, persist `<run_dir>/job.json`.
/// Returns the bundle and the path it was written to.
pub fn process(form: &IntakeForm, run_root: &Path) -> Result<(JobBundle, PathBuf), EstiflowError> {
    let validated = validate(form)?;
    let job_id = make_job_id(run_root)?;
    let run_dir = run_root.join(&job_id);

    let bundle = JobBundle {
        job: JobInfo {
            id: job_id,
            client: validated.client,
            site_address: validated.site_address,
            estimator: validated.estimator,
            estimate_type: validated.estimate_type,
        },
        building: validated.building,
        footprint: validated.footprint,
        scope: validated.scope,
        pricing: None,
        outputs: Outputs {
            project_root: run_dir.display().to_string(),
            portal_profile: None,
            excel_template: None,
        },
    };

    let path = bundle.to_json(&run_dir.join("job.json"))?;
    Ok((bundle, path))
}
