//! Persisted execution state for one job: the run record (`run.json`) tracks
//! the state machine, and each successful stage leaves its result blob under
//! `logs/<stage>.json`. A re-run with the same job id reads those blobs back
//! instead of re-invoking external systems.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;
use crate::store::filesystem::{read_json, write_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CreateOpportunity,
    GenerateSof,
    RunPortal,
    ExtractEstimate,
    Canonicalize,
    Notify,
}

impl Stage {
    /// Execution order. Fixed; stages never run out of sequence.
    pub const ORDER: [Stage; 6] = [
        Stage::CreateOpportunity,
        Stage::GenerateSof,
        Stage::RunPortal,
        Stage::ExtractEstimate,
        Stage::Canonicalize,
        Stage::Notify,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Stage::CreateOpportunity => "create_opportunity",
            Stage::GenerateSof => "generate_sof",
            Stage::RunPortal => "run_portal",
            Stage::ExtractEstimate => "extract_estimate",
            Stage::Canonicalize => "canonicalize",
            Stage::Notify => "notify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running { stage: Stage },
    Succeeded,
    Failed { stage: Stage },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// The mutable execution record for one job id. Rewritten after every state
/// transition and kept for audit; never deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub job_id: String,
    pub state: RunState,
    pub stages: BTreeMap<String, StageRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(job_id: &str) -> Self {
        let stages = Stage::ORDER
            .iter()
            .map(|s| {
                (
                    s.key().to_string(),
                    StageRecord {
                        status: StageStatus::Pending,
                        error: None,
                        recorded_at: None,
                    },
                )
            })
            .collect();
        Self {
            job_id: job_id.to_string(),
            state: RunState::Queued,
            stages,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_path(job_dir: &Path) -> PathBuf {
        job_dir.join("run.json")
    }

    pub fn persist(&self, job_dir: &Path) -> Result<(), StorageError> {
        write_json(&Self::record_path(job_dir), self)
    }

    pub fn load(job_dir: &Path) -> Result<Self, StorageError> {
        read_json(&Self::record_path(job_dir))
    }

    pub fn begin_stage(&mut self, stage: Stage) {
        self.state = RunState::Running { stage };
    }

    pub fn stage_ok(&mut self, stage: Stage) {
        self.set_stage(stage, StageStatus::Ok, None);
    }

    pub fn stage_failed(&mut self, stage: Stage, error: &str) {
        self.set_stage(stage, StageStatus::Failed, Some(error.to_string()));
        self.state = RunState::Failed { stage };
        self.finished_at = Some(Utc::now());
    }

    pub fn succeed(&mut self) {
        self.state = RunState::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    fn set_stage(&mut self, stage: Stage, status: StageStatus, error: Option<String>) {
        if let Some(record) = self.stages.get_mut(stage.key()) {
            record.status = status;
            record.error = error;
            record.recorded_at = Some(Utc::now());
        }
    }
}

/// One persisted stage result. Successful stages carry their result blob;
/// failed stages carry the error text instead.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct StageLog<T> {
    pub status: StageStatus,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn stage_log_path(logs_dir: &Path, stage: Stage) -> PathBuf {
    logs_dir.join(format!("{}.json", stage.key()))
}

pub fn write_stage_result<T: Serialize>(
    logs_dir: &Path,
    stage: Stage,
    result: &T,
) -> Result<(), StorageError> {
    let log = StageLog {
        status: StageStatus::Ok,
        recorded_at: Utc::now(),
        result: Some(result),
        error: None,
    };
    write_json(&stage_log_path(logs_dir, stage), &log)
}

pub fn write_stage_failure(
    logs_dir: &Path,
    stage: Stage,
    error: &str,
) -> Result<(), StorageError> {
    let log: StageLog<serde_json::Value> = StageLog {
        status: StageStatus::Failed,
        recorded_at: Utc::now(),
        result: None,
        error: Some(error.to_string()),
    };
    write_json(&stage_log_path(logs_dir, stage), &log)
}

/// Loads a previously recorded successful result for `stage`, if any. A
/// missing file means the stage has not completed; a corrupt or failed log is
/// treated the same way so the stage simply runs again.
pub fn read_stage_result<T: DeserializeOwned>(logs_dir: &Path, stage: Stage) -> Option<T> {
    let path = stage_log_path(logs_dir, stage);
    if !path.exists() {
        return None;
    }
    match read_json::<StageLog<T>>(&path) {
        Ok(log) if log.status == StageStatus::Ok => log.result,
        Ok(_) => None,
        Err(e) => {
            warn!(stage = stage.key(), error = %e, "discarding unreadable stage log");
            None
        }
    }
}
