pub mod config;
pub mod crm;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod intake;
pub mod job;
pub mod notify;
pub mod pipeline;
pub mod portal;
pub mod sof;
pub mod store;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{ConfigError, EstiflowError, Result, StorageError, WorkerError};
pub use extract::{EstimateExtractor, EstimateResult};
pub use intake::{IntakeForm, ValidationError};
pub use job::{JobBundle, JobSpec};
pub use pipeline::{Pipeline, PipelineResult, PipelineRun, RunState, Stage};
pub use sof::SofGenerator;
pub use store::{canonical_paths, save_artifact, ArtifactStore, CanonicalPaths};
pub use worker::{DispatchHandle, WorkerPool};
