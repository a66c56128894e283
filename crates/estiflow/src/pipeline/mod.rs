pub mod context;
pub mod error;
pub mod runner;
pub mod state;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use runner::{Pipeline, PipelineResult};
pub use state::{PipelineRun, RunState, Stage, StageStatus};
