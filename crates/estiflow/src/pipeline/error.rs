use thiserror::Error;

/// A stage failure. The pipeline is fail-fast: the first of these halts the
/// run and later stages are not attempted.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("CRM stage failed: {0}")]
    Crm(#[from] crate::crm::CrmError),

    #[error("SOF generation failed: {0}")]
    Template(#[from] crate::sof::TemplateError),

    #[error("Portal stage failed: {0}")]
    Automation(#[from] crate::portal::AutomationError),

    #[error("Estimate extraction failed: {0}")]
    Extract(#[from] crate::extract::ExtractError),

    #[error("Storage failed: {0}")]
    Storage(#[from] crate::error::StorageError),
}
