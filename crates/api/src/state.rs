use std::path::PathBuf;
use std::sync::Arc;

use estiflow::crm::CrmGateway;
use estiflow::worker::WorkerPool;

/// Everything the handlers share. Built once in `main`.
pub struct AppState {
    pub run_root: PathBuf,
    pub crm: Arc<dyn CrmGateway>,
    pub pool: WorkerPool,
}
