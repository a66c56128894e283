mod errors;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use estiflow::notify::Notifier;
use estiflow::pipeline::Pipeline;
use estiflow::worker::WorkerPool;

use state::AppState;

fn init_tracing() {
    // The worker pool logs via `log`; bridge it into tracing.
    let _ = tracing_log::LogTracer::init();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

// Adapters (blocking HTTP clients among them) are built here, outside any
// async runtime; the runtime is entered only to serve.
fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path =
        std::env::var("ESTIFLOW_CONFIG").unwrap_or_else(|_| "estiflow.json".to_string());
    let config = estiflow::load_config(&config_path)
        .with_context(|| format!("loading config from {config_path}"))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.worker_count,
        "starting estiflow api"
    );

    let run_root = PathBuf::from(&config.run_root);
    let crm = estiflow::crm::gateway_from_config(&config.crm).context("building CRM gateway")?;
    let portal =
        estiflow::portal::driver_from_config(&config.portal).context("building portal driver")?;
    let notifier = Notifier::from_config(&config.notifications).context("building notifier")?;

    let pipeline = Arc::new(Pipeline::new(
        run_root.clone(),
        &config.filestore_root,
        crm.clone(),
        portal,
        notifier,
    ));
    let pool = WorkerPool::new(pipeline, config.worker_count);

    let listen_addr = config.listen_addr.clone();
    let app_state = Arc::new(AppState {
        run_root,
        crm,
        pool,
    });

    // Drain worker results in the background; the run records on disk are the
    // durable source of truth, this is just operator-facing logging.
    let drain_state = Arc::clone(&app_state);
    std::thread::spawn(move || loop {
        match drain_state.pool.recv_result() {
            Some(result) if result.ok => {
                info!(job_id = %result.job_id, "pipeline run succeeded")
            }
            Some(result) => warn!(
                job_id = %result.job_id,
                stage = result.failed_stage.map(|s| s.key()).unwrap_or("-"),
                error = result.error.as_deref().unwrap_or("unknown"),
                "pipeline run failed"
            ),
            None => break,
        }
    });

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(serve(app_state, listen_addr))
}

async fn serve(app_state: Arc<AppState>, listen_addr: String) -> anyhow::Result<()> {
    let app = routes::router(app_state);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    info!(addr = %listen_addr, "listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
