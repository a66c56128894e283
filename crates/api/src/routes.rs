//! HTTP handlers. Blocking adapter calls (CRM, queue) are pushed onto the
//! blocking pool so the async runtime stays responsive.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use estiflow::crm::{CustomerDetail, CustomerSummary};
use estiflow::intake::{self, IntakeForm};
use estiflow::job::JobSpec;
use estiflow::store::{ensure_job_dirs, write_json};

use crate::errors::ApiError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/lookup/company", get(lookup_company))
        .route("/lookup/abentry/:key", get(lookup_abentry))
        .route("/intake", post(intake_job))
        .route("/automate", post(automate))
        .layer(tower::ServiceBuilder::new())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

#[derive(Deserialize)]
struct LookupQuery {
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

async fn lookup_company(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupQuery>,
) -> Result<Json<Vec<CustomerSummary>>, ApiError> {
    let hits = spawn_blocking(move || state.crm.search_customer(&params.q, params.limit)).await??;
    Ok(Json(hits))
}

async fn lookup_abentry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<CustomerDetail>, ApiError> {
    let detail = spawn_blocking(move || state.crm.get_customer(&key)).await??;
    Ok(Json(detail))
}

/// Raw form fields in, persisted job bundle out.
async fn intake_job(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IntakeForm>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (bundle, path) =
        spawn_blocking(move || intake::process(&form, &state.run_root)).await??;

    info!(job_id = %bundle.job.id, "job captured");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "job_id": bundle.job.id,
            "path": path,
        })),
    ))
}

/// Accepts a serialized job spec, persists it for audit, and dispatches it
/// into the pipeline queue.
async fn automate(
    State(state): State<Arc<AppState>>,
    Json(job): Json<JobSpec>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if job.job_id.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "job_id must not be empty",
        ));
    }
    if job.customer.name.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "customer.name must not be empty",
        ));
    }

    let handle = spawn_blocking(move || -> Result<_, ApiError> {
        // Persist the input first so a crashed dispatch is still auditable.
        let dirs = ensure_job_dirs(&state.run_root, &job.job_id)
            .map_err(estiflow::EstiflowError::from)?;
        write_json(&dirs.inputs.join("jobspec.json"), &job)
            .map_err(estiflow::EstiflowError::from)?;

        let handle = state.pool.submit(job)?;
        Ok(handle)
    })
    .await??;

    info!(job_id = %handle.job_id, dispatch_id = %handle.dispatch_id, "job enqueued");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "enqueued": true,
            "dispatch_id": handle.dispatch_id,
            "job_id": handle.job_id,
        })),
    ))
}

async fn spawn_blocking<T: Send + 'static>(
    f: impl FnOnce() -> T + Send + 'static,
) -> Result<T, ApiError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("worker task failed: {e}")))
}
