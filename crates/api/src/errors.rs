//! Consistent error responses: every failure maps to a status code and a
//! JSON body of the shape `{"error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use estiflow::crm::CrmError;
use estiflow::{EstiflowError, WorkerError};

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

impl From<EstiflowError> for ApiError {
    fn from(err: EstiflowError) -> Self {
        let status = match &err {
            EstiflowError::Intake(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EstiflowError::Crm(CrmError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            EstiflowError::Crm(CrmError::InvalidCustomerKey(_)) => StatusCode::NOT_FOUND,
            EstiflowError::Worker(WorkerError::JobAlreadyRunning(_)) => StatusCode::CONFLICT,
            EstiflowError::Worker(WorkerError::QueueFull) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        ApiError::from(EstiflowError::from(err))
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        ApiError::from(EstiflowError::from(err))
    }
}
