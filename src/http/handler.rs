//! HTTP handlers for the question-answering API

use crate::service::{QaService, QuestionRequest, ServiceError};
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServiceError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            // details stay in the log
            ServiceError::BackendUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The language model or graph store is unavailable".to_string(),
            ),
            ServiceError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ServiceError::Seed(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Malformed bodies and unknown models are client errors
fn question(payload: Result<Json<QuestionRequest>, JsonRejection>) -> Result<QuestionRequest, ServiceError> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| ServiceError::InvalidRequest(rejection.body_text()))
}

/// Answer a question
pub async fn generate_response_handler(
    State(service): State<Arc<QaService>>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = question(payload)?;
    let answer = service.answer(&request).await?;
    Ok(Json(json!({ "response": answer.text })))
}

/// Rephrase a question into canonical form
pub async fn rephrase_handler(
    State(service): State<Arc<QaService>>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = question(payload)?;
    let rephrased = service.rephrase(&request).await?;
    Ok(Json(json!({ "response": rephrased })))
}

/// Load the seed data and return the schema
pub async fn populate_handler(State(service): State<Arc<QaService>>) -> Result<impl IntoResponse, ServiceError> {
    let schema = service.populate().await?;
    Ok(Json(json!({ "result": schema.to_string() })))
}

/// Delete all data and return the schema
pub async fn delete_handler(State(service): State<Arc<QaService>>) -> Result<impl IntoResponse, ServiceError> {
    let schema = service.reset().await?;
    Ok(Json(json!({ "result": schema.to_string() })))
}

/// Handler for system status
pub async fn status_handler(State(service): State<Arc<QaService>>) -> impl IntoResponse {
    let schema = service.schema().await;
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "models": service.available_models(),
        "graph": {
            "labels": schema.node_labels.keys().collect::<Vec<_>>(),
            "relationship_types": schema.relationship_types.keys().collect::<Vec<_>>(),
        }
    }))
}
