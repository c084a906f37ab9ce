//! HTTP routes for the calculation service.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::{CalculationOutcome, CalculationService};
use crate::error::{ServiceError, UNAVAILABLE_MESSAGE};

pub fn router(service: Arc<CalculationService>) -> Router {
    Router::new()
        .route("/calculate", post(calculate))
        .route("/history", get(history))
        .route("/health", get(health))
        .with_state(service)
}

impl IntoResponse for CalculationOutcome {
    fn into_response(self) -> Response {
        match self {
            CalculationOutcome::Stored(stats) => (StatusCode::OK, Json(stats)).into_response(),
            CalculationOutcome::Unpersisted { calculation, error } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": UNAVAILABLE_MESSAGE,
                    "details": error.to_string(),
                    "calculation": calculation,
                })),
            )
                .into_response(),
        }
    }
}

async fn calculate(
    State(service): State<Arc<CalculationService>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<CalculationOutcome, ServiceError> {
    let Json(body) = payload?;
    service.calculate(&body).await
}

async fn history(
    State(service): State<Arc<CalculationService>>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(service.history().await?))
}

async fn health(State(service): State<Arc<CalculationService>>) -> Json<Value> {
    Json(service.health().await)
}
