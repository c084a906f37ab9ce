use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::warn;

use super::{Gateway, UpstreamClient, UpstreamError, SERVICE_NAME};
use crate::retry::retry_if;
use crate::server::timestamp;

pub const DEGRADED_MESSAGE: &str = "One or more services are unavailable";

/// Aggregated health of both downstream services.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthReport {
    Healthy { calculation: Value, todo: Value },
    Degraded,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthReport::Healthy { .. })
    }
}

impl Gateway {
    /// Query both downstream health endpoints together. Either one failing
    /// every attempt degrades the whole report.
    pub async fn health(&self) -> HealthReport {
        let (calculation, todo) = tokio::join!(
            self.check(&self.calc, "gateway.health.calculation"),
            self.check(&self.todo, "gateway.health.todo"),
        );

        match (calculation, todo) {
            (Ok(calculation), Ok(todo)) => HealthReport::Healthy { calculation, todo },
            (calculation, todo) => {
                for err in [calculation.err(), todo.err()].into_iter().flatten() {
                    warn!(error = %err, "downstream health check failed");
                }
                HealthReport::Degraded
            }
        }
    }

    async fn check(&self, upstream: &UpstreamClient, label: &str) -> Result<Value, UpstreamError> {
        let response = retry_if(
            &self.retry,
            label,
            || upstream.send(Method::GET, "/health", None),
            UpstreamError::is_transient,
        )
        .await?;

        if !response.status.is_success() {
            return Err(UpstreamError::Status {
                status: response.status.as_u16(),
                body: response.body.unwrap_or(Value::Null),
            });
        }
        Ok(response.body.unwrap_or(Value::Null))
    }
}

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        match self {
            HealthReport::Healthy { calculation, todo } => (
                StatusCode::OK,
                Json(json!({
                    "status": "healthy",
                    "service": SERVICE_NAME,
                    "timestamp": timestamp(),
                    "services": { "calculation": calculation, "todo": todo },
                })),
            )
                .into_response(),
            HealthReport::Degraded => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": SERVICE_NAME,
                    "timestamp": timestamp(),
                    "error": DEGRADED_MESSAGE,
                })),
            )
                .into_response(),
        }
    }
}
