//! HTTP-facing error taxonomy shared by the downstream services.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::model::ValidationError;
use crate::store::StoreError;

/// Body `error` for a store failure that outlived its retries.
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";

/// Body `error` for anything that escaped a handler.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request body rejected before any store access.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    /// Store failure after the retry budget ran out.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unhandled(String),
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(ValidationError::MalformedBody(rejection.body_text()))
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for this error.
    pub fn body(&self) -> Value {
        match self {
            ServiceError::Validation(_) | ServiceError::NotFound(_) => {
                json!({ "error": self.to_string() })
            }
            ServiceError::Store(err) => {
                json!({ "error": UNAVAILABLE_MESSAGE, "details": err.to_string() })
            }
            ServiceError::Unhandled(details) => {
                json!({ "error": INTERNAL_MESSAGE, "details": details })
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
