use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::Gateway;
use crate::error::ServiceError;
use crate::model::Statistics;
use crate::todo::NOT_FOUND_MESSAGE;

pub fn router(gateway: Arc<Gateway>) -> Router {
    let api = Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/:id", put(update_todo).delete(delete_todo))
        .route("/todos/:id/complete", patch(complete_todo))
        .route("/calculate", post(calculate));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route("/", get(root))
        .with_state(gateway)
}

type Shared = State<Arc<Gateway>>;

async fn list_todos(State(gateway): Shared) -> Response {
    gateway.list_todos().await.into_response()
}

async fn create_todo(
    State(gateway): Shared,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(body) = payload?;
    Ok(gateway.create_todo(&body).await.into_response())
}

async fn update_todo(
    State(gateway): Shared,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let id = path_id(id)?;
    let Json(body) = payload?;
    Ok(gateway.update_todo(&id, &body).await.into_response())
}

async fn complete_todo(
    State(gateway): Shared,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let id = path_id(id)?;
    let Json(body) = payload?;
    Ok(gateway.complete_todo(&id, &body).await.into_response())
}

async fn delete_todo(
    State(gateway): Shared,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let id = path_id(id)?;
    Ok(gateway.delete_todo(&id).await.into_response())
}

/// Invalid input is rejected here, before any downstream call.
async fn calculate(
    State(gateway): Shared,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(body) = payload?;
    Statistics::from_json(&body)?;
    Ok(gateway.calculate(&body["numbers"]).await.into_response())
}

async fn health(State(gateway): Shared) -> Response {
    gateway.health().await.into_response()
}

async fn root(State(gateway): Shared) -> Json<Value> {
    Json(json!({
        "message": "API Gateway is running!",
        "hostname": gateway.hostname(),
        "services": {
            "calculation": gateway.calc_service_url(),
            "todo": gateway.todo_service_url(),
        }
    }))
}

// Ids are spliced into downstream paths; anything but [A-Za-z0-9]+ names no todo.
fn path_id(raw: String) -> Result<String, ServiceError> {
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(raw)
    } else {
        Err(ServiceError::NotFound(NOT_FOUND_MESSAGE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_ids_are_alphanumeric() {
        assert_eq!(path_id("42".into()).unwrap(), "42");
        assert_eq!(path_id("abc".into()).unwrap(), "abc");
        assert!(path_id("1%2F..".into()).is_err());
        assert!(path_id("a b".into()).is_err());
        assert!(path_id(String::new()).is_err());
    }
}
