//! HTTP routes for the todo service.
//!
//! - `GET /todos`, `POST /todos`
//! - `PUT /todos/:id`, `DELETE /todos/:id`
//! - `PATCH /todos/:id/complete`
//! - `GET /health`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use serde_json::Value;

use super::TodoService;
use crate::error::ServiceError;

pub fn router(service: Arc<TodoService>) -> Router {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/:id", put(update_todo).delete(delete_todo))
        .route("/todos/:id/complete", patch(complete_todo))
        .route("/health", get(health))
        .with_state(service)
}

async fn list_todos(
    State(service): State<Arc<TodoService>>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(service.list().await?))
}

async fn create_todo(
    State(service): State<Arc<TodoService>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;
    let todo = service.create(&body).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update_todo(
    State(service): State<Arc<TodoService>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;
    Ok(Json(service.update(&id, &body).await?))
}

async fn complete_todo(
    State(service): State<Arc<TodoService>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(body) = payload?;
    Ok(Json(service.complete(&id, &body).await?))
}

async fn delete_todo(
    State(service): State<Arc<TodoService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health(State(service): State<Arc<TodoService>>) -> Json<Value> {
    Json(service.health().await)
}
