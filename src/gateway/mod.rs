//! gateway: the externally reachable API gateway.
//!
//! Every route forwards to one downstream service through [`retry_if`]:
//! transport failures and 5xx answers are retried under the gateway policy,
//! anything else the downstream says (2xx, 4xx) is relayed as is. Once the
//! budget runs out the gateway answers with a [`GatewayFailure`] of its own.
//!
//! ## Routes
//!
//! - `GET|POST /api/todos`
//! - `PUT|DELETE /api/todos/:id`
//! - `PATCH /api/todos/:id/complete`
//! - `POST /api/calculate`
//! - `GET /health`: both downstream health checks, run concurrently
//! - `GET /`: gateway identity and configured downstream URLs

mod health;
mod http;
mod upstream;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, Method};
use serde_json::{json, Map, Value};
use tracing::error;

pub use health::HealthReport;
pub use http::router;
pub use upstream::{UpstreamClient, UpstreamError, UpstreamResponse};

use crate::config::GatewayConfig;
use crate::retry::{retry_if, RetryPolicy};
use crate::server::timestamp;

/// Identity reported in the `service` field of gateway health bodies.
pub const SERVICE_NAME: &str = "api-gateway";

/// A gateway route, as named in failure bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ListTodos,
    CreateTodo,
    UpdateTodo,
    CompleteTodo,
    DeleteTodo,
    Calculate,
}

impl Route {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Route::ListTodos => "Failed to fetch todos",
            Route::CreateTodo => "Failed to create todo",
            Route::UpdateTodo => "Failed to update todo",
            Route::CompleteTodo => "Failed to update todo completion",
            Route::DeleteTodo => "Failed to delete todo",
            Route::Calculate => "Failed to process calculation",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Route::ListTodos => "gateway.todos.list",
            Route::CreateTodo => "gateway.todos.create",
            Route::UpdateTodo => "gateway.todos.update",
            Route::CompleteTodo => "gateway.todos.complete",
            Route::DeleteTodo => "gateway.todos.delete",
            Route::Calculate => "gateway.calculate",
        }
    }
}

/// Forwarding state shared by all gateway handlers.
pub struct Gateway {
    todo: UpstreamClient,
    calc: UpstreamClient,
    retry: RetryPolicy,
    hostname: String,
}

impl Gateway {
    /// Build the HTTP client from configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self::with_clients(
            UpstreamClient::new(http.clone(), config.todo_service_url.clone()),
            UpstreamClient::new(http, config.calc_service_url.clone()),
            config.retry,
            config.hostname.clone(),
        ))
    }

    pub fn with_clients(
        todo: UpstreamClient,
        calc: UpstreamClient,
        retry: RetryPolicy,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            todo,
            calc,
            retry,
            hostname: hostname.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn calc_service_url(&self) -> &str {
        self.calc.base_url()
    }

    pub fn todo_service_url(&self) -> &str {
        self.todo.base_url()
    }

    pub async fn list_todos(&self) -> Result<UpstreamResponse, GatewayFailure> {
        self.todo_call(Route::ListTodos, Method::GET, "/todos".into(), None)
            .await
    }

    pub async fn create_todo(&self, body: &Value) -> Result<UpstreamResponse, GatewayFailure> {
        self.todo_call(Route::CreateTodo, Method::POST, "/todos".into(), Some(body))
            .await
    }

    pub async fn update_todo(
        &self,
        id: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, GatewayFailure> {
        self.todo_call(Route::UpdateTodo, Method::PUT, format!("/todos/{id}"), Some(body))
            .await
    }

    pub async fn complete_todo(
        &self,
        id: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, GatewayFailure> {
        let path = format!("/todos/{id}/complete");
        self.todo_call(Route::CompleteTodo, Method::PATCH, path, Some(body))
            .await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<UpstreamResponse, GatewayFailure> {
        self.todo_call(Route::DeleteTodo, Method::DELETE, format!("/todos/{id}"), None)
            .await
    }

    /// Forward a `{numbers}` body and tag a successful answer with gateway
    /// metadata. Relayed 4xx bodies are left untouched.
    pub async fn calculate(&self, numbers: &Value) -> Result<UpstreamResponse, GatewayFailure> {
        let body = json!({ "numbers": numbers });
        let mut response = forward(
            &self.calc,
            &self.retry,
            Route::Calculate,
            Method::POST,
            "/calculate",
            Some(&body),
        )
        .await
        .map_err(|err| {
            GatewayFailure::new(Route::Calculate, err).for_calculation(self.calc_service_url())
        })?;

        if response.status.is_success() {
            let mut tagged = match response.body.take() {
                Some(Value::Object(fields)) => fields,
                _ => Map::new(),
            };
            tagged.insert("processed_by".into(), Value::String(self.hostname.clone()));
            tagged.insert("timestamp".into(), Value::String(timestamp()));
            tagged.insert(
                "calc_service_url".into(),
                Value::String(self.calc_service_url().to_string()),
            );
            response.body = Some(Value::Object(tagged));
        }
        Ok(response)
    }

    async fn todo_call(
        &self,
        route: Route,
        method: Method,
        path: String,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse, GatewayFailure> {
        forward(&self.todo, &self.retry, route, method, &path, body)
            .await
            .map_err(|err| GatewayFailure::new(route, err))
    }
}

async fn forward(
    upstream: &UpstreamClient,
    policy: &RetryPolicy,
    route: Route,
    method: Method,
    path: &str,
    body: Option<&Value>,
) -> Result<UpstreamResponse, UpstreamError> {
    retry_if(
        policy,
        route.label(),
        || upstream.send(method.clone(), path, body),
        UpstreamError::is_transient,
    )
    .await
}

/// A forwarded call that failed on every attempt.
#[derive(Debug)]
pub struct GatewayFailure {
    route: Route,
    error: UpstreamError,
    calc_service_url: Option<String>,
}

impl GatewayFailure {
    pub fn new(route: Route, error: UpstreamError) -> Self {
        Self {
            route,
            error,
            calc_service_url: None,
        }
    }

    fn for_calculation(mut self, calc_service_url: &str) -> Self {
        self.calc_service_url = Some(calc_service_url.to_string());
        self
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn error(&self) -> &UpstreamError {
        &self.error
    }

    /// The downstream's own 5xx if it sent one, else 500.
    pub fn status(&self) -> StatusCode {
        self.error
            .upstream_status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn body(&self) -> Value {
        let mut body = json!({
            "error": self.route.failure_message(),
            "details": self.error.to_string(),
        });
        if let Some(url) = &self.calc_service_url {
            body["calc_service_url"] = Value::String(url.clone());
            if let Some(calculation) = self
                .error
                .upstream_body()
                .and_then(|upstream| upstream.get("calculation"))
            {
                body["calculation"] = calculation.clone();
            }
        }
        body
    }
}

impl IntoResponse for GatewayFailure {
    fn into_response(self) -> Response {
        error!(route = ?self.route, error = %self.error, "forwarding failed");
        (self.status(), Json(self.body())).into_response()
    }
}

/// Relay a downstream answer with its status and body.
impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) if self.status != StatusCode::NO_CONTENT => {
                (self.status, Json(body)).into_response()
            }
            _ => self.status.into_response(),
        }
    }
}
