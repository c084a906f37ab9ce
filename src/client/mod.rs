//! client: typed access to the gateway for command-line and test callers.
//!
//! Callers that show errors to a person use [`Action::failure_message`]: one
//! fixed line per action, whatever actually went wrong.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::model::{Statistics, Todo, TodoId};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway answered {status}: {body}")]
    Status { status: StatusCode, body: Value },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status(),
        }
    }
}

/// User-facing operations of the frontend views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FetchTodos,
    CreateTodo,
    UpdateTodo,
    DeleteTodo,
    Calculate,
}

impl Action {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Action::FetchTodos => "Failed to fetch todos",
            Action::CreateTodo => "Failed to create todo",
            Action::UpdateTodo => "Failed to update todo",
            Action::DeleteTodo => "Failed to delete todo",
            Action::Calculate => "Failed to calculate statistics",
        }
    }
}

/// Statistics as returned through the gateway, with its metadata.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CalculationReply {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub processed_by: String,
    pub timestamp: String,
    pub calc_service_url: String,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub async fn list_todos(&self) -> Result<Vec<Todo>, ClientError> {
        self.call(Method::GET, "/api/todos", None).await
    }

    pub async fn create_todo(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Todo, ClientError> {
        let body = json!({ "title": title, "description": description });
        self.call(Method::POST, "/api/todos", Some(body)).await
    }

    pub async fn update_todo(
        &self,
        id: TodoId,
        title: &str,
        description: Option<&str>,
        completed: Option<bool>,
    ) -> Result<Todo, ClientError> {
        let body = json!({ "title": title, "description": description, "completed": completed });
        self.call(Method::PUT, &format!("/api/todos/{id}"), Some(body))
            .await
    }

    pub async fn set_completed(&self, id: TodoId, completed: bool) -> Result<Todo, ClientError> {
        let body = json!({ "completed": completed });
        self.call(Method::PATCH, &format!("/api/todos/{id}/complete"), Some(body))
            .await
    }

    pub async fn delete_todo(&self, id: TodoId) -> Result<(), ClientError> {
        self.send(Method::DELETE, &format!("/api/todos/{id}"), None)
            .await?;
        Ok(())
    }

    pub async fn calculate(&self, numbers: &[f64]) -> Result<CalculationReply, ClientError> {
        let body = json!({ "numbers": numbers });
        self.call(Method::POST, "/api/calculate", Some(body)).await
    }

    /// Raw gateway health body. A degraded gateway is an error.
    pub async fn health(&self) -> Result<Value, ClientError> {
        self.call(Method::GET, "/health", None).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let response = self.send(method, path, body).await?;
        Ok(response.json().await?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json().await.unwrap_or(Value::Null);
            return Err(ClientError::Status { status, body });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_action_has_a_fixed_message() {
        assert_eq!(Action::FetchTodos.failure_message(), "Failed to fetch todos");
        assert_eq!(Action::CreateTodo.failure_message(), "Failed to create todo");
        assert_eq!(Action::UpdateTodo.failure_message(), "Failed to update todo");
        assert_eq!(Action::DeleteTodo.failure_message(), "Failed to delete todo");
        assert_eq!(
            Action::Calculate.failure_message(),
            "Failed to calculate statistics"
        );
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = GatewayClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let client = GatewayClient::new("http://127.0.0.1:1");
        let err = client.list_todos().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
