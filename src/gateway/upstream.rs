use std::fmt;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::retry::EmptyBudget;

/// A downstream answer the gateway relays: any 2xx or 4xx.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// `None` when the downstream sent no body (e.g. 204).
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// Connection, timeout or other transport failure.
    Transport(String),
    /// The downstream answered with a 5xx status.
    Status { status: u16, body: Value },
    /// A relayable response whose body was not JSON.
    Decode(String),
    RetryBudgetEmpty,
}

impl UpstreamError {
    /// Transport failures and 5xx answers are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::Decode(_) | UpstreamError::RetryBudgetEmpty => false,
        }
    }

    /// Downstream 5xx status, if that is what ended the call.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_server_error),
            _ => None,
        }
    }

    /// Downstream error body, if one came back.
    pub fn upstream_body(&self) -> Option<&Value> {
        match self {
            UpstreamError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Transport(msg) => write!(f, "{}", msg),
            UpstreamError::Status { status, body } => {
                match body.get("details").or_else(|| body.get("error")) {
                    Some(Value::String(reason)) => {
                        write!(f, "request failed with status code {}: {}", status, reason)
                    }
                    _ => write!(f, "request failed with status code {}", status),
                }
            }
            UpstreamError::Decode(msg) => write!(f, "invalid response body: {}", msg),
            UpstreamError::RetryBudgetEmpty => write!(f, "no upstream attempts allowed"),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<EmptyBudget> for UpstreamError {
    fn from(_: EmptyBudget) -> Self {
        UpstreamError::RetryBudgetEmpty
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Transport(err.to_string())
    }
}

/// JSON-over-HTTP client for one downstream service.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request. 5xx answers come back as [`UpstreamError::Status`].
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut request = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let parsed = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => Some(value),
                Err(_) if status.is_server_error() => {
                    Some(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Err(err) => return Err(UpstreamError::Decode(err.to_string())),
            }
        };

        if status.is_server_error() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: parsed.unwrap_or(Value::Null),
            });
        }

        Ok(UpstreamResponse {
            status,
            body: parsed,
        })
    }
}
