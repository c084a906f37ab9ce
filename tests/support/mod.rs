//! Shared helpers for the HTTP integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::{Json, Router};
use gateway_rust::gateway::UpstreamClient;
use gateway_rust::model::{CalculationRecord, NewTodo, Statistics, Todo, TodoChanges, TodoId};
use gateway_rust::store::{CalculationLog, MemoryStore, Store, StoreError, TodoStore};
use gateway_rust::{
    calc, gateway, server, CalculationService, Gateway, RetryPolicy, ServiceInfo, TodoService,
};
use serde_json::Value;

/// Retry policy with no delay, for tests that exercise the budget.
pub fn quick(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::ZERO)
}

/// Serve `router` with the production layers on an ephemeral port.
pub async fn start_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(
        listener,
        server::layers(router),
        std::future::pending(),
    ));
    format!("http://{addr}")
}

pub async fn start_todo_service(store: Arc<dyn TodoStore>, policy: RetryPolicy) -> String {
    let service = TodoService::new(store, policy, ServiceInfo::new("todo", "todo-host"));
    start_server(gateway_rust::todo::router(Arc::new(service))).await
}

pub async fn start_calc_service(log: Arc<dyn CalculationLog>, policy: RetryPolicy) -> String {
    let service =
        CalculationService::new(log, policy, ServiceInfo::new("calculation", "calc-host"));
    start_server(calc::router(Arc::new(service))).await
}

pub async fn start_gateway(todo_url: &str, calc_url: &str, policy: RetryPolicy) -> String {
    let http = reqwest::Client::new();
    let gateway = Gateway::with_clients(
        UpstreamClient::new(http.clone(), todo_url),
        UpstreamClient::new(http, calc_url),
        policy,
        "gateway-host",
    );
    start_server(gateway::router(Arc::new(gateway))).await
}

/// A base URL nothing listens on.
pub fn unreachable_url() -> String {
    "http://127.0.0.1:1".to_string()
}

/// Downstream stand-in that answers every request with a fixed reply and
/// counts how often it was hit.
pub async fn start_stub(status: StatusCode, body: Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().fallback(move || {
        let counter = counter.clone();
        let body = body.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (status, Json(body))
        }
    });
    (start_server(router).await, hits)
}

/// Like [`start_stub`], but every reply is held back by `delay`.
pub async fn start_slow_stub(delay: Duration, body: Value) -> String {
    let router = Router::new().fallback(move || {
        let body = body.clone();
        async move {
            tokio::time::sleep(delay).await;
            Json(body)
        }
    });
    start_server(router).await
}

/// Memory store that fails its first `failures` calls (all of them when
/// `failures` is `usize::MAX`).
pub struct FlakyStore {
    inner: MemoryStore,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// Store calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Result<(), StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(StoreError::Unavailable(format!("injected failure #{}", call + 1)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.gate()?;
        self.inner.ping().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

#[async_trait]
impl TodoStore for FlakyStore {
    async fn list_todos(&self) -> Result<Vec<Todo>, StoreError> {
        self.gate()?;
        self.inner.list_todos().await
    }

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo, StoreError> {
        self.gate()?;
        self.inner.insert_todo(todo).await
    }

    async fn update_todo(
        &self,
        id: TodoId,
        changes: TodoChanges,
    ) -> Result<Option<Todo>, StoreError> {
        self.gate()?;
        self.inner.update_todo(id, changes).await
    }

    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
    ) -> Result<Option<Todo>, StoreError> {
        self.gate()?;
        self.inner.set_completed(id, completed).await
    }

    async fn delete_todo(&self, id: TodoId) -> Result<bool, StoreError> {
        self.gate()?;
        self.inner.delete_todo(id).await
    }
}

#[async_trait]
impl CalculationLog for FlakyStore {
    async fn record_calculation(
        &self,
        stats: &Statistics,
    ) -> Result<CalculationRecord, StoreError> {
        self.gate()?;
        self.inner.record_calculation(stats).await
    }

    async fn list_calculations(&self) -> Result<Vec<CalculationRecord>, StoreError> {
        self.gate()?;
        self.inner.list_calculations().await
    }
}
