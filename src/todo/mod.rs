//! todo: the todo downstream service.
//!
//! [`TodoService`] validates request bodies, then runs each store call under
//! the service's store retry policy. Validation failures and unknown ids
//! never touch the retry budget.

mod http;

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

pub use http::router;

use crate::error::ServiceError;
use crate::model::{completed_flag, parse_id, NewTodo, Todo, TodoChanges, TodoId};
use crate::retry::{retry, RetryPolicy};
use crate::server::{store_health, ServiceInfo};
use crate::store::{Store, TodoStore};

pub const NOT_FOUND_MESSAGE: &str = "Todo not found";

pub struct TodoService {
    store: Arc<dyn TodoStore>,
    retry: RetryPolicy,
    info: ServiceInfo,
}

impl TodoService {
    pub fn new(store: Arc<dyn TodoStore>, retry: RetryPolicy, info: ServiceInfo) -> Self {
        Self { store, retry, info }
    }

    /// All todos, newest first.
    pub async fn list(&self) -> Result<Vec<Todo>, ServiceError> {
        let todos = retry(&self.retry, "todo.list", || self.store.list_todos()).await?;
        Ok(todos)
    }

    pub async fn create(&self, body: &Value) -> Result<Todo, ServiceError> {
        let new = NewTodo::from_json(body)?;
        let todo = retry(&self.retry, "todo.create", || {
            self.store.insert_todo(new.clone())
        })
        .await?;

        info!(id = todo.id, "todo created");
        Ok(todo)
    }

    /// Full update. Fields absent from the body keep their stored values,
    /// except `title` which is required.
    pub async fn update(&self, raw_id: &str, body: &Value) -> Result<Todo, ServiceError> {
        let changes = TodoChanges::from_json(body)?;
        let id = known_id(raw_id)?;

        retry(&self.retry, "todo.update", || {
            self.store.update_todo(id, changes.clone())
        })
        .await?
        .ok_or_else(not_found)
    }

    pub async fn complete(&self, raw_id: &str, body: &Value) -> Result<Todo, ServiceError> {
        let completed = completed_flag(body)?;
        let id = known_id(raw_id)?;

        retry(&self.retry, "todo.complete", || {
            self.store.set_completed(id, completed)
        })
        .await?
        .ok_or_else(not_found)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), ServiceError> {
        let id = known_id(raw_id)?;
        let deleted = retry(&self.retry, "todo.delete", || self.store.delete_todo(id)).await?;

        if !deleted {
            return Err(not_found());
        }
        info!(id, "todo deleted");
        Ok(())
    }

    /// Health body; degraded when the store does not answer a ping.
    pub async fn health(&self) -> Value {
        let connected = match self.store.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "store ping failed");
                false
            }
        };
        store_health(&self.info, connected)
    }
}

fn known_id(raw: &str) -> Result<TodoId, ServiceError> {
    parse_id(raw).ok_or_else(not_found)
}

fn not_found() -> ServiceError {
    ServiceError::NotFound(NOT_FOUND_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::model::ValidationError;
    use crate::store::{MemoryStore, StoreError};

    fn service_with(store: Arc<MemoryStore>) -> TodoService {
        TodoService::new(
            store,
            RetryPolicy::new(3, Duration::ZERO),
            ServiceInfo::new("todo", "test-host"),
        )
    }

    #[tokio::test]
    async fn create_then_list() {
        let service = service_with(Arc::new(MemoryStore::new()));
        let todo = service.create(&json!({ "title": "Buy milk" })).await.unwrap();

        assert!(todo.id > 0);
        assert!(!todo.completed);
        assert_eq!(service.list().await.unwrap(), vec![todo]);
    }

    #[tokio::test]
    async fn validation_runs_before_store_access() {
        let store = Arc::new(MemoryStore::new());
        store.close().await;
        let service = service_with(store);

        let err = service.create(&json!({ "title": "" })).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::MissingTitle)
        ));

        let err = service
            .complete("1", &json!({ "completed": "yes" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::InvalidCompleted)
        ));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let service = service_with(Arc::new(MemoryStore::new()));

        for raw in ["42", "abc", "0"] {
            assert!(matches!(
                service.delete(raw).await,
                Err(ServiceError::NotFound(_))
            ));
        }
        assert!(matches!(
            service.complete("42", &json!({ "completed": true })).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.update("42", &json!({ "title": "x" })).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn store_failure_surfaces_after_retries() {
        let store = Arc::new(MemoryStore::new());
        store.close().await;
        let service = service_with(store);

        let err = service.list().await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Closed)));
    }

    #[tokio::test]
    async fn health_tracks_store() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone());
        assert_eq!(service.health().await["status"], "healthy");

        store.close().await;
        let health = service.health().await;
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["database"]["status"], "disconnected");
    }
}
