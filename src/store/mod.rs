//! store: the data store behind the todo and calculation services.
//!
//! The services only see the [`TodoStore`] and [`CalculationLog`] traits.
//! Every trait method is one atomic store call; nothing spans several calls.
//! Failures are [`StoreError`]s, all of which the services treat as
//! transient and retry. A lookup that finds nothing is not an error: it
//! comes back as `None` / `false` and is never retried.
//!
//! Two backends exist:
//!
//! - [`MemoryStore`]: process-local maps, the default.
//! - `SqliteStore`: a file-backed database with a bounded connection pool
//!   (requires the `sqlite` feature).
//!
//! [`connect`] picks the backend from a [`StoreConfig`] and retries the
//! initial connection under the startup policy.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{StoreConfig, StoreUrl};
use crate::model::{CalculationRecord, NewTodo, Statistics, Todo, TodoChanges, TodoId};
use crate::retry::{retry, EmptyBudget, RetryPolicy};

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or opened.
    Unavailable(String),
    /// The store was closed at shutdown.
    Closed,
    /// No pooled connection became free in time.
    PoolTimeout(Duration),
    /// A query or statement failed.
    Query(String),
    LockPoisoned(&'static str),
    /// The retry policy allowed no attempts.
    RetryBudgetEmpty,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Closed => write!(f, "store is closed"),
            StoreError::PoolTimeout(waited) => write!(
                f,
                "timed out after {}ms waiting for a store connection",
                waited.as_millis()
            ),
            StoreError::Query(msg) => write!(f, "store query failed: {}", msg),
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::RetryBudgetEmpty => write!(f, "no store attempts allowed"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<EmptyBudget> for StoreError {
    fn from(_: EmptyBudget) -> Self {
        StoreError::RetryBudgetEmpty
    }
}

/// Lifecycle shared by every store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity probe used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections. Later calls fail with [`StoreError::Closed`].
    async fn close(&self);
}

/// Todo records, listed newest first.
#[async_trait]
pub trait TodoStore: Store {
    async fn list_todos(&self) -> Result<Vec<Todo>, StoreError>;

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo, StoreError>;

    /// Returns `None` when no todo has this id.
    async fn update_todo(
        &self,
        id: TodoId,
        changes: TodoChanges,
    ) -> Result<Option<Todo>, StoreError>;

    /// Returns `None` when no todo has this id.
    async fn set_completed(&self, id: TodoId, completed: bool)
        -> Result<Option<Todo>, StoreError>;

    /// Returns `false` when no todo has this id.
    async fn delete_todo(&self, id: TodoId) -> Result<bool, StoreError>;
}

/// Append-only log of computed statistics.
#[async_trait]
pub trait CalculationLog: Store {
    async fn record_calculation(&self, stats: &Statistics)
        -> Result<CalculationRecord, StoreError>;

    /// All records, newest first.
    async fn list_calculations(&self) -> Result<Vec<CalculationRecord>, StoreError>;
}

/// The backend chosen from configuration.
pub enum StoreBackend {
    Memory(MemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStore),
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreBackend::Memory($store) => $call,
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite($store) => $call,
        }
    };
}

/// Open the configured store, retrying under `policy`.
pub async fn connect(config: &StoreConfig, policy: &RetryPolicy) -> Result<StoreBackend, StoreError> {
    let backend = retry(policy, "store.connect", || open(config)).await?;
    info!(store = ?config.url, "store connected");
    Ok(backend)
}

async fn open(config: &StoreConfig) -> Result<StoreBackend, StoreError> {
    match &config.url {
        StoreUrl::Memory => Ok(StoreBackend::Memory(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        StoreUrl::Sqlite(path) => Ok(StoreBackend::Sqlite(
            SqliteStore::open(path.clone(), config.pool_max, config.acquire_timeout).await?,
        )),
        #[cfg(not(feature = "sqlite"))]
        StoreUrl::Sqlite(path) => Err(StoreError::Unavailable(format!(
            "{} needs the `sqlite` feature",
            path.display()
        ))),
    }
}

#[async_trait]
impl Store for StoreBackend {
    async fn ping(&self) -> Result<(), StoreError> {
        delegate!(self, store => store.ping().await)
    }

    async fn close(&self) {
        delegate!(self, store => store.close().await)
    }
}

#[async_trait]
impl TodoStore for StoreBackend {
    async fn list_todos(&self) -> Result<Vec<Todo>, StoreError> {
        delegate!(self, store => store.list_todos().await)
    }

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo, StoreError> {
        delegate!(self, store => store.insert_todo(todo).await)
    }

    async fn update_todo(
        &self,
        id: TodoId,
        changes: TodoChanges,
    ) -> Result<Option<Todo>, StoreError> {
        delegate!(self, store => store.update_todo(id, changes).await)
    }

    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
    ) -> Result<Option<Todo>, StoreError> {
        delegate!(self, store => store.set_completed(id, completed).await)
    }

    async fn delete_todo(&self, id: TodoId) -> Result<bool, StoreError> {
        delegate!(self, store => store.delete_todo(id).await)
    }
}

#[async_trait]
impl CalculationLog for StoreBackend {
    async fn record_calculation(
        &self,
        stats: &Statistics,
    ) -> Result<CalculationRecord, StoreError> {
        delegate!(self, store => store.record_calculation(stats).await)
    }

    async fn list_calculations(&self) -> Result<Vec<CalculationRecord>, StoreError> {
        delegate!(self, store => store.list_calculations().await)
    }
}
