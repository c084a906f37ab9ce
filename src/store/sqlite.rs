use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Number;
use tokio::sync::Semaphore;

use super::{CalculationLog, Store, StoreError, TodoStore};
use crate::config::is_in_memory_sqlite;
use crate::model::{CalculationRecord, NewTodo, Statistics, Todo, TodoChanges, TodoId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS todos (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT    NOT NULL,
    description TEXT,
    completed   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);
CREATE TABLE IF NOT EXISTS calculations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    numbers     TEXT    NOT NULL,
    sum         REAL    NOT NULL,
    average     REAL    NOT NULL,
    max_value   REAL    NOT NULL,
    min_value   REAL    NOT NULL,
    created_at  TEXT    NOT NULL
);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TODO_COLUMNS: &str = "id, title, description, completed, created_at, updated_at";

/// File-backed store with a bounded pool of connections.
///
/// Each call waits at most `acquire_timeout` for a pool slot, then runs its
/// statements on a blocking thread. Every pooled connection must see the same
/// database, so in-memory paths are refused at [`SqliteStore::open`].
pub struct SqliteStore {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    slots: Arc<Semaphore>,
    acquire_timeout: Duration,
    closed: AtomicBool,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl SqliteStore {
    /// Open the database file and create missing tables.
    pub async fn open(
        path: PathBuf,
        pool_max: usize,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        if is_in_memory_sqlite(&path.to_string_lossy()) {
            return Err(StoreError::Unavailable(format!(
                "sqlite database `{}` is private to one connection and cannot be pooled",
                path.display()
            )));
        }

        let open_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = open_connection(&open_path)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        Ok(Self {
            path,
            idle: Mutex::new(vec![conn]),
            slots: Arc::new(Semaphore::new(pool_max.max(1))),
            acquire_timeout,
            closed: AtomicBool::new(false),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }

        let _slot = tokio::time::timeout(self.acquire_timeout, self.slots.clone().acquire_owned())
            .await
            .map_err(|_| StoreError::PoolTimeout(self.acquire_timeout))?
            .map_err(|_| StoreError::Closed)?;

        let pooled = self
            .idle
            .lock()
            .map_err(|_| StoreError::LockPoisoned("pool checkout"))?
            .pop();
        let path = self.path.clone();

        let (conn, result) = tokio::task::spawn_blocking(move || {
            let conn = match pooled {
                Some(conn) => conn,
                None => open_connection(&path)?,
            };
            let result = f(&conn);
            Ok::<_, rusqlite::Error>((conn, result))
        })
        .await
        .map_err(|e| StoreError::Query(e.to_string()))??;

        if !self.closed.load(Ordering::SeqCst) {
            self.idle
                .lock()
                .map_err(|_| StoreError::LockPoisoned("pool checkin"))?
                .push(conn);
        }

        Ok(result?)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
            .await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.slots.close();
        if let Ok(mut idle) = self.idle.lock() {
            idle.clear();
        }
    }
}

#[async_trait]
impl TodoStore for SqliteStore {
    async fn list_todos(&self) -> Result<Vec<Todo>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TODO_COLUMNS} FROM todos ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], todo_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo, StoreError> {
        self.with_conn(move |conn| {
            let now = timestamp(Utc::now());
            conn.execute(
                "INSERT INTO todos (title, description, completed, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![todo.title, todo.description, now],
            )?;
            fetch_todo(conn, conn.last_insert_rowid())?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
    }

    async fn update_todo(
        &self,
        id: TodoId,
        changes: TodoChanges,
    ) -> Result<Option<Todo>, StoreError> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE todos
                 SET title = ?1,
                     description = COALESCE(?2, description),
                     completed = COALESCE(?3, completed),
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    changes.title,
                    changes.description,
                    changes.completed,
                    timestamp(Utc::now()),
                    id
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            fetch_todo(conn, id)
        })
        .await
    }

    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
    ) -> Result<Option<Todo>, StoreError> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE todos SET completed = ?1, updated_at = ?2 WHERE id = ?3",
                params![completed, timestamp(Utc::now()), id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            fetch_todo(conn, id)
        })
        .await
    }

    async fn delete_todo(&self, id: TodoId) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl CalculationLog for SqliteStore {
    async fn record_calculation(
        &self,
        stats: &Statistics,
    ) -> Result<CalculationRecord, StoreError> {
        let stats = stats.clone();
        self.with_conn(move |conn| {
            let created_at = Utc::now();
            let numbers = serde_json::to_string(&stats.numbers)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            conn.execute(
                "INSERT INTO calculations (numbers, sum, average, max_value, min_value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    numbers,
                    stats.sum,
                    stats.average,
                    stats.max,
                    stats.min,
                    timestamp(created_at)
                ],
            )?;
            Ok(CalculationRecord::new(
                conn.last_insert_rowid(),
                &stats,
                created_at,
            ))
        })
        .await
    }

    async fn list_calculations(&self) -> Result<Vec<CalculationRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, numbers, sum, average, max_value, min_value, created_at
                 FROM calculations ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                let numbers: String = row.get(1)?;
                let numbers: Vec<Number> = serde_json::from_str(&numbers).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                })?;
                Ok(CalculationRecord {
                    id: row.get(0)?,
                    numbers,
                    sum: row.get(2)?,
                    average: row.get(3)?,
                    max_value: row.get(4)?,
                    min_value: row.get(5)?,
                    created_at: parse_timestamp(row, 6)?,
                })
            })?;
            rows.collect()
        })
        .await
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn fetch_todo(conn: &Connection, id: TodoId) -> rusqlite::Result<Option<Todo>> {
    conn.query_row(
        &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
        params![id],
        todo_from_row,
    )
    .optional()
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
        created_at: parse_timestamp(row, 4)?,
        updated_at: parse_timestamp(row, 5)?,
    })
}

// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}
