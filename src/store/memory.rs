use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{CalculationLog, Store, StoreError, TodoStore};
use crate::model::{CalculationRecord, NewTodo, Statistics, Todo, TodoChanges, TodoId};

/// Process-local store backed by locked maps.
///
/// Ids are assigned from per-table sequences starting at 1.
pub struct MemoryStore {
    todos: RwLock<BTreeMap<TodoId, Todo>>,
    calculations: RwLock<Vec<CalculationRecord>>,
    todo_seq: AtomicI64,
    calculation_seq: AtomicI64,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            todos: RwLock::new(BTreeMap::new()),
            calculations: RwLock::new(Vec::new()),
            todo_seq: AtomicI64::new(1),
            calculation_seq: AtomicI64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn list_todos(&self) -> Result<Vec<Todo>, StoreError> {
        self.ensure_open()?;
        let todos = self
            .todos
            .read()
            .map_err(|_| StoreError::LockPoisoned("todo read"))?;

        let mut listed: Vec<Todo> = todos.values().cloned().collect();
        listed.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(listed)
    }

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo, StoreError> {
        self.ensure_open()?;
        let mut todos = self
            .todos
            .write()
            .map_err(|_| StoreError::LockPoisoned("todo write"))?;

        let now = Utc::now();
        let stored = Todo {
            id: self.todo_seq.fetch_add(1, Ordering::SeqCst),
            title: todo.title,
            description: todo.description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        todos.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_todo(
        &self,
        id: TodoId,
        changes: TodoChanges,
    ) -> Result<Option<Todo>, StoreError> {
        self.ensure_open()?;
        let mut todos = self
            .todos
            .write()
            .map_err(|_| StoreError::LockPoisoned("todo write"))?;

        Ok(todos.get_mut(&id).map(|todo| {
            changes.apply(todo);
            todo.updated_at = Utc::now();
            todo.clone()
        }))
    }

    async fn set_completed(
        &self,
        id: TodoId,
        completed: bool,
    ) -> Result<Option<Todo>, StoreError> {
        self.ensure_open()?;
        let mut todos = self
            .todos
            .write()
            .map_err(|_| StoreError::LockPoisoned("todo write"))?;

        Ok(todos.get_mut(&id).map(|todo| {
            todo.completed = completed;
            todo.updated_at = Utc::now();
            todo.clone()
        }))
    }

    async fn delete_todo(&self, id: TodoId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut todos = self
            .todos
            .write()
            .map_err(|_| StoreError::LockPoisoned("todo write"))?;

        Ok(todos.remove(&id).is_some())
    }
}

#[async_trait]
impl CalculationLog for MemoryStore {
    async fn record_calculation(
        &self,
        stats: &Statistics,
    ) -> Result<CalculationRecord, StoreError> {
        self.ensure_open()?;
        let mut calculations = self
            .calculations
            .write()
            .map_err(|_| StoreError::LockPoisoned("calculation write"))?;

        let id = self.calculation_seq.fetch_add(1, Ordering::SeqCst);
        let record = CalculationRecord::new(id, stats, Utc::now());
        calculations.push(record.clone());
        Ok(record)
    }

    async fn list_calculations(&self) -> Result<Vec<CalculationRecord>, StoreError> {
        self.ensure_open()?;
        let calculations = self
            .calculations
            .read()
            .map_err(|_| StoreError::LockPoisoned("calculation read"))?;

        Ok(calculations.iter().rev().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_fresh_ids() {
        let store = MemoryStore::new();
        let first = store.insert_todo(NewTodo::new("first")).await.unwrap();
        let second = store.insert_todo(NewTodo::new("second")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(!first.completed);
        assert_eq!(first.created_at, first.updated_at);
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = MemoryStore::new();
        for title in ["a", "b", "c"] {
            store.insert_todo(NewTodo::new(title)).await.unwrap();
        }

        let titles: Vec<String> = store
            .list_todos()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
        assert_eq!(store.list_todos().await.unwrap(), store.list_todos().await.unwrap());
    }

    #[tokio::test]
    async fn missing_ids_are_not_errors() {
        let store = MemoryStore::new();
        let changes = TodoChanges {
            title: "x".into(),
            description: None,
            completed: None,
        };
        assert_eq!(store.update_todo(99, changes).await, Ok(None));
        assert_eq!(store.set_completed(99, true).await, Ok(None));
        assert_eq!(store.delete_todo(99).await, Ok(false));
    }

    #[tokio::test]
    async fn update_and_complete() {
        let store = MemoryStore::new();
        let todo = store.insert_todo(NewTodo::new("draft")).await.unwrap();

        let changes = TodoChanges {
            title: "final".into(),
            description: Some("notes".into()),
            completed: None,
        };
        let updated = store.update_todo(todo.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.description.as_deref(), Some("notes"));
        assert!(!updated.completed);

        let done = store.set_completed(todo.id, true).await.unwrap().unwrap();
        assert!(done.completed);
        assert!(done.updated_at >= todo.updated_at);
    }

    #[tokio::test]
    async fn calculation_log_is_newest_first() {
        let store = MemoryStore::new();
        let a = Statistics::from_json(&json!({ "numbers": [1] })).unwrap();
        let b = Statistics::from_json(&json!({ "numbers": [2, 3] })).unwrap();
        store.record_calculation(&a).await.unwrap();
        store.record_calculation(&b).await.unwrap();

        let history = store.list_calculations().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, 2);
        assert_eq!(history[0].sum, 5.0);
        assert_eq!(history[1].id, 1);
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.close().await;
        assert_eq!(store.ping().await, Err(StoreError::Closed));
        assert_eq!(
            store.insert_todo(NewTodo::new("late")).await,
            Err(StoreError::Closed)
        );
    }
}
