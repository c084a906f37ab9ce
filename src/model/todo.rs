use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ValidationError;

pub type TodoId = i64;

/// Longest title the store accepts.
pub const MAX_TITLE_CHARS: usize = 255;

/// A todo as owned by the store. Ids and timestamps are assigned there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating a todo. New todos start incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate a `{title, description}` body.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        Ok(Self {
            title: title(body)?,
            description: description(body)?,
        })
    }
}

/// Validated input for a full update.
///
/// `None` fields are left as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoChanges {
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TodoChanges {
    /// Validate a `{title, description, completed}` body.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let completed = match body.get("completed") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(_) => return Err(ValidationError::InvalidCompleted),
        };

        Ok(Self {
            title: title(body)?,
            description: description(body)?,
            completed,
        })
    }

    /// Apply these changes to a stored todo.
    pub fn apply(&self, todo: &mut Todo) {
        todo.title = self.title.clone();
        if let Some(description) = &self.description {
            todo.description = Some(description.clone());
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
    }
}

/// Validate a `{completed}` body for the completion toggle.
pub fn completed_flag(body: &Value) -> Result<bool, ValidationError> {
    body.get("completed")
        .and_then(Value::as_bool)
        .ok_or(ValidationError::InvalidCompleted)
}

/// Parse a path id. Anything that is not a positive integer names no todo.
pub fn parse_id(raw: &str) -> Option<TodoId> {
    raw.parse::<TodoId>().ok().filter(|id| *id > 0)
}

fn title(body: &Value) -> Result<String, ValidationError> {
    let title = match body.get("title") {
        Some(Value::String(title)) if !title.is_empty() => title,
        _ => return Err(ValidationError::MissingTitle),
    };

    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(title.clone())
}

fn description(body: &Value) -> Result<Option<String>, ValidationError> {
    match body.get("description") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(description)) => Ok(Some(description.clone())),
        Some(_) => Err(ValidationError::InvalidDescription),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_todo_requires_title() {
        assert_eq!(
            NewTodo::from_json(&json!({ "description": "x" })),
            Err(ValidationError::MissingTitle)
        );
        assert_eq!(
            NewTodo::from_json(&json!({ "title": "" })),
            Err(ValidationError::MissingTitle)
        );
        assert_eq!(
            NewTodo::from_json(&json!({ "title": 42 })),
            Err(ValidationError::MissingTitle)
        );
    }

    #[test]
    fn new_todo_accepts_optional_description() {
        let todo = NewTodo::from_json(&json!({ "title": "Buy milk" })).unwrap();
        assert_eq!(todo, NewTodo::new("Buy milk"));

        let todo =
            NewTodo::from_json(&json!({ "title": "Buy milk", "description": "2 litres" }))
                .unwrap();
        assert_eq!(todo, NewTodo::new("Buy milk").with_description("2 litres"));
    }

    #[test]
    fn title_length_is_bounded() {
        let long = "a".repeat(MAX_TITLE_CHARS + 1);
        assert_eq!(
            NewTodo::from_json(&json!({ "title": long })),
            Err(ValidationError::TitleTooLong)
        );
        let max = "a".repeat(MAX_TITLE_CHARS);
        assert!(NewTodo::from_json(&json!({ "title": max })).is_ok());
    }

    #[test]
    fn changes_validate_completed_type() {
        assert_eq!(
            TodoChanges::from_json(&json!({ "title": "t", "completed": "yes" })),
            Err(ValidationError::InvalidCompleted)
        );
        let changes = TodoChanges::from_json(&json!({ "title": "t", "completed": true })).unwrap();
        assert_eq!(changes.completed, Some(true));
    }

    #[test]
    fn changes_leave_missing_fields() {
        let now = Utc::now();
        let mut todo = Todo {
            id: 1,
            title: "old".into(),
            description: Some("keep".into()),
            completed: true,
            created_at: now,
            updated_at: now,
        };
        TodoChanges::from_json(&json!({ "title": "new" }))
            .unwrap()
            .apply(&mut todo);

        assert_eq!(todo.title, "new");
        assert_eq!(todo.description.as_deref(), Some("keep"));
        assert!(todo.completed);
    }

    #[test]
    fn completed_flag_must_be_boolean() {
        assert_eq!(completed_flag(&json!({ "completed": false })), Ok(false));
        assert_eq!(
            completed_flag(&json!({ "completed": 1 })),
            Err(ValidationError::InvalidCompleted)
        );
        assert_eq!(
            completed_flag(&json!({})),
            Err(ValidationError::InvalidCompleted)
        );
    }

    #[test]
    fn ids_are_positive_integers() {
        assert_eq!(parse_id("7"), Some(7));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
    }
}
