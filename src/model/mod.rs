//! Domain records passed between the gateway, the services and the store.
//!
//! Request bodies arrive as loose JSON; the `from_json` constructors in this
//! module turn them into typed values or a [`ValidationError`]. Validation
//! always runs before any store or downstream call.

pub mod calculation;
pub mod todo;

use thiserror::Error;

pub use calculation::{parse_number_list, parse_numbers_field, CalculationRecord, Statistics};
pub use todo::{completed_flag, parse_id, NewTodo, Todo, TodoChanges, TodoId, MAX_TITLE_CHARS};

/// A request body that fails validation. Maps to HTTP 400.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title is required")]
    MissingTitle,

    #[error("Title must be at most 255 characters")]
    TitleTooLong,

    #[error("Description must be a string")]
    InvalidDescription,

    #[error("Completed state must be a boolean")]
    InvalidCompleted,

    #[error("Please provide an array of numbers")]
    NotAnArray,

    #[error("Please provide at least one number")]
    EmptyNumbers,

    #[error("Element {0} is not a number")]
    NotANumber(usize),

    #[error("Numbers are too large to summarise")]
    OutOfRange,

    #[error("`{0}` is not a number")]
    InvalidToken(String),

    #[error("Invalid JSON body: {0}")]
    MalformedBody(String),
}
