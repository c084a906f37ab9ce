//! A retry-guarded API gateway in front of a todo service and a calculation
//! service, all speaking JSON over HTTP.
//!
//! Every remote call (gateway to service, service to store) runs through
//! [`retry`] with a fixed attempt count and a fixed delay.

pub mod calc;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod retry;
pub mod server;
pub mod store;
pub mod todo;

pub use calc::{CalculationOutcome, CalculationService};
pub use client::{Action, ClientError, GatewayClient};
pub use config::{ConfigError, GatewayConfig, ServiceConfig, ServiceKind, StoreConfig, StoreUrl};
pub use error::ServiceError;
pub use gateway::{Gateway, GatewayFailure, HealthReport, UpstreamError};
pub use model::{CalculationRecord, NewTodo, Statistics, Todo, TodoChanges, ValidationError};
pub use retry::{retry, retry_if, RetryPolicy};
pub use server::ServiceInfo;
pub use store::{CalculationLog, MemoryStore, Store, StoreBackend, StoreError, TodoStore};
pub use todo::TodoService;
