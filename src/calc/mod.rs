//! calc: the calculation downstream service.
//!
//! Statistics are computed first; logging them to the store is a
//! best-effort side-write. When the write still fails after the store retry
//! budget, the caller gets the computed statistics back next to the error.

mod http;

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

pub use http::router;

use crate::error::ServiceError;
use crate::model::{CalculationRecord, Statistics};
use crate::retry::{retry, RetryPolicy};
use crate::server::{store_health, ServiceInfo};
use crate::store::{CalculationLog, Store, StoreError};

/// Result of a calculation request that passed validation.
#[derive(Debug)]
pub enum CalculationOutcome {
    /// Computed and logged.
    Stored(Statistics),
    /// Computed, but the log write failed on every attempt.
    Unpersisted {
        calculation: Statistics,
        error: StoreError,
    },
}

impl CalculationOutcome {
    pub fn statistics(&self) -> &Statistics {
        match self {
            CalculationOutcome::Stored(stats) => stats,
            CalculationOutcome::Unpersisted { calculation, .. } => calculation,
        }
    }
}

pub struct CalculationService {
    log: Arc<dyn CalculationLog>,
    retry: RetryPolicy,
    info: ServiceInfo,
}

impl CalculationService {
    pub fn new(log: Arc<dyn CalculationLog>, retry: RetryPolicy, info: ServiceInfo) -> Self {
        Self { log, retry, info }
    }

    /// Validate a `{numbers}` body, compute, then log the result.
    pub async fn calculate(&self, body: &Value) -> Result<CalculationOutcome, ServiceError> {
        let stats = Statistics::from_json(body)?;

        let stored = retry(&self.retry, "calculation.record", || {
            self.log.record_calculation(&stats)
        })
        .await;

        match stored {
            Ok(record) => {
                info!(id = record.id, sum = stats.sum, "calculation stored");
                Ok(CalculationOutcome::Stored(stats))
            }
            Err(err) => {
                error!(%err, "calculation computed but not stored");
                Ok(CalculationOutcome::Unpersisted {
                    calculation: stats,
                    error: err,
                })
            }
        }
    }

    /// Logged calculations, newest first.
    pub async fn history(&self) -> Result<Vec<CalculationRecord>, ServiceError> {
        let records = retry(&self.retry, "calculation.history", || {
            self.log.list_calculations()
        })
        .await?;
        Ok(records)
    }

    pub async fn health(&self) -> Value {
        let connected = match self.log.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "store ping failed");
                false
            }
        };
        store_health(&self.info, connected)
    }
}
