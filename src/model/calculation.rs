use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::ValidationError;

/// Summary statistics over a submitted number sequence.
///
/// `numbers` keeps the caller's JSON numbers as given, so the response
/// echoes the input unmodified (`1` stays `1`, not `1.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub numbers: Vec<Number>,
    pub sum: f64,
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

impl Statistics {
    /// Compute statistics over a non-empty sequence.
    pub fn compute(numbers: Vec<Number>) -> Result<Self, ValidationError> {
        if numbers.is_empty() {
            return Err(ValidationError::EmptyNumbers);
        }

        let values = numbers
            .iter()
            .enumerate()
            .map(|(index, n)| {
                n.as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or(ValidationError::NotANumber(index))
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let sum: f64 = values.iter().sum();
        let average = sum / values.len() as f64;
        // JSON has no infinity; an overflowed sum would serialise as null.
        if !sum.is_finite() || !average.is_finite() {
            return Err(ValidationError::OutOfRange);
        }
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        Ok(Self {
            numbers,
            sum,
            average,
            max,
            min,
        })
    }

    /// Validate a `{numbers}` body and compute over it.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        Self::compute(parse_numbers_field(body)?)
    }
}

/// A persisted calculation log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub id: i64,
    pub numbers: Vec<Number>,
    pub sum: f64,
    pub average: f64,
    pub max_value: f64,
    pub min_value: f64,
    pub created_at: DateTime<Utc>,
}

impl CalculationRecord {
    pub fn new(id: i64, stats: &Statistics, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            numbers: stats.numbers.clone(),
            sum: stats.sum,
            average: stats.average,
            max_value: stats.max,
            min_value: stats.min,
            created_at,
        }
    }
}

/// Extract the `numbers` array from a request body.
pub fn parse_numbers_field(body: &Value) -> Result<Vec<Number>, ValidationError> {
    let items = body
        .get("numbers")
        .and_then(Value::as_array)
        .ok_or(ValidationError::NotAnArray)?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Number(n) => Ok(n.clone()),
            _ => Err(ValidationError::NotANumber(index)),
        })
        .collect()
}

/// Parse comma-separated user input such as `"1, 2.5, 3"`.
///
/// Every token is trimmed and must be a finite number.
pub fn parse_number_list(input: &str) -> Result<Vec<f64>, ValidationError> {
    if input.trim().is_empty() {
        return Err(ValidationError::EmptyNumbers);
    }

    input
        .split(',')
        .map(str::trim)
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ValidationError::InvalidToken(token.to_string()))
        })
        .collect()
}
