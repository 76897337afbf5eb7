//! Raw transaction record as it arrives from tabular input
//!
//! Records keep their fields as text until validated so that a single bad
//! row can be reported precisely instead of failing the whole parse.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::Transaction;

/// Timestamp layouts accepted besides RFC 3339
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts, read as midnight
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Transaction amount as found in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawAmount::Number(n) => Some(*n),
            RawAmount::Text(s) => s.trim().parse().ok(),
        }
    }

    fn describe(&self) -> String {
        match self {
            RawAmount::Number(n) => n.to_string(),
            RawAmount::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for RawAmount {
    fn from(v: f64) -> Self {
        RawAmount::Number(v)
    }
}

impl From<&str> for RawAmount {
    fn from(v: &str) -> Self {
        RawAmount::Text(v.to_string())
    }
}

/// Unvalidated transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub entity_id: String,
    pub timestamp: String,
    pub amount: RawAmount,
}

impl RawTransaction {
    pub fn new(
        entity_id: impl Into<String>,
        timestamp: impl Into<String>,
        amount: impl Into<RawAmount>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp: timestamp.into(),
            amount: amount.into(),
        }
    }

    /// Check the record without keeping the result
    pub fn validate(&self, row: usize) -> Result<(), SchemaError> {
        self.to_transaction(row).map(|_| ())
    }

    /// Convert into a [`Transaction`]; `row` is used in error messages
    pub fn to_transaction(&self, row: usize) -> Result<Transaction, SchemaError> {
        if self.entity_id.trim().is_empty() {
            return Err(SchemaError::EmptyEntityId { row });
        }

        let timestamp =
            parse_timestamp(&self.timestamp).ok_or_else(|| SchemaError::InvalidTimestamp {
                row,
                value: self.timestamp.clone(),
            })?;

        let amount = self
            .amount
            .as_f64()
            .filter(|a| a.is_finite())
            .ok_or_else(|| SchemaError::InvalidAmount {
                row,
                value: self.amount.describe(),
            })?;
        if amount < 0.0 {
            return Err(SchemaError::NegativeAmount { row, amount });
        }

        Ok(Transaction {
            entity_id: self.entity_id.clone(),
            timestamp,
            amount,
        })
    }
}

/// Parse a timestamp in any of the accepted layouts.
///
/// RFC 3339 values with an offset are converted to UTC and the offset is
/// dropped.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Schema errors for raw transaction input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Row {row}: expected {expected} fields, got {actual}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Unreadable CSV text; row 0 is the header
    #[error("Row {row}: malformed CSV: {message}")]
    MalformedCsv { row: usize, message: String },

    #[error("Row {row}: entity id is empty")]
    EmptyEntityId { row: usize },

    #[error("Row {row}: unparsable timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },

    #[error("Row {row}: unparsable amount '{value}'")]
    InvalidAmount { row: usize, value: String },

    #[error("Row {row}: negative amount {amount}")]
    NegativeAmount { row: usize, amount: f64 },
}
