//! Transaction filtering
//!
//! A [`TransactionFilter`] narrows the dataset by calendar date and by
//! transaction amount before metrics are extracted. Bounds are inclusive and
//! each one is optional. Filters are checked against the [`DatasetSpan`] of
//! the unfiltered dataset: a bound outside the data's own range is rejected
//! rather than silently clamped.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::RfmError;
use crate::types::Transaction;

/// Observed range of timestamps and amounts in a dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpan {
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
    pub min_amount: f64,
    pub max_amount: f64,
}

impl DatasetSpan {
    /// Compute the span of a dataset; `None` when it is empty
    pub fn of(dataset: &[Transaction]) -> Option<Self> {
        let first = dataset.first()?;
        let mut span = DatasetSpan {
            first_timestamp: first.timestamp,
            last_timestamp: first.timestamp,
            min_amount: first.amount,
            max_amount: first.amount,
        };

        for tx in &dataset[1..] {
            span.first_timestamp = span.first_timestamp.min(tx.timestamp);
            span.last_timestamp = span.last_timestamp.max(tx.timestamp);
            span.min_amount = span.min_amount.min(tx.amount);
            span.max_amount = span.max_amount.max(tx.amount);
        }

        Some(span)
    }

    pub fn first_date(&self) -> NaiveDate {
        self.first_timestamp.date()
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_timestamp.date()
    }
}

/// Date and amount bounds applied before extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_min: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_max: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_max: Option<f64>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(mut self, min: NaiveDate, max: NaiveDate) -> Self {
        self.date_min = Some(min);
        self.date_max = Some(max);
        self
    }

    pub fn with_amounts(mut self, min: f64, max: f64) -> Self {
        self.amount_min = Some(min);
        self.amount_max = Some(max);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.date_min.is_none()
            && self.date_max.is_none()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
    }

    /// Whether a transaction falls inside every bound
    pub fn matches(&self, tx: &Transaction) -> bool {
        let date = tx.timestamp.date();
        self.date_min.map_or(true, |min| date >= min)
            && self.date_max.map_or(true, |max| date <= max)
            && self.amount_min.map_or(true, |min| tx.amount >= min)
            && self.amount_max.map_or(true, |max| tx.amount <= max)
    }

    /// Transactions that pass the filter, in input order
    pub fn apply<'a>(&self, dataset: &'a [Transaction]) -> Vec<&'a Transaction> {
        dataset.iter().filter(|tx| self.matches(tx)).collect()
    }

    /// Reject inverted ranges and bounds outside the dataset's span
    pub fn validate(&self, span: &DatasetSpan) -> Result<(), RfmError> {
        if let (Some(min), Some(max)) = (self.date_min, self.date_max) {
            if min > max {
                return Err(RfmError::InvalidFilter(format!(
                    "date range is inverted: {min} > {max}"
                )));
            }
        }

        for bound in [self.amount_min, self.amount_max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(RfmError::InvalidFilter(format!(
                    "amount bound {bound} is not finite"
                )));
            }
        }

        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if min > max {
                return Err(RfmError::InvalidFilter(format!(
                    "amount range is inverted: {min} > {max}"
                )));
            }
        }

        let (first, last) = (span.first_date(), span.last_date());
        for date in [self.date_min, self.date_max].into_iter().flatten() {
            if date < first || date > last {
                return Err(RfmError::InvalidFilter(format!(
                    "date {date} is outside the dataset span {first} to {last}"
                )));
            }
        }

        for amount in [self.amount_min, self.amount_max].into_iter().flatten() {
            if amount < span.min_amount || amount > span.max_amount {
                return Err(RfmError::InvalidFilter(format!(
                    "amount {amount} is outside the dataset range {} to {}",
                    span.min_amount, span.max_amount
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: &str, day: u32, hour: u32, amount: f64) -> Transaction {
        Transaction::new(
            id,
            date(2019, 1, day).and_hms_opt(hour, 0, 0).unwrap(),
            amount,
        )
    }

    fn dataset() -> Vec<Transaction> {
        vec![
            tx("A", 5, 13, 548.97),
            tx("B", 8, 10, 80.22),
            tx("C", 3, 13, 340.52),
            tx("A", 27, 20, 489.05),
        ]
    }

    #[test]
    fn test_span() {
        let span = DatasetSpan::of(&dataset()).unwrap();

        assert_eq!(span.first_date(), date(2019, 1, 3));
        assert_eq!(span.last_date(), date(2019, 1, 27));
        assert_eq!(span.min_amount, 80.22);
        assert_eq!(span.max_amount, 548.97);
        assert!(DatasetSpan::of(&[]).is_none());
    }

    #[test]
    fn test_date_bounds_are_inclusive_by_day() {
        let data = dataset();
        let filter = TransactionFilter::new().with_dates(date(2019, 1, 5), date(2019, 1, 27));
        let kept: Vec<&str> = filter
            .apply(&data)
            .iter()
            .map(|tx| tx.entity_id.as_str())
            .collect();

        // The 27th transaction is at 20:00 and still counts
        assert_eq!(kept, vec!["A", "B", "A"]);
    }

    #[test]
    fn test_amount_bounds() {
        let data = dataset();
        let filter = TransactionFilter::new().with_amounts(80.22, 400.0);
        let kept = filter.apply(&data);

        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|tx| tx.amount <= 400.0));
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let data = dataset();
        let filter = TransactionFilter::default();

        assert!(filter.is_empty());
        assert_eq!(filter.apply(&data).len(), data.len());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let span = DatasetSpan::of(&dataset()).unwrap();

        let filter = TransactionFilter::new().with_dates(date(2019, 1, 20), date(2019, 1, 10));
        assert!(matches!(
            filter.validate(&span),
            Err(RfmError::InvalidFilter(_))
        ));

        let filter = TransactionFilter::new().with_amounts(500.0, 100.0);
        assert!(matches!(
            filter.validate(&span),
            Err(RfmError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_non_finite_amount_bounds_rejected() {
        let span = DatasetSpan::of(&dataset()).unwrap();

        let filter = TransactionFilter {
            amount_min: Some(f64::NAN),
            ..Default::default()
        };
        let err = filter.validate(&span).unwrap_err();
        assert!(matches!(err, RfmError::InvalidFilter(_)));
        assert!(err.to_string().contains("not finite"));

        let filter = TransactionFilter {
            amount_max: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(matches!(
            filter.validate(&span),
            Err(RfmError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_bounds_outside_span_rejected() {
        let span = DatasetSpan::of(&dataset()).unwrap();

        let filter = TransactionFilter {
            date_min: Some(date(2018, 12, 31)),
            ..Default::default()
        };
        assert!(filter.validate(&span).is_err());

        let filter = TransactionFilter {
            amount_max: Some(10_000.0),
            ..Default::default()
        };
        assert!(filter.validate(&span).is_err());

        let filter = TransactionFilter::new()
            .with_dates(date(2019, 1, 3), date(2019, 1, 27))
            .with_amounts(80.22, 548.97);
        assert!(filter.validate(&span).is_ok());
    }

    #[test]
    fn test_filter_deserializes_partial_bounds() {
        let filter: TransactionFilter =
            serde_json::from_str(r#"{"date_min": "2019-01-05", "amount_max": 500.0}"#).unwrap();

        assert_eq!(filter.date_min, Some(date(2019, 1, 5)));
        assert_eq!(filter.date_max, None);
        assert_eq!(filter.amount_max, Some(500.0));
    }
}
