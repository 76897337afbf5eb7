//! Metric extraction
//!
//! Aggregates transactions into one [`MetricRow`] per entity. Recency is
//! measured against a reference date that the caller computes once per run
//! (see [`MetricExtractor::reference_date`]) so every row shares the same
//! anchor.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::error::RfmError;
use crate::types::{MetricRow, Transaction};

/// Extractor for per-entity recency, frequency and monetary values
pub struct MetricExtractor;

impl MetricExtractor {
    /// Latest timestamp in the dataset, `None` when it is empty
    pub fn reference_date<'a, I>(transactions: I) -> Option<NaiveDateTime>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        transactions.into_iter().map(|tx| tx.timestamp).max()
    }

    /// Group transactions by exact entity id.
    ///
    /// Rows come out in the order each entity id first appears. Fails with
    /// [`RfmError::EmptyDataset`] when there are no transactions.
    pub fn extract<'a, I>(
        transactions: I,
        reference_date: NaiveDateTime,
    ) -> Result<Vec<MetricRow>, RfmError>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut index: HashMap<&'a str, usize> = HashMap::new();
        let mut accumulators: Vec<EntityAccumulator<'a>> = Vec::new();

        for tx in transactions {
            match index.get(tx.entity_id.as_str()) {
                Some(&slot) => accumulators[slot].add(tx),
                None => {
                    index.insert(tx.entity_id.as_str(), accumulators.len());
                    accumulators.push(EntityAccumulator::new(tx));
                }
            }
        }

        if accumulators.is_empty() {
            return Err(RfmError::EmptyDataset);
        }

        Ok(accumulators
            .into_iter()
            .map(|acc| acc.finish(reference_date))
            .collect())
    }
}

/// Running totals for one entity
struct EntityAccumulator<'a> {
    entity_id: &'a str,
    latest: NaiveDateTime,
    count: u64,
    total: f64,
}

impl<'a> EntityAccumulator<'a> {
    fn new(tx: &'a Transaction) -> Self {
        Self {
            entity_id: &tx.entity_id,
            latest: tx.timestamp,
            count: 1,
            total: tx.amount,
        }
    }

    fn add(&mut self, tx: &Transaction) {
        self.latest = self.latest.max(tx.timestamp);
        self.count += 1;
        self.total += tx.amount;
    }

    fn finish(self, reference_date: NaiveDateTime) -> MetricRow {
        // A reference date earlier than the entity's own latest purchase can
        // only come from a caller-supplied anchor; clamp to keep recency >= 0.
        let recency = (reference_date - self.latest).num_days().max(0);

        MetricRow {
            entity_id: self.entity_id.to_string(),
            recency,
            frequency: self.count,
            monetary: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn tx(id: &str, day: u32, amount: f64) -> Transaction {
        Transaction::new(id, at(day, 12), amount)
    }

    #[test]
    fn test_reference_date_is_max_timestamp() {
        let data = vec![tx("A", 3, 1.0), tx("B", 20, 1.0), tx("C", 11, 1.0)];
        assert_eq!(MetricExtractor::reference_date(&data), Some(at(20, 12)));
        assert_eq!(MetricExtractor::reference_date(&[]), None);
    }

    #[test]
    fn test_extract_aggregates_per_entity() {
        let data = vec![tx("A", 1, 100.0), tx("A", 11, 50.0)];
        let reference = MetricExtractor::reference_date(&data).unwrap();
        let rows = MetricExtractor::extract(&data, reference).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, "A");
        assert_eq!(rows[0].recency, 0);
        assert_eq!(rows[0].frequency, 2);
        assert!((rows[0].monetary - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_keeps_first_seen_order() {
        let data = vec![
            tx("C", 5, 10.0),
            tx("A", 6, 20.0),
            tx("C", 7, 30.0),
            tx("B", 8, 40.0),
        ];
        let reference = MetricExtractor::reference_date(&data).unwrap();
        let rows = MetricExtractor::extract(&data, reference).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.entity_id.as_str()).collect();

        assert_eq!(ids, vec!["C", "A", "B"]);
        assert_eq!(rows[0].frequency, 2);
        assert_eq!(rows[0].recency, 1);
    }

    #[test]
    fn test_grouping_is_case_sensitive() {
        let data = vec![tx("abc", 1, 1.0), tx("ABC", 1, 1.0), tx("abc ", 1, 1.0)];
        let reference = MetricExtractor::reference_date(&data).unwrap();
        let rows = MetricExtractor::extract(&data, reference).unwrap();

        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_recency_counts_whole_days() {
        let data = vec![
            Transaction::new("A", at(10, 8), 1.0),
            Transaction::new("B", at(9, 20), 1.0),
            Transaction::new("C", at(11, 7), 1.0),
        ];
        let reference = MetricExtractor::reference_date(&data).unwrap();
        let rows = MetricExtractor::extract(&data, reference).unwrap();

        // 23 hours short of a full day
        assert_eq!(rows[0].recency, 0);
        // 35 hours
        assert_eq!(rows[1].recency, 1);
        assert_eq!(rows[2].recency, 0);
    }

    #[test]
    fn test_empty_dataset() {
        let data: Vec<Transaction> = Vec::new();
        let result = MetricExtractor::extract(&data, at(1, 0));

        assert!(matches!(result, Err(RfmError::EmptyDataset)));
    }
}
