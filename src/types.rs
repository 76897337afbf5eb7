//! Core types for the RFM pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: transactions, metric rows, scored rows and classified rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker used for an unscored metric in combined scores and distributions
pub const UNSCORED_MARKER: &str = "Other";

/// A single sales transaction
///
/// Amounts are expected to be non-negative; the ingestion layer in
/// [`crate::schema`] rejects rows that are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Grouping key (invoice or customer identifier)
    pub entity_id: String,
    /// When the transaction happened
    pub timestamp: NaiveDateTime,
    /// Transaction total
    pub amount: f64,
}

impl Transaction {
    pub fn new(entity_id: impl Into<String>, timestamp: NaiveDateTime, amount: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            amount,
        }
    }
}

/// Raw recency, frequency and monetary values for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub entity_id: String,
    /// Whole days between the reference date and the latest transaction
    pub recency: i64,
    /// Number of transactions
    pub frequency: u64,
    /// Sum of transaction amounts
    pub monetary: f64,
}

/// Ordinal score for a single metric
///
/// Serializes as the bare label, or `null` when the value fell outside
/// every configured bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Scored(u8),
    Unscored,
}

impl Score {
    /// Numeric value used by the segment rules; unscored counts as 0
    pub fn numeric(&self) -> u8 {
        match self {
            Score::Scored(label) => *label,
            Score::Unscored => 0,
        }
    }

    pub fn is_scored(&self) -> bool {
        matches!(self, Score::Scored(_))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Scored(label) => write!(f, "{label}"),
            Score::Unscored => f.write_str(UNSCORED_MARKER),
        }
    }
}

/// Metric row with its three scores attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    #[serde(flatten)]
    pub metrics: MetricRow,
    pub r_score: Score,
    pub f_score: Score,
    pub m_score: Score,
    /// R, F and M labels concatenated in that order
    pub combined_score: String,
}

/// Named customer segment
///
/// Variant order is rule priority order, which is also the order segments
/// appear in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "Loyal Customers")]
    LoyalCustomers,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "New Customers")]
    NewCustomers,
    #[serde(rename = "Others")]
    Others,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::LoyalCustomers,
        Segment::AtRisk,
        Segment::NewCustomers,
        Segment::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::AtRisk => "At Risk",
            Segment::NewCustomers => "New Customers",
            Segment::Others => "Others",
        }
    }

    /// Look up a segment by its display name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Segment> {
        let name = name.trim();
        Segment::ALL
            .into_iter()
            .find(|segment| segment.as_str().eq_ignore_ascii_case(name))
    }

    pub fn description(&self) -> &'static str {
        match self {
            Segment::LoyalCustomers => "Consistent and dependable customers",
            Segment::AtRisk => "Customers who haven't purchased recently",
            Segment::NewCustomers => {
                "Customers who purchased recently but have not made many purchases yet"
            }
            Segment::Others => "Customers not matched by any segment rule",
        }
    }

    /// Suggested marketing actions for the segment
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            Segment::LoyalCustomers => &[
                "Give early access to sales",
                "Offer exclusive discounts and personalized experiences to show appreciation",
                "Upgrade them to a card with a higher limit",
                "Consider a brand deal, depending on influence",
            ],
            Segment::AtRisk => &[
                "Send surveys to identify concerns",
                "Incentivize them to come back with exclusive promotions",
                "Send promotional emails that make products more desirable",
                "Follow up on recent purchases to ask about product satisfaction",
            ],
            Segment::NewCustomers => &[
                "Encourage a credit card application",
                "Offer a free shipping coupon with the first online purchase",
                "Encourage an app download by explaining the rewards program",
                "Register them for emails",
            ],
            Segment::Others => &[],
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored row with its assigned segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    #[serde(flatten)]
    pub scored: ScoredRow,
    pub segment: Segment,
}

impl ClassifiedRow {
    pub fn entity_id(&self) -> &str {
        &self.scored.metrics.entity_id
    }

    pub fn metrics(&self) -> &MetricRow {
        &self.scored.metrics
    }
}
