//! Rule-based segment assignment
//!
//! Rules are checked in a fixed order and the first match wins:
//! 1. R >= 2, F >= 3 and M >= 3: Loyal Customers
//! 2. R <= 2 and F >= 2: At Risk
//! 3. raw frequency <= 2: New Customers
//! 4. anything else: Others
//!
//! Unscored metrics count as 0 in every rule.

use crate::types::{ScoredRow, Segment};

/// Highest raw frequency still treated as a new customer
pub const NEW_CUSTOMER_MAX_FREQUENCY: u64 = 2;

/// Classifier for assigning segments to scored rows
pub struct SegmentClassifier;

impl SegmentClassifier {
    pub fn classify(row: &ScoredRow) -> Segment {
        let r = row.r_score.numeric();
        let f = row.f_score.numeric();
        let m = row.m_score.numeric();

        if r >= 2 && f >= 3 && m >= 3 {
            Segment::LoyalCustomers
        } else if r <= 2 && f >= 2 {
            Segment::AtRisk
        } else if row.metrics.frequency <= NEW_CUSTOMER_MAX_FREQUENCY {
            Segment::NewCustomers
        } else {
            Segment::Others
        }
    }
}
