//! Metric scoring
//!
//! Maps each raw metric of a [`MetricRow`] onto its configured bins and builds
//! the combined R-F-M score string.

use crate::config::BinConfig;
use crate::types::{MetricRow, Score, ScoredRow};

/// Scorer for attaching R, F and M scores to metric rows
pub struct SegmentScorer;

impl SegmentScorer {
    /// Score one metric row against the given bins
    pub fn score(metrics: MetricRow, bins: &BinConfig) -> ScoredRow {
        let r_score = bins.recency.score(metrics.recency as f64);
        let f_score = bins.frequency.score(metrics.frequency as f64);
        let m_score = bins.monetary.score(metrics.monetary);
        let combined_score = combine(r_score, f_score, m_score);

        ScoredRow {
            metrics,
            r_score,
            f_score,
            m_score,
            combined_score,
        }
    }
}

fn combine(r: Score, f: Score, m: Score) -> String {
    format!("{r}{f}{m}")
}
