//! Bin configuration for metric scoring
//!
//! Each metric is scored against an ascending list of boundaries. `n`
//! boundaries define `n - 1` bins; the first bin is closed on both ends and
//! every later bin is open on the left and closed on the right. Labels are
//! assigned to bins in order, so the first label goes to the lowest bin.

use serde::{Deserialize, Serialize};

use crate::error::RfmError;
use crate::types::Score;

/// Largest bin label; labels are single digits so `combined_score` stays
/// unambiguous
pub const MAX_LABEL: u8 = 9;

/// Boundaries and labels for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    /// Ascending bin edges
    pub boundaries: Vec<f64>,
    /// One label per bin, lowest bin first
    pub labels: Vec<u8>,
}

impl BinSpec {
    pub fn new(boundaries: Vec<f64>, labels: Vec<u8>) -> Self {
        Self { boundaries, labels }
    }

    /// Map a raw value to its bin label.
    ///
    /// Values below the first edge, above the last edge, or NaN are
    /// `Unscored`. A `BinSpec` that failed [`BinSpec::validate`] scores nothing.
    pub fn score(&self, value: f64) -> Score {
        let edges = &self.boundaries;
        if edges.len() < 2 || value.is_nan() {
            return Score::Unscored;
        }
        if value < edges[0] || value > edges[edges.len() - 1] {
            return Score::Unscored;
        }

        // First bin whose upper edge covers the value; the lower edge of the
        // first bin is already covered by the range check above.
        edges[1..]
            .iter()
            .position(|upper| value <= *upper)
            .and_then(|bin| self.labels.get(bin))
            .map(|label| Score::Scored(*label))
            .unwrap_or(Score::Unscored)
    }

    /// Check edge ordering, label count and label range
    pub fn validate(&self, metric: &str) -> Result<(), RfmError> {
        if self.boundaries.len() < 2 {
            return Err(RfmError::InvalidBinConfig(format!(
                "{metric}: at least two boundaries are required, got {}",
                self.boundaries.len()
            )));
        }
        if let Some(bad) = self.boundaries.iter().find(|b| !b.is_finite()) {
            return Err(RfmError::InvalidBinConfig(format!(
                "{metric}: boundary {bad} is not finite"
            )));
        }
        if let Some(pair) = self.boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(RfmError::InvalidBinConfig(format!(
                "{metric}: boundaries must be strictly ascending ({} >= {})",
                pair[0], pair[1]
            )));
        }
        let bins = self.boundaries.len() - 1;
        if self.labels.len() != bins {
            return Err(RfmError::InvalidBinConfig(format!(
                "{metric}: {bins} bins need {bins} labels, got {}",
                self.labels.len()
            )));
        }
        if let Some(bad) = self.labels.iter().find(|l| **l > MAX_LABEL) {
            return Err(RfmError::InvalidBinConfig(format!(
                "{metric}: label {bad} is above {MAX_LABEL}"
            )));
        }
        Ok(())
    }
}

/// Bin specs for all three metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinConfig {
    pub recency: BinSpec,
    pub frequency: BinSpec,
    pub monetary: BinSpec,
}

impl Default for BinConfig {
    /// Reference configuration.
    ///
    /// All three metrics label their lowest bin 4. For recency that is the
    /// most recent buyers; for frequency and monetary it is the lowest
    /// counts and spend, so a higher label does not mean the same thing
    /// across metrics.
    fn default() -> Self {
        Self {
            recency: BinSpec::new(vec![0.0, 30.0, 90.0, 180.0, 365.0], vec![4, 3, 2, 1]),
            frequency: BinSpec::new(vec![1.0, 2.0, 5.0, 10.0, 20.0], vec![4, 3, 2, 1]),
            monetary: BinSpec::new(vec![0.0, 500.0, 1000.0, 5000.0, 10000.0], vec![4, 3, 2, 1]),
        }
    }
}

impl BinConfig {
    /// Load and validate a bin configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, RfmError> {
        let config: BinConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, RfmError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), RfmError> {
        self.recency.validate("recency")?;
        self.frequency.validate("frequency")?;
        self.monetary.validate("monetary")?;
        Ok(())
    }
}
