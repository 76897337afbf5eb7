//! Pipeline orchestration
//!
//! This module provides the public API of the engine. It runs the full
//! pipeline from transactions to classified rows and segment summaries.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::classifier::SegmentClassifier;
use crate::config::BinConfig;
use crate::error::RfmError;
use crate::explorer::RowQuery;
use crate::extractor::MetricExtractor;
use crate::filter::{DatasetSpan, TransactionFilter};
use crate::schema::TransactionAdapter;
use crate::scorer::SegmentScorer;
use crate::summary::{Overview, ScoreDistribution, SegmentSummary, SummaryReport};
use crate::types::{ClassifiedRow, Score, Transaction};

/// Combined scores kept before folding the rest into "Other Scores"
pub const DEFAULT_TOP_SCORES: usize = 7;

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmOutput {
    /// Latest timestamp in the filtered dataset; recency is measured from here
    pub reference_date: NaiveDateTime,
    /// One row per entity, in first-seen order
    pub rows: Vec<ClassifiedRow>,
    pub summary: SegmentSummary,
}

impl RfmOutput {
    pub fn overview(&self) -> Option<Overview> {
        Overview::from_rows(&self.rows)
    }

    pub fn score_distribution(&self, top_n: usize) -> ScoreDistribution {
        ScoreDistribution::from_rows(&self.rows, top_n)
    }

    /// Segment profiles plus the new-customer fallback cohort
    pub fn summary_report(&self) -> SummaryReport {
        SummaryReport::from_rows(self.reference_date, &self.rows)
    }

    pub fn query(&self, query: &RowQuery) -> Vec<&ClassifiedRow> {
        query.apply(&self.rows)
    }

    pub fn row(&self, entity_id: &str) -> Option<&ClassifiedRow> {
        self.rows.iter().find(|row| row.entity_id() == entity_id)
    }
}

/// Serializable bundle of everything a dashboard shows for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmReport {
    pub reference_date: NaiveDateTime,
    pub overview: Overview,
    pub summary: SegmentSummary,
    pub distribution: ScoreDistribution,
    pub rows: Vec<ClassifiedRow>,
}

/// Run the RFM pipeline over a dataset.
///
/// Pipeline stages:
/// 1. Filter validation against the dataset span
/// 2. Filter application
/// 3. MetricExtractor - per-entity recency, frequency, monetary
/// 4. SegmentScorer - fixed-bin scores
/// 5. SegmentClassifier - rule-based segment
/// 6. SegmentSummary - per-segment counts and means
///
/// Either the complete output is returned or an error; never a partial
/// row set.
///
/// # Example
/// ```ignore
/// let output = run(&transactions, None, &BinConfig::default())?;
/// for row in &output.rows {
///     println!("{} {}", row.entity_id(), row.segment);
/// }
/// ```
pub fn run(
    dataset: &[Transaction],
    filter: Option<&TransactionFilter>,
    bins: &BinConfig,
) -> Result<RfmOutput, RfmError> {
    let span = DatasetSpan::of(dataset).ok_or(RfmError::EmptyDataset)?;

    if let Some(filter) = filter {
        filter.validate(&span)?;
    }
    bins.validate()?;

    let filtered: Vec<&Transaction> = match filter {
        Some(filter) => filter.apply(dataset),
        None => dataset.iter().collect(),
    };
    log::debug!(
        "rfm: {} of {} transactions pass the filter",
        filtered.len(),
        dataset.len()
    );

    let reference_date = MetricExtractor::reference_date(filtered.iter().copied())
        .ok_or(RfmError::EmptyDataset)?;
    let metrics = MetricExtractor::extract(filtered.iter().copied(), reference_date)?;
    log::debug!(
        "rfm: extracted {} entities, reference date {reference_date}",
        metrics.len()
    );

    let rows: Vec<ClassifiedRow> = metrics
        .into_iter()
        .map(|metric| {
            let scored = SegmentScorer::score(metric, bins);
            let segment = SegmentClassifier::classify(&scored);
            ClassifiedRow { scored, segment }
        })
        .collect();

    let unscored = rows
        .iter()
        .filter(|row| {
            [row.scored.r_score, row.scored.f_score, row.scored.m_score]
                .contains(&Score::Unscored)
        })
        .count();
    if unscored > 0 {
        log::warn!("rfm: {unscored} entities have a metric outside the configured bins");
    }

    let summary = SegmentSummary::from_rows(&rows);
    for (segment, stats) in summary.iter() {
        log::info!("rfm: segment={segment} count={}", stats.count);
    }

    Ok(RfmOutput {
        reference_date,
        rows,
        summary,
    })
}

/// Run the pipeline on JSON input and return a JSON report.
///
/// # Arguments
/// * `dataset_json` - JSON array of `{entity_id, timestamp, amount}` records
/// * `filter_json` - Optional [`TransactionFilter`] JSON
/// * `bins_json` - Optional [`BinConfig`] JSON overriding the default bins
///
/// # Example
/// ```ignore
/// let report = rfm_from_json(
///     r#"[{"entity_id": "A", "timestamp": "2019-01-05", "amount": 100.0}]"#.to_string(),
///     None,
///     None,
/// )?;
/// ```
pub fn rfm_from_json(
    dataset_json: String,
    filter_json: Option<String>,
    bins_json: Option<String>,
) -> Result<String, RfmError> {
    let dataset = TransactionAdapter::parse_array(&dataset_json)?;
    let filter = filter_json
        .as_deref()
        .map(|json| serde_json::from_str::<TransactionFilter>(json))
        .transpose()?;
    let bins = match bins_json.as_deref() {
        Some(json) => BinConfig::from_json(json)?,
        None => BinConfig::default(),
    };

    let engine = RfmEngine::with_bins(bins);
    let report = engine.report(&dataset, filter.as_ref())?;
    Ok(serde_json::to_string(&report)?)
}

/// Reusable engine holding a bin configuration.
///
/// Runs are independent; the engine keeps no state between them.
#[derive(Debug, Clone)]
pub struct RfmEngine {
    bins: BinConfig,
    top_scores: usize,
}

impl Default for RfmEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RfmEngine {
    /// Create an engine with the default bins
    pub fn new() -> Self {
        Self {
            bins: BinConfig::default(),
            top_scores: DEFAULT_TOP_SCORES,
        }
    }

    /// Create an engine with custom bins
    pub fn with_bins(bins: BinConfig) -> Self {
        Self {
            bins,
            top_scores: DEFAULT_TOP_SCORES,
        }
    }

    /// Number of combined scores listed individually in reports
    pub fn with_top_scores(mut self, top_scores: usize) -> Self {
        self.top_scores = top_scores;
        self
    }

    pub fn bins(&self) -> &BinConfig {
        &self.bins
    }

    pub fn run(
        &self,
        dataset: &[Transaction],
        filter: Option<&TransactionFilter>,
    ) -> Result<RfmOutput, RfmError> {
        run(dataset, filter, &self.bins)
    }

    pub fn report(
        &self,
        dataset: &[Transaction],
        filter: Option<&TransactionFilter>,
    ) -> Result<RfmReport, RfmError> {
        let output = self.run(dataset, filter)?;
        let overview = output.overview().ok_or(RfmError::EmptyDataset)?;
        let distribution = output.score_distribution(self.top_scores);

        Ok(RfmReport {
            reference_date: output.reference_date,
            overview,
            summary: output.summary,
            distribution,
            rows: output.rows,
        })
    }
}
