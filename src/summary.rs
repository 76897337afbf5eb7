//! Aggregates over classified rows
//!
//! - Per-segment counts and means
//! - Dataset-wide overview
//! - Score distributions for R, F, M and the combined score
//! - Segment profiles with descriptions and recommendations

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::classifier::NEW_CUSTOMER_MAX_FREQUENCY;
use crate::types::{ClassifiedRow, MetricRow, Score, Segment};

/// Label used for combined scores folded out of the top-N
pub const OTHER_SCORES: &str = "Other Scores";

/// Count and mean metrics for a group of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub count: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

impl SegmentStats {
    /// Stats over a set of metric rows; `None` for an empty set
    pub fn from_metrics<'a, I>(rows: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MetricRow>,
    {
        let mut acc = StatsAccumulator::default();
        for row in rows {
            acc.add(row);
        }
        acc.finish()
    }
}

#[derive(Default)]
struct StatsAccumulator {
    count: usize,
    recency: f64,
    frequency: f64,
    monetary: f64,
}

impl StatsAccumulator {
    fn add(&mut self, row: &MetricRow) {
        self.count += 1;
        self.recency += row.recency as f64;
        self.frequency += row.frequency as f64;
        self.monetary += row.monetary;
    }

    fn finish(self) -> Option<SegmentStats> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(SegmentStats {
            count: self.count,
            mean_recency: self.recency / n,
            mean_frequency: self.frequency / n,
            mean_monetary: self.monetary / n,
        })
    }
}

/// Stats per segment, for segments with at least one member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentSummary(BTreeMap<Segment, SegmentStats>);

impl SegmentSummary {
    pub fn from_rows(rows: &[ClassifiedRow]) -> Self {
        let mut groups: BTreeMap<Segment, StatsAccumulator> = BTreeMap::new();
        for row in rows {
            groups.entry(row.segment).or_default().add(row.metrics());
        }

        SegmentSummary(
            groups
                .into_iter()
                .filter_map(|(segment, acc)| acc.finish().map(|stats| (segment, stats)))
                .collect(),
        )
    }

    pub fn get(&self, segment: Segment) -> Option<&SegmentStats> {
        self.0.get(&segment)
    }

    /// Segments in rule priority order
    pub fn iter(&self) -> impl Iterator<Item = (&Segment, &SegmentStats)> {
        self.0.iter()
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of rows across all segments
    pub fn total(&self) -> usize {
        self.0.values().map(|stats| stats.count).sum()
    }
}

/// Dataset-wide headline numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_entities: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

impl Overview {
    pub fn from_rows(rows: &[ClassifiedRow]) -> Option<Self> {
        let stats = SegmentStats::from_metrics(rows.iter().map(ClassifiedRow::metrics))?;
        Some(Overview {
            total_entities: stats.count,
            mean_recency: stats.mean_recency,
            mean_frequency: stats.mean_frequency,
            mean_monetary: stats.mean_monetary,
        })
    }
}

/// How often a score value occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCount {
    pub score: String,
    pub count: usize,
}

/// Score frequencies for each metric and for the combined score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub recency: Vec<ScoreCount>,
    pub frequency: Vec<ScoreCount>,
    pub monetary: Vec<ScoreCount>,
    /// Most common combined scores, the rest folded into `Other Scores`
    pub combined: Vec<ScoreCount>,
}

impl ScoreDistribution {
    pub fn from_rows(rows: &[ClassifiedRow], top_n: usize) -> Self {
        Self {
            recency: count_scores(rows.iter().map(|r| r.scored.r_score)),
            frequency: count_scores(rows.iter().map(|r| r.scored.f_score)),
            monetary: count_scores(rows.iter().map(|r| r.scored.m_score)),
            combined: top_combined(rows, top_n),
        }
    }
}

/// Counts per score, descending by count; ties keep first appearance
fn count_scores<I>(scores: I) -> Vec<ScoreCount>
where
    I: IntoIterator<Item = Score>,
{
    count_ordered(scores.into_iter().map(|score| score.to_string()))
}

fn count_ordered<I>(values: I) -> Vec<ScoreCount>
where
    I: IntoIterator<Item = String>,
{
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ScoreCount> = Vec::new();

    for value in values {
        match slots.get(&value) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                slots.insert(value.clone(), counts.len());
                counts.push(ScoreCount {
                    score: value,
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-appearance order among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

fn top_combined(rows: &[ClassifiedRow], top_n: usize) -> Vec<ScoreCount> {
    let mut counts = count_ordered(rows.iter().map(|r| r.scored.combined_score.clone()));
    if counts.len() <= top_n {
        return counts;
    }

    let rest: usize = counts[top_n..].iter().map(|c| c.count).sum();
    counts.truncate(top_n);
    counts.push(ScoreCount {
        score: OTHER_SCORES.to_string(),
        count: rest,
    });
    counts
}

/// Stats for rows with at most `max_frequency` transactions
pub fn frequency_cohort(rows: &[ClassifiedRow], max_frequency: u64) -> Option<SegmentStats> {
    SegmentStats::from_metrics(
        rows.iter()
            .map(ClassifiedRow::metrics)
            .filter(|m| m.frequency <= max_frequency),
    )
}

/// One segment's stats with its description and recommendations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentProfile {
    pub segment: Segment,
    #[serde(flatten)]
    pub stats: SegmentStats,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}

/// Everything the segment summary view shows for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub reference_date: NaiveDateTime,
    pub overview: Option<Overview>,
    /// Populated segments in rule priority order
    pub segments: Vec<SegmentProfile>,
    /// Low-frequency cohort, only when no row was classified as a new customer
    pub new_customer_cohort: Option<SegmentStats>,
}

impl SummaryReport {
    pub fn from_rows(reference_date: NaiveDateTime, rows: &[ClassifiedRow]) -> Self {
        let summary = SegmentSummary::from_rows(rows);
        let new_customer_cohort = match summary.get(Segment::NewCustomers) {
            Some(_) => None,
            None => frequency_cohort(rows, NEW_CUSTOMER_MAX_FREQUENCY),
        };
        let segments = summary
            .iter()
            .map(|(segment, stats)| SegmentProfile {
                segment: *segment,
                stats: stats.clone(),
                description: segment.description(),
                recommendations: segment.recommendations(),
            })
            .collect();

        Self {
            reference_date,
            overview: Overview::from_rows(rows),
            segments,
            new_customer_cohort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoredRow;
    use pretty_assertions::assert_eq;

    fn row(
        id: &str,
        recency: i64,
        frequency: u64,
        monetary: f64,
        segment: Segment,
    ) -> ClassifiedRow {
        row_scored(id, recency, frequency, monetary, segment, "444")
    }

    fn row_scored(
        id: &str,
        recency: i64,
        frequency: u64,
        monetary: f64,
        segment: Segment,
        combined: &str,
    ) -> ClassifiedRow {
        ClassifiedRow {
            scored: ScoredRow {
                metrics: MetricRow {
                    entity_id: id.to_string(),
                    recency,
                    frequency,
                    monetary,
                },
                r_score: Score::Scored(4),
                f_score: Score::Scored(4),
                m_score: Score::Scored(4),
                combined_score: combined.to_string(),
            },
            segment,
        }
    }

    #[test]
    fn test_summary_groups_by_segment() {
        let rows = vec![
            row("A", 0, 2, 150.0, Segment::LoyalCustomers),
            row("B", 10, 4, 250.0, Segment::LoyalCustomers),
            row("C", 200, 1, 90.0, Segment::NewCustomers),
        ];
        let summary = SegmentSummary::from_rows(&rows);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary.total(), 3);
        assert_eq!(
            summary.get(Segment::LoyalCustomers),
            Some(&SegmentStats {
                count: 2,
                mean_recency: 5.0,
                mean_frequency: 3.0,
                mean_monetary: 200.0,
            })
        );
        assert!(summary.get(Segment::AtRisk).is_none());
    }

    #[test]
    fn test_summary_order_and_json_keys() {
        let rows = vec![
            row("A", 1, 30, 1.0, Segment::Others),
            row("B", 1, 1, 1.0, Segment::LoyalCustomers),
        ];
        let summary = SegmentSummary::from_rows(&rows);
        let order: Vec<Segment> = summary.segments().collect();

        assert_eq!(order, vec![Segment::LoyalCustomers, Segment::Others]);

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["Loyal Customers"]["count"], 1);
        assert_eq!(value["Others"]["mean_frequency"], 30.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = SegmentSummary::from_rows(&[]);
        assert!(summary.is_empty());
        assert!(Overview::from_rows(&[]).is_none());
    }

    #[test]
    fn test_overview() {
        let rows = vec![
            row("A", 0, 1, 100.0, Segment::NewCustomers),
            row("B", 30, 3, 300.0, Segment::Others),
        ];
        let overview = Overview::from_rows(&rows).unwrap();

        assert_eq!(overview.total_entities, 2);
        assert!((overview.mean_recency - 15.0).abs() < 1e-9);
        assert!((overview.mean_frequency - 2.0).abs() < 1e-9);
        assert!((overview.mean_monetary - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_combined_distribution_folds_tail() {
        let combos = ["444", "344", "444", "111", "222", "344", "444", "123"];
        let rows: Vec<ClassifiedRow> = combos
            .iter()
            .enumerate()
            .map(|(i, c)| row_scored(&i.to_string(), 0, 1, 1.0, Segment::Others, c))
            .collect();

        let dist = ScoreDistribution::from_rows(&rows, 2);

        assert_eq!(
            dist.combined,
            vec![
                ScoreCount {
                    score: "444".to_string(),
                    count: 3
                },
                ScoreCount {
                    score: "344".to_string(),
                    count: 2
                },
                ScoreCount {
                    score: OTHER_SCORES.to_string(),
                    count: 3
                },
            ]
        );
        assert_eq!(
            dist.recency,
            vec![ScoreCount {
                score: "4".to_string(),
                count: 8
            }]
        );
    }

    #[test]
    fn test_unscored_counted_under_marker() {
        let mut unscored = row("A", 0, 1, 20000.0, Segment::NewCustomers);
        unscored.scored.m_score = Score::Unscored;
        let rows = vec![unscored, row("B", 0, 1, 10.0, Segment::NewCustomers)];

        let dist = ScoreDistribution::from_rows(&rows, 7);

        assert_eq!(
            dist.monetary,
            vec![
                ScoreCount {
                    score: "Other".to_string(),
                    count: 1
                },
                ScoreCount {
                    score: "4".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_frequency_cohort() {
        let rows = vec![
            row("A", 4, 1, 100.0, Segment::AtRisk),
            row("B", 8, 2, 300.0, Segment::LoyalCustomers),
            row("C", 1, 9, 900.0, Segment::Others),
        ];
        let cohort = frequency_cohort(&rows, 2).unwrap();

        assert_eq!(cohort.count, 2);
        assert!((cohort.mean_recency - 6.0).abs() < 1e-9);
        assert!(frequency_cohort(&rows, 0).is_none());
    }

    fn reference() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2019, 3, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_summary_report_profiles() {
        let rows = vec![
            row("A", 3, 4, 400.0, Segment::Others),
            row("B", 0, 1, 100.0, Segment::NewCustomers),
            row("C", 9, 2, 300.0, Segment::LoyalCustomers),
        ];
        let report = SummaryReport::from_rows(reference(), &rows);

        let order: Vec<Segment> = report.segments.iter().map(|p| p.segment).collect();
        assert_eq!(
            order,
            vec![Segment::LoyalCustomers, Segment::NewCustomers, Segment::Others]
        );
        assert_eq!(report.segments[0].stats.count, 1);
        assert_eq!(
            report.segments[0].recommendations,
            Segment::LoyalCustomers.recommendations()
        );
        assert_eq!(report.overview.as_ref().map(|o| o.total_entities), Some(3));
        assert_eq!(report.new_customer_cohort, None);
    }

    #[test]
    fn test_summary_report_cohort_fallback() {
        let rows = vec![
            row("A", 200, 1, 100.0, Segment::AtRisk),
            row("B", 5, 9, 900.0, Segment::Others),
        ];
        let report = SummaryReport::from_rows(reference(), &rows);

        let cohort = report.new_customer_cohort.as_ref().unwrap();
        assert_eq!(cohort.count, 1);
        assert!((cohort.mean_recency - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_report_json() {
        let rows = vec![row("A", 200, 1, 100.0, Segment::AtRisk)];
        let value = serde_json::to_value(SummaryReport::from_rows(reference(), &rows)).unwrap();

        assert_eq!(value["reference_date"], "2019-03-30T00:00:00");
        assert_eq!(value["segments"][0]["segment"], "At Risk");
        assert_eq!(value["segments"][0]["count"], 1);
        assert_eq!(
            value["segments"][0]["description"],
            Segment::AtRisk.description()
        );
        assert!(value["segments"][0]["recommendations"].is_array());
        assert_eq!(value["new_customer_cohort"]["count"], 1);
    }
}
