//! Row queries for exploring classified output
//!
//! Embedders use [`RowQuery`] to search rows by entity id and narrow them to a
//! set of segments without re-running the pipeline.

use serde::{Deserialize, Serialize};

use crate::types::{ClassifiedRow, Segment};

/// Rows shown per page when no limit is given
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Search and segment filter over classified rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowQuery {
    /// Case-insensitive substring of the entity id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Keep only these segments; empty keeps all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
    /// Maximum number of rows returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn segment(mut self, segment: Segment) -> Self {
        if !self.segments.contains(&segment) {
            self.segments.push(segment);
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &ClassifiedRow) -> bool {
        let segment_ok = self.segments.is_empty() || self.segments.contains(&row.segment);
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => row
                .entity_id()
                .to_lowercase()
                .contains(&term.to_lowercase()),
        };
        segment_ok && search_ok
    }

    /// Matching rows in their original order, up to the limit
    pub fn apply<'a>(&self, rows: &'a [ClassifiedRow]) -> Vec<&'a ClassifiedRow> {
        rows.iter()
            .filter(|row| self.matches(row))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
