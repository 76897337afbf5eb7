//! RFM Segment - Recency-Frequency-Monetary customer segmentation engine
//!
//! Transforms raw sales transactions into per-customer segments through a
//! deterministic pipeline: metric extraction → fixed-bin scoring → rule-based
//! classification → per-segment summary.
//!
//! ## Modules
//!
//! - **Pipeline**: [`run`] and [`RfmEngine`] take transactions to classified rows
//! - **Schema**: parse JSON, NDJSON or CSV input into transactions
//! - **Explorer**: search and segment queries over classified rows

pub mod classifier;
pub mod config;
pub mod error;
pub mod explorer;
pub mod extractor;
pub mod filter;
pub mod pipeline;
pub mod schema;
pub mod scorer;
pub mod summary;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{BinConfig, BinSpec};
pub use error::RfmError;
pub use explorer::RowQuery;
pub use filter::{DatasetSpan, TransactionFilter};
pub use pipeline::{rfm_from_json, run, RfmEngine, RfmOutput, RfmReport};
pub use summary::{
    Overview, ScoreDistribution, SegmentProfile, SegmentStats, SegmentSummary, SummaryReport,
};
pub use types::{ClassifiedRow, MetricRow, Score, ScoredRow, Segment, Transaction};

// Schema exports
pub use schema::{CsvColumns, RawTransaction, SchemaError, TransactionAdapter};

/// Engine version embedded in CLI output
pub const RFM_VERSION: &str = env!("CARGO_PKG_VERSION");
