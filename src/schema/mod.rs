//! Transaction input schema
//!
//! This module turns tabular input (JSON, NDJSON, CSV) into validated
//! [`Transaction`](crate::types::Transaction)s. It is the only place schema
//! errors are raised; the pipeline assumes well-formed transactions.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
