//! Adapter for turning tabular input into transactions
//!
//! Handles JSON arrays, NDJSON and CSV text. CSV columns are looked up by
//! header name so exports with extra columns work unchanged.

use crate::error::RfmError;
use crate::schema::record::{RawAmount, RawTransaction, SchemaError};
use crate::types::Transaction;

/// Header names of the required CSV columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvColumns {
    pub entity_id: String,
    pub timestamp: String,
    pub amount: String,
}

impl Default for CsvColumns {
    /// Column names of the supermarket sales export
    fn default() -> Self {
        Self {
            entity_id: "Invoice ID".to_string(),
            timestamp: "Date".to_string(),
            amount: "Total".to_string(),
        }
    }
}

/// Adapter for converting tabular input into transactions
pub struct TransactionAdapter;

impl TransactionAdapter {
    /// Parse a JSON array of records into validated transactions
    pub fn parse_array(json: &str) -> Result<Vec<Transaction>, RfmError> {
        let records = Self::records_from_array(json)?;
        Ok(Self::to_transactions(&records)?)
    }

    /// Parse NDJSON records into validated transactions
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Transaction>, RfmError> {
        let records = Self::records_from_ndjson(ndjson)?;
        Ok(Self::to_transactions(&records)?)
    }

    /// Parse CSV text into validated transactions
    pub fn parse_csv(text: &str, columns: &CsvColumns) -> Result<Vec<Transaction>, RfmError> {
        let records = Self::records_from_csv(text, columns)?;
        Ok(Self::to_transactions(&records)?)
    }

    /// Read raw records from a JSON array without validating them
    pub fn records_from_array(json: &str) -> Result<Vec<RawTransaction>, RfmError> {
        let records: Vec<RawTransaction> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Read raw records from NDJSON without validating them
    pub fn records_from_ndjson(ndjson: &str) -> Result<Vec<RawTransaction>, RfmError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawTransaction>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(RfmError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Read raw records from CSV text without validating field contents.
    ///
    /// The first record is the header. Quoted fields may hold commas, quotes
    /// and line breaks. Missing columns and rows with the wrong number of
    /// fields are schema errors. Rows are numbered from 1, not counting the
    /// header or blank lines.
    pub fn records_from_csv(
        text: &str,
        columns: &CsvColumns,
    ) -> Result<Vec<RawTransaction>, SchemaError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(text.as_bytes());

        let header = reader
            .headers()
            .map_err(|e| SchemaError::MalformedCsv {
                row: 0,
                message: e.to_string(),
            })?
            .clone();
        if header.is_empty() {
            return Ok(Vec::new());
        }
        let width = header.len();
        let entity_col = column_index(&header, &columns.entity_id)?;
        let timestamp_col = column_index(&header, &columns.timestamp)?;
        let amount_col = column_index(&header, &columns.amount)?;

        let mut records = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let row = idx + 1;
            let fields = result.map_err(|e| SchemaError::MalformedCsv {
                row,
                message: e.to_string(),
            })?;
            if fields.len() != width {
                return Err(SchemaError::RowWidth {
                    row,
                    expected: width,
                    actual: fields.len(),
                });
            }
            records.push(RawTransaction {
                entity_id: fields[entity_col].to_string(),
                timestamp: fields[timestamp_col].to_string(),
                amount: RawAmount::Text(fields[amount_col].to_string()),
            });
        }
        Ok(records)
    }

    /// Validate every record, stopping at the first failure
    pub fn to_transactions(records: &[RawTransaction]) -> Result<Vec<Transaction>, SchemaError> {
        records
            .iter()
            .enumerate()
            .map(|(idx, record)| record.to_transaction(idx + 1))
            .collect()
    }

    /// Validate a batch of records, collecting every failure
    pub fn validate_records(records: &[RawTransaction]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                record.validate(idx + 1).err().map(|error| ValidationResult {
                    index: idx,
                    entity_id: Some(record.entity_id.clone()).filter(|id| !id.is_empty()),
                    error,
                })
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub index: usize,
    pub entity_id: Option<String>,
    pub error: SchemaError,
}

fn column_index(header: &csv::StringRecord, name: &str) -> Result<usize, SchemaError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| SchemaError::MissingColumn {
            column: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> &'static str {
        "Invoice ID,Branch,City,Total,Date,Time,Payment\n\
         750-67-8428,A,Yangon,548.9715,1/5/2019,13:08,Ewallet\n\
         226-31-3081,C,Naypyitaw,80.2200,3/8/2019,10:29,Cash\n\
         631-41-3108,A,Yangon,340.5255,3/3/2019,13:23,Credit card\n\
         750-67-8428,A,Yangon,489.0480,1/27/2019,20:33,Ewallet\n"
    }

    #[test]
    fn test_parse_csv() {
        let txs = TransactionAdapter::parse_csv(sample_csv(), &CsvColumns::default()).unwrap();

        assert_eq!(txs.len(), 4);
        assert_eq!(txs[0].entity_id, "750-67-8428");
        assert!((txs[1].amount - 80.22).abs() < 1e-9);
        assert_eq!(txs[2].timestamp.to_string(), "2019-03-03 00:00:00");
    }

    #[test]
    fn test_csv_custom_columns() {
        let columns = CsvColumns {
            entity_id: "customer".to_string(),
            timestamp: "when".to_string(),
            amount: "spend".to_string(),
        };
        let text = "customer,when,spend\nc1,2020-02-01,10\n";
        let txs = TransactionAdapter::parse_csv(text, &columns).unwrap();
        assert_eq!(txs[0].entity_id, "c1");
        assert_eq!(txs[0].amount, 10.0);
    }

    #[test]
    fn test_csv_missing_column() {
        let text = "Invoice ID,Date\nA,2019-01-01\n";
        let err = TransactionAdapter::records_from_csv(text, &CsvColumns::default()).unwrap_err();

        assert_eq!(
            err,
            SchemaError::MissingColumn {
                column: "Total".to_string()
            }
        );
    }

    #[test]
    fn test_csv_row_width() {
        let text = "Invoice ID,Date,Total\nA,2019-01-01\n";
        let err = TransactionAdapter::records_from_csv(text, &CsvColumns::default()).unwrap_err();

        assert_eq!(
            err,
            SchemaError::RowWidth {
                row: 1,
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_csv_quoted_fields() {
        let text = "Invoice ID,Product line,Date,Total\r\n\
                    A,\"Food, \"\"fresh\"\"\",1/5/2019,10.0\r\n\
                    B,\"Food\nand beverages\",1/6/2019,20.5\r\n";
        let records = TransactionAdapter::records_from_csv(text, &CsvColumns::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_id, "A");
        assert_eq!(records[1].entity_id, "B");
        assert_eq!(records[1].timestamp, "1/6/2019");
        assert_eq!(records[1].amount.as_f64(), Some(20.5));
    }

    #[test]
    fn test_csv_field_with_line_break() {
        let text = "Invoice ID,Product line,Date,Total\n\
                    A,\"Food\nand beverages\",1/5/2019,10.0\n";
        let txs = TransactionAdapter::parse_csv(text, &CsvColumns::default()).unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].entity_id, "A");
        assert_eq!(txs[0].amount, 10.0);
    }

    #[test]
    fn test_csv_header_only() {
        let columns = CsvColumns::default();
        let records = TransactionAdapter::records_from_csv("Invoice ID,Date,Total\n", &columns);
        assert_eq!(records, Ok(Vec::new()));

        let records = TransactionAdapter::records_from_csv("", &columns);
        assert_eq!(records, Ok(Vec::new()));
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"entity_id": "A", "timestamp": "2019-01-05", "amount": 10.0}

{"entity_id": "B", "timestamp": "2019-01-06 09:00:00", "amount": 20.0}"#;
        let txs = TransactionAdapter::parse_ndjson(ndjson).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[1].entity_id, "B");
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = concat!(
            r#"{"entity_id": "A", "timestamp": "2019-01-05", "amount": 1}"#,
            "\nnot json\n"
        );
        let err = TransactionAdapter::parse_ndjson(ndjson).unwrap_err();

        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array_rejects_negative_amount() {
        let json = r#"[{"entity_id": "A", "timestamp": "2019-01-05", "amount": -3.0}]"#;
        let err = TransactionAdapter::parse_array(json).unwrap_err();

        assert!(matches!(
            err,
            RfmError::Schema(SchemaError::NegativeAmount { row: 1, .. })
        ));
    }

    #[test]
    fn test_validate_records() {
        let records = vec![
            RawTransaction::new("A", "2019-01-05", 1.0),
            RawTransaction::new("", "2019-01-05", 1.0),
            RawTransaction::new("C", "never", 1.0),
        ];
        let results = TransactionAdapter::validate_records(&records);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 1);
        assert_eq!(results[0].entity_id, None);
        assert_eq!(results[1].entity_id.as_deref(), Some("C"));
    }
}
