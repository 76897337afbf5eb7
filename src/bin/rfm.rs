//! RFM CLI - Command-line interface for the RFM segment engine
//!
//! Commands:
//! - segment: Run the pipeline and write classified rows or a full report
//! - summary: Print per-segment statistics and recommendations
//! - validate: Validate transaction input against the schema
//! - bins: Print or check a bin configuration

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rfm_segment::classifier::NEW_CUSTOMER_MAX_FREQUENCY;
use rfm_segment::explorer::DEFAULT_PAGE_SIZE;
use rfm_segment::pipeline::{RfmEngine, RfmReport, DEFAULT_TOP_SCORES};
use rfm_segment::schema::{CsvColumns, RawTransaction, SchemaError, TransactionAdapter};
use rfm_segment::{
    BinConfig, RfmError, RowQuery, Segment, Transaction, TransactionFilter, RFM_VERSION,
};

/// RFM - Recency, Frequency, Monetary customer segmentation
#[derive(Parser)]
#[command(name = "rfm")]
#[command(version = RFM_VERSION)]
#[command(about = "Segment customers by recency, frequency and monetary value", long_about = None)]
struct Cli {
    /// Enable debug logging (otherwise RUST_LOG applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write classified rows or a full report
    Segment {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Bin configuration file overriding the default bins
        #[arg(long)]
        bins: Option<PathBuf>,

        /// Only include rows in these segments (repeatable)
        #[arg(long = "segment")]
        segments: Vec<String>,

        /// Only include rows whose entity id contains this text
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of rows written
        #[arg(long)]
        limit: Option<usize>,

        /// Combined scores listed individually in the report
        #[arg(long, default_value_t = DEFAULT_TOP_SCORES)]
        top_scores: usize,
    },

    /// Print per-segment statistics and recommendations
    Summary {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Bin configuration file overriding the default bins
        #[arg(long)]
        bins: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate transaction input
    Validate {
        #[command(flatten)]
        input: InputArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default bin configuration, or check a bin file
    Bins {
        /// Bin configuration file to check
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Input format
    #[arg(long, default_value = "csv")]
    input_format: InputFormat,

    /// CSV column holding the entity id
    #[arg(long, default_value = "Invoice ID")]
    entity_column: String,

    /// CSV column holding the transaction date
    #[arg(long, default_value = "Date")]
    date_column: String,

    /// CSV column holding the transaction amount
    #[arg(long, default_value = "Total")]
    amount_column: String,
}

impl InputArgs {
    fn columns(&self) -> CsvColumns {
        CsvColumns {
            entity_id: self.entity_column.clone(),
            timestamp: self.date_column.clone(),
            amount: self.amount_column.clone(),
        }
    }
}

#[derive(Args)]
struct FilterArgs {
    /// Earliest transaction date to include (YYYY-MM-DD)
    #[arg(long)]
    date_min: Option<NaiveDate>,

    /// Latest transaction date to include (YYYY-MM-DD)
    #[arg(long)]
    date_max: Option<NaiveDate>,

    /// Smallest transaction amount to include
    #[arg(long)]
    amount_min: Option<f64>,

    /// Largest transaction amount to include
    #[arg(long)]
    amount_max: Option<f64>,
}

impl FilterArgs {
    fn to_filter(&self) -> Option<TransactionFilter> {
        let filter = TransactionFilter {
            date_min: self.date_min,
            date_max: self.date_max,
            amount_min: self.amount_min,
            amount_max: self.amount_max,
        };
        (!filter.is_empty()).then_some(filter)
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// JSON array of records
    Json,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one classified row per line)
    Ndjson,
    /// JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("command failed: {e:?}");
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn run(cli: Cli) -> Result<(), RfmCliError> {
    match cli.command {
        Commands::Segment {
            input,
            filter,
            output,
            output_format,
            bins,
            segments,
            search,
            limit,
            top_scores,
        } => {
            let query = build_query(&segments, search, limit)?;
            cmd_segment(
                &input,
                &filter,
                &output,
                output_format,
                bins.as_deref(),
                &query,
                top_scores,
            )
        }

        Commands::Summary {
            input,
            filter,
            bins,
            json,
        } => cmd_summary(&input, &filter, bins.as_deref(), json),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Bins { check } => cmd_bins(check.as_deref()),
    }
}

fn cmd_segment(
    input: &InputArgs,
    filter: &FilterArgs,
    output: &Path,
    output_format: OutputFormat,
    bins: Option<&Path>,
    query: &RowQuery,
    top_scores: usize,
) -> Result<(), RfmCliError> {
    let transactions = load_transactions(input)?;
    let engine = load_engine(bins)?.with_top_scores(top_scores);

    let mut report = engine.report(&transactions, filter.to_filter().as_ref())?;
    report.rows = query.apply(&report.rows).into_iter().cloned().collect();
    log::info!("writing {} rows", report.rows.len());

    let output_data = format_output(&report, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_summary(
    input: &InputArgs,
    filter: &FilterArgs,
    bins: Option<&Path>,
    json: bool,
) -> Result<(), RfmCliError> {
    let transactions = load_transactions(input)?;
    let engine = load_engine(bins)?;
    let report = engine
        .run(&transactions, filter.to_filter().as_ref())?
        .summary_report();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("RFM Segment Summary");
    println!("===================");
    println!("Reference date: {}", report.reference_date);
    if let Some(overview) = &report.overview {
        println!("Customers:      {}", overview.total_entities);
        println!("Avg recency:    {:.1} days", overview.mean_recency);
        println!("Avg frequency:  {:.1}", overview.mean_frequency);
        println!("Avg spend:      ${:.2}", overview.mean_monetary);
    }

    for profile in &report.segments {
        let stats = &profile.stats;
        println!("\n{} ({} customers)", profile.segment, stats.count);
        println!("  {}", profile.description);
        println!(
            "  Avg days since purchase: {:.1}, avg purchases: {:.1}, avg spend: ${:.2}",
            stats.mean_recency, stats.mean_frequency, stats.mean_monetary
        );
        for (i, rec) in profile.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, rec);
        }
    }

    if let Some(cohort) = &report.new_customer_cohort {
        println!(
            "\nNo rows were classified as {}; {} customers have at most {} purchases.",
            Segment::NewCustomers,
            cohort.count,
            NEW_CUSTOMER_MAX_FREQUENCY
        );
    }

    Ok(())
}

fn cmd_validate(input: &InputArgs, json: bool) -> Result<(), RfmCliError> {
    let input_data = read_input(&input.input)?;
    let records = read_records(&input_data, input)?;

    let results = TransactionAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                entity_id: r.entity_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (index {}): {}",
                    err.entity_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(RfmCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_bins(check: Option<&Path>) -> Result<(), RfmCliError> {
    match check {
        Some(path) => {
            let config = BinConfig::from_json(&fs::read_to_string(path)?)?;
            println!("Bin configuration is valid");
            println!("{}", config.to_json()?);
        }
        None => println!("{}", BinConfig::default().to_json()?),
    }
    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, RfmCliError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(RfmCliError::StdinIsTerminal);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_records(data: &str, input: &InputArgs) -> Result<Vec<RawTransaction>, RfmCliError> {
    let records = match input.input_format {
        InputFormat::Csv => TransactionAdapter::records_from_csv(data, &input.columns())?,
        InputFormat::Json => TransactionAdapter::records_from_array(data)?,
        InputFormat::Ndjson => TransactionAdapter::records_from_ndjson(data)?,
    };
    Ok(records)
}

fn load_transactions(input: &InputArgs) -> Result<Vec<Transaction>, RfmCliError> {
    let input_data = read_input(&input.input)?;
    let records = read_records(&input_data, input)?;

    if records.is_empty() {
        return Err(RfmCliError::NoTransactions);
    }

    let transactions = TransactionAdapter::to_transactions(&records)?;
    log::debug!("loaded {} transactions", transactions.len());
    Ok(transactions)
}

fn load_engine(bins: Option<&Path>) -> Result<RfmEngine, RfmCliError> {
    match bins {
        Some(path) => {
            let config = BinConfig::from_json(&fs::read_to_string(path)?)?;
            Ok(RfmEngine::with_bins(config))
        }
        None => Ok(RfmEngine::new()),
    }
}

fn build_query(
    segments: &[String],
    search: Option<String>,
    limit: Option<usize>,
) -> Result<RowQuery, RfmCliError> {
    let mut query = RowQuery::new();
    for name in segments {
        let segment = Segment::from_name(name)
            .ok_or_else(|| RfmCliError::ParseError(format!("Unknown segment: {}", name)))?;
        query = query.segment(segment);
    }
    if let Some(term) = search {
        query = query.search(term);
    }
    // Mirror the dashboard's page size when searching without an explicit limit
    query.limit = limit.or_else(|| query.search.as_ref().map(|_| DEFAULT_PAGE_SIZE));
    Ok(query)
}

fn format_output(report: &RfmReport, format: &OutputFormat) -> Result<String, RfmCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for row in &report.rows {
                lines.push(serde_json::to_string(row)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)?),
    }
}

// Error types

#[derive(Debug)]
enum RfmCliError {
    Io(io::Error),
    Rfm(RfmError),
    Json(serde_json::Error),
    Schema(SchemaError),
    NoTransactions,
    StdinIsTerminal,
    ValidationFailed(usize),
    ParseError(String),
}

impl From<io::Error> for RfmCliError {
    fn from(e: io::Error) -> Self {
        RfmCliError::Io(e)
    }
}

impl From<RfmError> for RfmCliError {
    fn from(e: RfmError) -> Self {
        RfmCliError::Rfm(e)
    }
}

impl From<serde_json::Error> for RfmCliError {
    fn from(e: serde_json::Error) -> Self {
        RfmCliError::Json(e)
    }
}

impl From<SchemaError> for RfmCliError {
    fn from(e: SchemaError) -> Self {
        RfmCliError::Schema(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RfmCliError> for CliError {
    fn from(e: RfmCliError) -> Self {
        match e {
            RfmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RfmCliError::Rfm(RfmError::EmptyDataset) => CliError {
                code: "EMPTY_DATASET".to_string(),
                message: RfmError::EmptyDataset.to_string(),
                hint: Some("Widen the date or amount filter".to_string()),
            },
            RfmCliError::Rfm(e @ RfmError::InvalidFilter(_)) => CliError {
                code: "INVALID_FILTER".to_string(),
                message: e.to_string(),
                hint: Some("Filter bounds must lie within the data's own range".to_string()),
            },
            RfmCliError::Rfm(e @ RfmError::InvalidBinConfig(_)) => CliError {
                code: "INVALID_BINS".to_string(),
                message: e.to_string(),
                hint: Some("Run 'rfm bins' for a valid example".to_string()),
            },
            RfmCliError::Rfm(RfmError::Schema(e)) | RfmCliError::Schema(e) => CliError {
                code: "SCHEMA_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'rfm validate' for details".to_string()),
            },
            RfmCliError::Rfm(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check input format".to_string()),
            },
            RfmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RfmCliError::NoTransactions => CliError {
                code: "NO_TRANSACTIONS".to_string(),
                message: "No transactions found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            RfmCliError::StdinIsTerminal => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal, nothing to read".to_string(),
                hint: Some("Pipe a file into rfm or pass --input <path>".to_string()),
            },
            RfmCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            RfmCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check command arguments".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    entity_id: Option<String>,
    error: String,
}
