//! Error taxonomy for an ingestion run.
//!
//! Every variant is fatal to the run: nothing is recovered locally, the error
//! propagates to the caller which reports it and exits nonzero.

use thiserror::Error;

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Network or file-open failure while fetching the source
    #[error("source unavailable: {locator}: {source}")]
    SourceUnavailable {
        locator: String,
        #[source]
        source: BoxError,
    },

    /// Malformed row or field in the source
    #[error("parse error{}: {message}", location_suffix(.line, .column))]
    Parse {
        line: Option<u64>,
        column: Option<String>,
        message: String,
    },

    /// Append-time column mismatch between a batch and the destination table
    #[error(
        "schema mismatch on table '{table}': table has [{}], batch has [{}]",
        .table_columns.join(", "),
        .batch_columns.join(", ")
    )]
    SchemaMismatch {
        table: String,
        table_columns: Vec<String>,
        batch_columns: Vec<String>,
    },

    /// The source header no longer carries columns the type map requires
    #[error("schema drift: source is missing expected columns [{}]", .missing.join(", "))]
    SchemaDrift { missing: Vec<String> },

    /// Write or connection failure on the destination
    #[error("destination error: {0}")]
    Destination(#[from] sqlx::Error),
}

impl IngestError {
    pub fn source_unavailable(locator: impl Into<String>, source: impl Into<BoxError>) -> Self {
        IngestError::SourceUnavailable {
            locator: locator.into(),
            source: source.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        IngestError::Parse {
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn parse_at(line: Option<u64>, column: &str, message: impl Into<String>) -> Self {
        IngestError::Parse {
            line,
            column: Some(column.to_string()),
            message: message.into(),
        }
    }
}

fn location_suffix(line: &Option<u64>, column: &Option<String>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at line {line}, column '{column}'"),
        (Some(line), None) => format!(" at line {line}"),
        (None, Some(column)) => format!(" in column '{column}'"),
        (None, None) => String::new(),
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        IngestError::Parse {
            line,
            column: None,
            message: err.to_string(),
        }
    }
}

impl From<parquet::errors::ParquetError> for IngestError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        IngestError::parse(format!("invalid parquet data: {err}"))
    }
}

impl From<arrow::error::ArrowError> for IngestError {
    fn from(err: arrow::error::ArrowError) -> Self {
        IngestError::parse(format!("invalid arrow data: {err}"))
    }
}
