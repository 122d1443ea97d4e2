//! High-level runner API for the taxi data ingester.
//!
//! This module provides a simplified public interface that encapsulates the
//! setup of the connection pool, the source plan, and the ingestion driver.
//!
//! This is the primary API for external users and for the CLI.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::db::SqlTableWriter;
use crate::db::pool::{self as db_pool, PoolArgsBuilder};
use crate::pipeline::{IngestConfig, ingest};

pub use crate::error::IngestError;
pub use crate::pipeline::{IngestReport, RunState, Service, SourceKind};

/// Arguments for running an ingestion
#[derive(Debug, Clone)]
pub struct IngestArgs {
    // Connection configuration
    pub pg_host: String,
    pub pg_port: u16,
    pub pg_user: String,
    pub pg_pass: String,
    pub pg_db: String,

    // Source configuration
    pub service: Service,
    pub year: u16,
    pub month: u8,
    /// Destination table; the service default when empty
    pub target_table: String,
    pub chunk_size: usize,
    /// Source locator overriding the service default
    pub source_uri: Option<String>,

    // Test-only: inject a pre-created pool (for SQLite testing)
    #[cfg(test)]
    pub test_pool: Option<crate::db::Pool>,
}

/// Result of a completed ingestion
#[derive(Debug)]
pub struct IngestSummary {
    pub run_id: String,
    pub service: Service,
    pub source: String,
    pub table: String,
    pub batches: usize,
    pub rows: u64,
    pub append_calls: usize,
    /// Rows in the destination table after the run
    pub table_rows: i64,
    pub duration: Duration,
    pub p50_batch_ms: Option<u64>,
    pub p99_batch_ms: Option<u64>,
}

impl IngestSummary {
    fn from_report(service: Service, report: IngestReport, table_rows: i64) -> Self {
        let (p50, _, p99) = report.stats.get_percentiles();
        Self {
            run_id: report.run_id.to_string(),
            service,
            source: report.source,
            table: report.table,
            batches: report.stats.batches,
            rows: report.stats.rows,
            append_calls: report.stats.append_calls,
            table_rows,
            duration: report.duration,
            p50_batch_ms: p50,
            p99_batch_ms: p99,
        }
    }
}

/// Run an ingestion with the specified arguments
///
/// The configuration is validated before any connection is opened or any byte
/// is fetched.
///
/// # Example
///
/// ```no_run
/// use taxi_ingest::runner::{IngestArgs, Service, run_ingest};
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = IngestArgs {
///     pg_host: "localhost".to_string(),
///     pg_port: 5432,
///     pg_user: "root".to_string(),
///     pg_pass: "root".to_string(),
///     pg_db: "ny_taxi".to_string(),
///     service: Service::Yellow,
///     year: 2021,
///     month: 1,
///     target_table: String::new(),
///     chunk_size: 100_000,
///     source_uri: None,
/// };
///
/// let summary = run_ingest(args).await?;
/// println!("Loaded {} rows into {}", summary.rows, summary.table);
/// # Ok(())
/// # }
/// ```
pub async fn run_ingest(args: IngestArgs) -> Result<IngestSummary> {
    let config = IngestConfig {
        service: args.service,
        year: args.year,
        month: args.month,
        target_table: Some(args.target_table.clone()),
        chunk_size: args.chunk_size,
        source_uri: args.source_uri.clone(),
    };
    let plan = config.plan().context("Invalid ingestion configuration")?;

    // Create connection pool (or use test pool if provided)
    #[cfg(test)]
    let pool = if let Some(test_pool) = args.test_pool.clone() {
        test_pool
    } else {
        connect(&args).await?
    };

    #[cfg(not(test))]
    let pool = connect(&args).await?;

    let writer = SqlTableWriter::new(pool.clone());
    let report = ingest(writer, &plan)
        .await
        .with_context(|| format!("Failed to ingest {} into {}", plan.source, plan.table))?;

    let table_rows = pool
        .count_rows(&plan.table)
        .await
        .with_context(|| format!("Failed to count rows of {}", plan.table))?;

    Ok(IngestSummary::from_report(args.service, report, table_rows))
}

async fn connect(args: &IngestArgs) -> Result<crate::db::Pool> {
    let pool_args = PoolArgsBuilder::default()
        .host(&args.pg_host)
        .port(args.pg_port)
        .username(&args.pg_user)
        .password(&args.pg_pass)
        .database(&args.pg_db)
        .build()?;
    db_pool::pool(pool_args).await
}
