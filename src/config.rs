//! Configuration constants for the ingestion pipeline
//!
//! This module centralizes the tunable parameters and constants used throughout
//! the crate. Run-level settings live in `pipeline::plan::IngestConfig`.

use std::time::Duration;

// ============================================================================
// Connection Pool Configuration
// ============================================================================

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for individual INSERT / DDL statements
///
/// A single statement carries at most one bind-parameter window of rows, so
/// three minutes leaves room for slow disks and index maintenance.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(180); // 3 minutes

// ============================================================================
// Batch Configuration
// ============================================================================

/// Default number of rows per streamed window
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Bind-parameter ceiling of a single PostgreSQL statement
pub const PG_MAX_BIND_PARAMS: usize = 65_535;

/// Bind-parameter ceiling of a single SQLite statement (SQLITE_MAX_VARIABLE_NUMBER)
pub const SQLITE_MAX_BIND_PARAMS: usize = 32_766;

// ============================================================================
// I/O Configuration
// ============================================================================

/// Buffer placed in front of the decompressor and CSV decoder
///
/// 256KB keeps the number of reads on a remote body low without holding a
/// meaningful share of a window in memory.
pub const READ_BUFFER_SIZE: usize = 256 * 1024; // 256 KB

pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Cell contents that decode to NULL regardless of the column type
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "NULL", "null"];
