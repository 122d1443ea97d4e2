//! Parquet file format support.
//!
//! - Schema mapping between Arrow and SQL types
//! - Conversion from Arrow RecordBatches to typed rows
//! - `ParquetFullReader`, a `BatchReader` over a fully fetched file

mod conversion;
mod reader;
mod schema;

pub use reader::ParquetFullReader;
