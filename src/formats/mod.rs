//! File format parsers and readers

pub mod batch;
pub mod delimited;
pub mod mapping;
pub mod parquet;
pub mod reader;
