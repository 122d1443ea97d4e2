//! Run planning and the batch-moving driver

pub mod driver;
pub mod plan;

pub use driver::{IngestReport, RunState, ingest};
pub use plan::{IngestConfig, Service, SourceKind};
