//! Delimited (CSV) sources, streamed in windows or read whole

pub mod reader;
mod window;

pub use reader::{FullCsvReader, StreamedCsvReader};
