//! I/O abstraction layer for reading bytes from different sources

pub mod compression;
pub mod http_reader;
pub mod local_reader;
pub mod source;
pub mod uri;

pub use compression::maybe_decompress;
pub use source::{ByteSource, byte_source};
pub use uri::SourceUri;
