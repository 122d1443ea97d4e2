use async_trait::async_trait;
use bytes::Bytes;
use std::io::Read;

use super::http_reader::HttpSource;
use super::local_reader::LocalSource;
use super::uri::SourceUri;
use crate::error::Result;

/// Abstraction for fetching a source's bytes
///
/// Local files and HTTP(S) URLs share one interface so that readers can either
/// stream a body through bounded memory or materialize it whole.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Open the source as a blocking byte stream
    ///
    /// The returned reader must only be read from a blocking context
    /// (`tokio::task::spawn_blocking`); it may bridge back into the runtime.
    async fn open_stream(&self) -> Result<Box<dyn Read + Send>>;

    /// Fetch the whole source into memory
    async fn fetch_all(&self) -> Result<Bytes>;

    /// Locator used in logs and errors
    fn locator(&self) -> String;
}

/// Create the ByteSource matching a parsed locator
pub fn byte_source(uri: &SourceUri) -> Box<dyn ByteSource> {
    match uri {
        SourceUri::Local(path) => Box::new(LocalSource::new(path)),
        SourceUri::Http(url) => Box::new(HttpSource::new(url.clone())),
    }
}
