//! HTTP/HTTPS source implementation

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::io::Read;
use tokio_util::io::{StreamReader, SyncIoBridge};
use url::Url;

use super::source::ByteSource;
use crate::config::HTTP_CONNECT_TIMEOUT;
use crate::error::{IngestError, Result};

/// ByteSource implementation for HTTP(S) URLs
pub struct HttpSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: Url) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, url }
    }

    /// Issue the GET request and reject non-success statuses
    async fn get(&self) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| IngestError::source_unavailable(self.locator(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::source_unavailable(
                self.locator(),
                format!("HTTP request failed with status {status}"),
            ));
        }

        tracing::debug!(
            url = %self.url,
            content_length = ?response.content_length(),
            "opened HTTP source"
        );
        Ok(response)
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        let response = self.get().await?;

        // Body chunks arrive on the runtime; the bridge lets the blocking CSV
        // decoder pull them one at a time.
        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();
        let reader = SyncIoBridge::new(StreamReader::new(body));

        Ok(Box::new(reader))
    }

    async fn fetch_all(&self) -> Result<Bytes> {
        let response = self.get().await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IngestError::source_unavailable(self.locator(), e))?;

        tracing::debug!("Fetched {} bytes from: {}", bytes.len(), self.url);
        Ok(bytes)
    }

    fn locator(&self) -> String {
        self.url.to_string()
    }
}
