use async_trait::async_trait;
use bytes::Bytes;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::source::ByteSource;
use crate::error::{IngestError, Result};

/// ByteSource implementation for local files
#[derive(Debug, Clone)]
pub struct LocalSource {
    file_path: PathBuf,
}

impl LocalSource {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ByteSource for LocalSource {
    async fn open_stream(&self) -> Result<Box<dyn Read + Send>> {
        let file = tokio::fs::File::open(&self.file_path)
            .await
            .map_err(|e| IngestError::source_unavailable(self.locator(), e))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn fetch_all(&self) -> Result<Bytes> {
        let data = tokio::fs::read(&self.file_path)
            .await
            .map_err(|e| IngestError::source_unavailable(self.locator(), e))?;
        tracing::debug!("Read {} bytes from: {}", data.len(), self.file_path.display());
        Ok(Bytes::from(data))
    }

    fn locator(&self) -> String {
        self.file_path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_fetch_all_reads_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "LocationID,Borough\n1,EWR\n").unwrap();
        temp_file.flush().unwrap();

        let source = LocalSource::new(temp_file.path());
        let bytes = source.fetch_all().await.unwrap();
        assert_eq!(&bytes[..], b"LocationID,Borough\n1,EWR\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let source = LocalSource::new("/nonexistent/dir/taxi_zone_lookup.csv");
        assert!(matches!(
            source.fetch_all().await,
            Err(IngestError::SourceUnavailable { .. })
        ));
        assert!(matches!(
            source.open_stream().await,
            Err(IngestError::SourceUnavailable { .. })
        ));
    }
}
