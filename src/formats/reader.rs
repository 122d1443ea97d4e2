use async_trait::async_trait;

use super::batch::RowBatch;
use crate::error::{IngestError, Result};

/// A lazy, finite, non-restartable sequence of row batches
///
/// `Ok(Some(batch))` yields the next batch, `Ok(None)` marks the end of the
/// stream and `Err` is a failure. Readers always yield at least one batch
/// (possibly empty) before reporting the end, so the destination schema can be
/// established from it. Re-reading a source means opening a new reader.
#[async_trait]
pub trait BatchReader: Send {
    async fn next_batch(&mut self) -> Result<Option<RowBatch>>;

    /// Locator of the underlying source, for logs
    fn locator(&self) -> String;
}

/// Shared state of readers that materialize their whole source in one batch
#[derive(Debug, Default)]
pub(crate) struct OneShot {
    consumed: bool,
}

impl OneShot {
    /// Returns true exactly once
    pub(crate) fn take(&mut self) -> bool {
        !std::mem::replace(&mut self.consumed, true)
    }
}

/// Run decoding work off the async runtime
///
/// A panicked or cancelled decode task is a parse failure of the source it was reading.
pub(crate) async fn blocking<T, F>(locator: &str, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::parse(format!("decoding {locator} failed: {e}")))
}
