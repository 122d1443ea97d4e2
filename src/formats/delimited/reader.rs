use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Arc;

use super::window::{CsvWindow, Nullability};
use crate::error::{IngestError, Result};
use crate::formats::batch::RowBatch;
use crate::formats::mapping::TypeMap;
use crate::formats::reader::{BatchReader, OneShot, blocking};
use crate::io::ByteSource;

/// Streams a delimited source in windows of at most `chunk_size` records
///
/// Memory use is bounded by one window: the body is decoded as it arrives and
/// nothing past the current window is buffered beyond the read buffers.
pub struct StreamedCsvReader {
    source: Box<dyn ByteSource>,
    type_map: Arc<TypeMap>,
    chunk_size: usize,
    window: Option<CsvWindow>,
    finished: bool,
}

impl StreamedCsvReader {
    pub fn new(source: Box<dyn ByteSource>, type_map: TypeMap, chunk_size: usize) -> Self {
        Self {
            source,
            type_map: Arc::new(type_map),
            chunk_size: chunk_size.max(1),
            window: None,
            finished: false,
        }
    }

    /// Open the source and read its header
    ///
    /// Must not borrow `self` across an await: `CsvWindow` is not `Sync`.
    async fn open(
        source: &dyn ByteSource,
        type_map: &Arc<TypeMap>,
        chunk_size: usize,
    ) -> Result<CsvWindow> {
        let locator = source.locator();
        let stream = source.open_stream().await?;
        let type_map = Arc::clone(type_map);

        tracing::debug!(source = %locator, chunk_size, "opening streamed source");

        let open_locator = locator.clone();
        blocking(&locator, move || {
            CsvWindow::open(open_locator, stream, type_map, Nullability::Always)
        })
        .await?
    }
}

#[async_trait]
impl BatchReader for StreamedCsvReader {
    async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.finished {
            return Ok(None);
        }

        let mut window = match self.window.take() {
            Some(window) => window,
            None => Self::open(self.source.as_ref(), &self.type_map, self.chunk_size).await?,
        };

        // The window moves into the blocking task and comes back with the batch
        let limit = self.chunk_size;
        let (window, batch) = blocking(&self.source.locator(), move || {
            let batch = window.read_window(Some(limit));
            (window, batch)
        })
        .await?;

        match batch {
            Ok(Some(batch)) => {
                self.window = Some(window);
                Ok(Some(batch))
            }
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    fn locator(&self) -> String {
        self.source.locator()
    }
}

/// Reads a whole delimited source into a single batch
///
/// Nullability of inferred columns is taken from the complete dataset.
pub struct FullCsvReader {
    source: Box<dyn ByteSource>,
    type_map: Arc<TypeMap>,
    once: OneShot,
}

impl FullCsvReader {
    pub fn new(source: Box<dyn ByteSource>, type_map: TypeMap) -> Self {
        Self {
            source,
            type_map: Arc::new(type_map),
            once: OneShot::default(),
        }
    }
}

#[async_trait]
impl BatchReader for FullCsvReader {
    async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if !self.once.take() {
            return Ok(None);
        }

        let locator = self.source.locator();
        let bytes = self.source.fetch_all().await?;
        let type_map = Arc::clone(&self.type_map);

        let read_locator = locator.clone();
        let batch = blocking(&locator, move || {
            let mut window = CsvWindow::open(
                read_locator,
                Box::new(Cursor::new(bytes)),
                type_map,
                Nullability::FromData,
            )?;
            window.read_window(None)
        })
        .await??;

        let batch = batch.ok_or_else(|| IngestError::parse("source produced no batch"))?;
        tracing::debug!(source = %locator, rows = batch.num_rows(), "read full delimited source");
        Ok(Some(batch))
    }

    fn locator(&self) -> String {
        self.source.locator()
    }
}
