//! Parquet file reader implementation.

use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::sync::Arc;

use crate::error::Result;
use crate::formats::batch::RowBatch;
use crate::formats::reader::{BatchReader, OneShot, blocking};
use crate::io::ByteSource;

use super::conversion::record_batch_to_rows;
use super::schema::arrow_to_schema;

/// Reads a whole Parquet file into a single batch
///
/// Parquet is self-describing: column types and nullability come from the
/// embedded Arrow schema, no type map is consulted.
pub struct ParquetFullReader {
    source: Box<dyn ByteSource>,
    once: OneShot,
}

impl ParquetFullReader {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self {
            source,
            once: OneShot::default(),
        }
    }
}

/// Decode every row group of an in-memory Parquet file
pub fn decode_parquet(data: Bytes) -> Result<RowBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;

    let metadata = builder.metadata();
    let total_rows: i64 = metadata.row_groups().iter().map(|rg| rg.num_rows()).sum();
    tracing::debug!(
        row_groups = metadata.num_row_groups(),
        total_rows,
        "read parquet footer"
    );

    let schema = Arc::new(arrow_to_schema(builder.schema())?);
    let reader = builder.build()?;

    let mut rows = Vec::with_capacity(usize::try_from(total_rows).unwrap_or(0));
    for batch in reader {
        rows.extend(record_batch_to_rows(&batch?)?);
    }

    Ok(RowBatch::new(schema, rows))
}

#[async_trait]
impl BatchReader for ParquetFullReader {
    async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if !self.once.take() {
            return Ok(None);
        }

        let locator = self.source.locator();
        let data = self.source.fetch_all().await?;
        let batch = blocking(&locator, move || decode_parquet(data)).await??;

        tracing::debug!(source = %locator, rows = batch.num_rows(), "read parquet source");
        Ok(Some(batch))
    }

    fn locator(&self) -> String {
        self.source.locator()
    }
}
