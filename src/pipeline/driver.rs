//! Ingestion driver: moves batches from a reader to a table writer.
//!
//! A run walks `Start -> SchemaEstablished -> Appending -> Done`; any reader or
//! writer failure moves it to `Failed` and stops reading. The first batch
//! replaces the destination table, every later batch is appended to it.

use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use super::plan::{SourceKind, SourcePlan};
use crate::db::TableWriter;
use crate::error::{IngestError, Result};
use crate::formats::delimited::{FullCsvReader, StreamedCsvReader};
use crate::formats::parquet::ParquetFullReader;
use crate::formats::reader::BatchReader;
use crate::io::{SourceUri, byte_source};
use crate::telemetry::{IngestStats, TelemetryEvent, log_summary};

/// State of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    SchemaEstablished,
    Appending,
    Done,
    Failed,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub table: String,
    pub source: String,
    pub stats: IngestStats,
    pub duration: Duration,
}

/// Open the reader matching a plan's source kind
///
/// Readers are lazy: nothing is fetched until the first batch is requested.
pub fn open_reader(plan: &SourcePlan) -> Result<Box<dyn BatchReader>> {
    let uri = SourceUri::parse(&plan.source)?;
    let source = byte_source(&uri);

    let reader: Box<dyn BatchReader> = match plan.kind {
        SourceKind::StreamedCsv => Box::new(StreamedCsvReader::new(
            source,
            plan.type_map.clone(),
            plan.chunk_size,
        )),
        SourceKind::FullCsv => Box::new(FullCsvReader::new(source, plan.type_map.clone())),
        SourceKind::FullParquet => Box::new(ParquetFullReader::new(source)),
    };
    Ok(reader)
}

/// Drives one table's replace-then-append sequence
pub struct Ingestion<W: TableWriter> {
    writer: W,
    table: String,
    run_id: Uuid,
    state: RunState,
    stats: IngestStats,
}

impl<W: TableWriter> Ingestion<W> {
    pub fn new(writer: W, table: impl Into<String>) -> Self {
        Self {
            writer,
            table: table.into(),
            run_id: Uuid::new_v4(),
            state: RunState::Start,
            stats: IngestStats::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Drain `reader` into the destination table
    pub async fn run(&mut self, reader: &mut dyn BatchReader) -> Result<IngestReport> {
        let span = tracing::info_span!("ingest", run_id = %self.run_id, table = %self.table);
        self.run_inner(reader).instrument(span).await
    }

    async fn run_inner(&mut self, reader: &mut dyn BatchReader) -> Result<IngestReport> {
        let started = Instant::now();
        self.state = RunState::Start;
        self.stats = IngestStats::new();

        tracing::info!(source = %reader.locator(), "starting ingestion");

        loop {
            let batch = match reader.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => return Err(self.fail(e)),
            };

            let batch_started = Instant::now();
            let rows = batch.num_rows() as u64;

            let result = match self.state {
                RunState::Start => {
                    self.writer
                        .replace(&self.table, batch.schema(), &batch)
                        .await
                }
                _ => self.writer.append(&self.table, &batch).await,
            };
            if let Err(e) = result {
                return Err(self.fail(e));
            }

            let duration_ms = batch_started.elapsed().as_millis() as u64;
            let event = if self.state == RunState::Start {
                self.state = RunState::SchemaEstablished;
                TelemetryEvent::TableReplaced { rows, duration_ms }
            } else {
                self.state = RunState::Appending;
                tracing::debug!(batch = self.stats.batches + 1, rows, duration_ms, "batch appended");
                TelemetryEvent::BatchAppended { rows, duration_ms }
            };
            self.stats.update(&event);
        }

        if self.state == RunState::Start {
            return Err(self.fail(IngestError::parse("source produced no batches")));
        }

        self.state = RunState::Done;
        log_summary(reader, &self.table, &self.stats);

        Ok(IngestReport {
            run_id: self.run_id,
            table: self.table.clone(),
            source: reader.locator(),
            stats: self.stats.clone(),
            duration: started.elapsed(),
        })
    }

    fn fail(&mut self, err: IngestError) -> IngestError {
        tracing::error!(state = ?self.state, error = %err, "ingestion failed");
        self.state = RunState::Failed;
        err
    }
}

/// Ingest the source of `plan` into its destination table
pub async fn ingest<W: TableWriter>(writer: W, plan: &SourcePlan) -> Result<IngestReport> {
    let mut reader = open_reader(plan)?;
    Ingestion::new(writer, &plan.table)
        .run(reader.as_mut())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{Column, Schema, SqlType};
    use crate::formats::batch::{RowBatch, Value};
    use crate::formats::mapping::TypeMap;
    use crate::io::local_reader::LocalSource;
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::NamedTempFile;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Replace(usize),
        Append(usize),
    }

    /// Records writer calls; optionally fails the n-th append
    #[derive(Default)]
    struct MockWriter {
        calls: Mutex<Vec<Call>>,
        fail_append: Option<usize>,
    }

    impl MockWriter {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TableWriter for MockWriter {
        async fn replace(&self, _table: &str, _schema: &Schema, batch: &RowBatch) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Replace(batch.num_rows()));
            Ok(())
        }

        async fn append(&self, table: &str, batch: &RowBatch) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            let appends = calls.iter().filter(|c| matches!(c, Call::Append(_))).count();
            if self.fail_append == Some(appends) {
                return Err(IngestError::SchemaMismatch {
                    table: table.to_string(),
                    table_columns: vec!["id".to_string()],
                    batch_columns: batch.column_names(),
                });
            }
            calls.push(Call::Append(batch.num_rows()));
            Ok(())
        }
    }

    /// Yields a fixed sequence of results
    struct ScriptedReader {
        results: VecDeque<Result<Option<RowBatch>>>,
    }

    #[async_trait]
    impl BatchReader for ScriptedReader {
        async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
            self.results.pop_front().unwrap_or(Ok(None))
        }

        fn locator(&self) -> String {
            "scripted".to_string()
        }
    }

    fn id_batch(schema: &Arc<Schema>, rows: usize) -> RowBatch {
        let rows = (0..rows).map(|i| vec![Value::Int(i as i64)]).collect();
        RowBatch::new(Arc::clone(schema), rows)
    }

    fn id_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![Column::new("id", SqlType::BigInt, true)]))
    }

    #[tokio::test]
    async fn test_streamed_source_one_replace_then_appends() {
        // 250k rows in windows of 100k: 100k, 100k, 50k
        let temp_file = NamedTempFile::new().unwrap();
        {
            let mut encoder = GzEncoder::new(temp_file.reopen().unwrap(), Compression::fast());
            writeln!(encoder, "id,fare_amount").unwrap();
            for i in 0..250_000 {
                writeln!(encoder, "{i},{}.5", i % 90).unwrap();
            }
            encoder.finish().unwrap();
        }

        let mut reader = StreamedCsvReader::new(
            Box::new(LocalSource::new(temp_file.path())),
            TypeMap::empty(),
            100_000,
        );
        let mut ingestion = Ingestion::new(MockWriter::default(), "trips");
        let report = ingestion.run(&mut reader).await.unwrap();

        assert_eq!(
            ingestion.writer().calls(),
            vec![
                Call::Replace(100_000),
                Call::Append(100_000),
                Call::Append(50_000)
            ]
        );
        assert_eq!(ingestion.state(), RunState::Done);
        assert_eq!(report.stats.batches, 3);
        assert_eq!(report.stats.rows, 250_000);
        assert_eq!(report.stats.replace_calls, 1);
        assert_eq!(report.stats.append_calls, 2);
        assert_eq!(report.stats.batch_durations_ms.len(), 3);
        assert_eq!(report.table, "trips");
    }

    #[tokio::test]
    async fn test_zero_rows_still_replaces() {
        let schema = id_schema();
        let mut reader = ScriptedReader {
            results: VecDeque::from(vec![Ok(Some(RowBatch::empty(Arc::clone(&schema))))]),
        };
        let mut ingestion = Ingestion::new(MockWriter::default(), "empty");
        let report = ingestion.run(&mut reader).await.unwrap();

        assert_eq!(ingestion.writer().calls(), vec![Call::Replace(0)]);
        assert_eq!(report.stats.rows, 0);
        assert_eq!(ingestion.state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_from_start() {
        let mut reader =
            ParquetFullReader::new(Box::new(LocalSource::new("/nonexistent/green.parquet")));
        let mut ingestion = Ingestion::new(MockWriter::default(), "green");

        assert_eq!(ingestion.state(), RunState::Start);
        let err = ingestion.run(&mut reader).await.unwrap_err();
        assert!(matches!(err, IngestError::SourceUnavailable { .. }));
        assert_eq!(ingestion.state(), RunState::Failed);
        assert!(ingestion.writer().calls().is_empty());
    }

    #[tokio::test]
    async fn test_reader_error_mid_stream_stops_reading() {
        let schema = id_schema();
        let mut reader = ScriptedReader {
            results: VecDeque::from(vec![
                Ok(Some(id_batch(&schema, 3))),
                Err(IngestError::parse_at(Some(5), "id", "not an integer: 'x'")),
                Ok(Some(id_batch(&schema, 3))),
            ]),
        };
        let mut ingestion = Ingestion::new(MockWriter::default(), "trips");

        assert!(matches!(
            ingestion.run(&mut reader).await,
            Err(IngestError::Parse { .. })
        ));
        assert_eq!(ingestion.state(), RunState::Failed);
        assert_eq!(ingestion.writer().calls(), vec![Call::Replace(3)]);
        // The batch after the failure was never pulled
        assert_eq!(reader.results.len(), 1);
    }

    #[tokio::test]
    async fn test_append_failure_fails_run() {
        let schema = id_schema();
        let mut reader = ScriptedReader {
            results: VecDeque::from(vec![
                Ok(Some(id_batch(&schema, 2))),
                Ok(Some(id_batch(&schema, 2))),
                Ok(Some(id_batch(&schema, 2))),
            ]),
        };
        let writer = MockWriter {
            fail_append: Some(1),
            ..Default::default()
        };
        let mut ingestion = Ingestion::new(writer, "trips");

        assert!(matches!(
            ingestion.run(&mut reader).await,
            Err(IngestError::SchemaMismatch { .. })
        ));
        assert_eq!(ingestion.state(), RunState::Failed);
        assert_eq!(
            ingestion.writer().calls(),
            vec![Call::Replace(2), Call::Append(2)]
        );
        assert_eq!(ingestion.stats().batches, 2);
    }

    #[tokio::test]
    async fn test_reader_yielding_nothing_is_parse_error() {
        let mut reader = ScriptedReader {
            results: VecDeque::new(),
        };
        let mut ingestion = Ingestion::new(MockWriter::default(), "trips");
        assert!(matches!(
            ingestion.run(&mut reader).await,
            Err(IngestError::Parse { .. })
        ));
        assert_eq!(ingestion.state(), RunState::Failed);
        assert!(ingestion.writer().calls().is_empty());
    }

    #[test]
    fn test_open_reader_rejects_unsupported_scheme() {
        let mut plan = crate::pipeline::plan::IngestConfig::new(
            crate::pipeline::plan::Service::Zones,
            2025,
            1,
        )
        .plan()
        .unwrap();
        plan.source = "s3://bucket/zones.csv".to_string();
        assert!(matches!(
            open_reader(&plan),
            Err(IngestError::SourceUnavailable { .. })
        ));
    }
}
