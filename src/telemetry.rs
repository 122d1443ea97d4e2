use crate::formats::reader::BatchReader;

/// Events emitted by the ingestion driver after each committed batch
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// First batch committed with the table recreated
    TableReplaced { rows: u64, duration_ms: u64 },
    /// Later batch appended to the table
    BatchAppended { rows: u64, duration_ms: u64 },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    pub batches: usize,
    pub rows: u64,
    pub replace_calls: usize,
    pub append_calls: usize,
    pub batch_durations_ms: Vec<u64>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        let (rows, duration_ms) = match event {
            TelemetryEvent::TableReplaced { rows, duration_ms } => {
                self.replace_calls += 1;
                (rows, duration_ms)
            }
            TelemetryEvent::BatchAppended { rows, duration_ms } => {
                self.append_calls += 1;
                (rows, duration_ms)
            }
        };
        self.batches += 1;
        self.rows += rows;
        self.batch_durations_ms.push(*duration_ms);
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batch_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.batch_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}

/// Log a one-line summary of a finished run
pub fn log_summary(reader: &dyn BatchReader, table: &str, stats: &IngestStats) {
    let (p50, p90, p99) = stats.get_percentiles();
    tracing::info!(
        source = %reader.locator(),
        table,
        batches = stats.batches,
        rows = stats.rows,
        appends = stats.append_calls,
        p50_ms = ?p50,
        p90_ms = ?p90,
        p99_ms = ?p99,
        "ingestion finished"
    );
}
