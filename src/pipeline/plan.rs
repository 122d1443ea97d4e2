//! Resolution of a run configuration into a concrete source plan.

use std::fmt;

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::formats::mapping::TypeMap;

const YELLOW_BASE_URL: &str = "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow";
const GREEN_BASE_URL: &str = "https://d37ci6vzurychx.cloudfront.net/trip-data";
const ZONES_URL: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/misc/taxi_zone_lookup.csv";

/// Dataset to ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Yellow,
    Green,
    Zones,
}

impl Service {
    /// Parse service from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self, PlanError> {
        match s.trim().to_lowercase().as_str() {
            "yellow" => Ok(Service::Yellow),
            "green" => Ok(Service::Green),
            "zones" | "zone" | "taxi_zone_lookup" => Ok(Service::Zones),
            _ => Err(PlanError::UnknownService(s.to_string())),
        }
    }

    /// How the service's source is read
    pub fn source_kind(self) -> SourceKind {
        match self {
            Service::Yellow => SourceKind::StreamedCsv,
            Service::Green => SourceKind::FullParquet,
            Service::Zones => SourceKind::FullCsv,
        }
    }

    /// Field type mapping applied to delimited sources
    pub fn type_map(self) -> TypeMap {
        match self {
            Service::Yellow => TypeMap::yellow(),
            Service::Zones => TypeMap::zones(),
            // Self-describing
            Service::Green => TypeMap::empty(),
        }
    }

    pub fn default_source(self, year: u16, month: u8) -> String {
        match self {
            Service::Yellow => {
                format!("{YELLOW_BASE_URL}/yellow_tripdata_{year:04}-{month:02}.csv.gz")
            }
            Service::Green => {
                format!("{GREEN_BASE_URL}/green_tripdata_{year:04}-{month:02}.parquet")
            }
            Service::Zones => ZONES_URL.to_string(),
        }
    }

    pub fn default_table(self, year: u16, month: u8) -> String {
        match self {
            Service::Yellow => format!("yellow_tripdata_{year:04}_{month:02}"),
            Service::Green => format!("green_tripdata_{year:04}_{month:02}"),
            Service::Zones => "taxi_zone_lookup".to_string(),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Yellow => "yellow",
            Service::Green => "green",
            Service::Zones => "zones",
        };
        f.write_str(name)
    }
}

/// Reader and writer strategy of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Bounded windows: one replace, then one append per later window
    StreamedCsv,
    /// Whole file in one batch, schema from the type map and the data
    FullCsv,
    /// Whole file in one batch, schema embedded in the file
    FullParquet,
}

/// Configuration of one ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub service: Service,
    pub year: u16,
    pub month: u8,
    /// Destination table; the service default when `None` or empty
    pub target_table: Option<String>,
    /// Records per streamed window
    pub chunk_size: usize,
    /// Source locator; the service default when `None`
    pub source_uri: Option<String>,
}

impl IngestConfig {
    pub fn new(service: Service, year: u16, month: u8) -> Self {
        Self {
            service,
            year,
            month,
            target_table: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            source_uri: None,
        }
    }

    /// Validate and resolve into a plan; performs no I/O
    pub fn plan(&self) -> Result<SourcePlan, PlanError> {
        if !(1..=12).contains(&self.month) {
            return Err(PlanError::InvalidMonth(self.month));
        }
        if self.chunk_size == 0 {
            return Err(PlanError::InvalidChunkSize);
        }

        let table = self
            .target_table
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.service.default_table(self.year, self.month));

        let source = self
            .source_uri
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.service.default_source(self.year, self.month));

        Ok(SourcePlan {
            service: self.service,
            kind: self.service.source_kind(),
            source,
            table,
            type_map: self.service.type_map(),
            chunk_size: self.chunk_size,
        })
    }
}

/// A resolved run: where to read, how, and where to write
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub service: Service,
    pub kind: SourceKind,
    pub source: String,
    pub table: String,
    pub type_map: TypeMap,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("unknown service '{0}': expected yellow, green or zones")]
    UnknownService(String),
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u8),
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}
