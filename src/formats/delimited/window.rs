//! Blocking CSV decoding, one window of records at a time.
//!
//! `CsvWindow` owns a `csv::Reader` over a (possibly gzip-compressed) byte
//! stream. It must only be driven from a blocking context: the stream may be
//! an HTTP body bridged back into the async runtime.

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::io::{self, Read};
use std::sync::Arc;

use crate::config::NULL_TOKENS;
use crate::db::schema::{Column, Schema, SchemaInferrer, SqlType, parse_date, parse_timestamp};
use crate::error::{IngestError, Result};
use crate::formats::batch::{RowBatch, Value};
use crate::formats::mapping::TypeMap;
use crate::io::maybe_decompress;

/// How the schema's nullability is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nullability {
    /// Every column nullable: later windows are unseen when the schema is fixed
    Always,
    /// Inferred columns are nullable only if the data holds a null
    FromData,
}

pub(crate) struct CsvWindow {
    locator: String,
    reader: csv::Reader<Box<dyn Read + Send>>,
    header: Vec<String>,
    type_map: Arc<TypeMap>,
    nullability: Nullability,
    schema: Option<Arc<Schema>>,
    exhausted: bool,
}

impl CsvWindow {
    /// Sniff compression, read the header row and check it against the type map
    pub(crate) fn open(
        locator: String,
        stream: Box<dyn Read + Send>,
        type_map: Arc<TypeMap>,
        nullability: Nullability,
    ) -> Result<Self> {
        let stream = maybe_decompress(stream).map_err(|e| io_error(&locator, e))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(stream);

        let mut header: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(&locator, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if let Some(first) = header.first_mut()
            && let Some(stripped) = first.strip_prefix('\u{feff}')
        {
            *first = stripped.to_string();
        }

        if header.is_empty() {
            return Err(IngestError::parse("missing header row"));
        }

        let (missing_dtypes, missing_dates) = type_map.missing_from(&header);
        if !missing_dates.is_empty() {
            return Err(IngestError::SchemaDrift {
                missing: missing_dates.into_iter().map(str::to_string).collect(),
            });
        }
        if !missing_dtypes.is_empty() {
            tracing::warn!(
                source = %locator,
                missing = ?missing_dtypes,
                "mapped columns absent from source header"
            );
        }

        Ok(Self {
            locator,
            reader,
            header,
            type_map,
            nullability,
            schema: None,
            exhausted: false,
        })
    }

    /// Read the next window of at most `limit` records (`None`: the rest of the source)
    ///
    /// The first call always returns a batch and fixes the schema. Later calls
    /// return `None` once the source is exhausted.
    pub(crate) fn read_window(&mut self, limit: Option<usize>) -> Result<Option<RowBatch>> {
        if self.exhausted && self.schema.is_some() {
            return Ok(None);
        }

        let mut records = Vec::with_capacity(limit.unwrap_or(0).min(64 * 1024));
        let mut record = StringRecord::new();
        loop {
            if limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|e| csv_error(&self.locator, e))?;
            if !more {
                self.exhausted = true;
                break;
            }
            records.push(record.clone());
        }

        let schema = match &self.schema {
            Some(schema) => {
                if records.is_empty() {
                    return Ok(None);
                }
                Arc::clone(schema)
            }
            None => {
                let schema = Arc::new(self.establish_schema(&records));
                tracing::debug!(
                    source = %self.locator,
                    columns = schema.len(),
                    "schema established from first window"
                );
                self.schema = Some(Arc::clone(&schema));
                schema
            }
        };

        let rows = records
            .iter()
            .map(|record| coerce_record(record, &schema))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(RowBatch::new(schema, rows)))
    }

    fn establish_schema(&self, records: &[StringRecord]) -> Schema {
        let columns = self
            .header
            .iter()
            .enumerate()
            .map(|(idx, name)| match self.type_map.lookup(name) {
                Some((sql_type, nullable)) => Column::new(
                    name,
                    sql_type,
                    nullable || self.nullability == Nullability::Always,
                ),
                None => {
                    let (sql_type, saw_null) = SchemaInferrer::infer_column_type(
                        records.iter().map(|r| r.get(idx).unwrap_or("")),
                    );
                    // Integers in the first window may turn fractional later
                    let sql_type = match (self.nullability, sql_type) {
                        (
                            Nullability::Always,
                            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt,
                        ) => SqlType::DoublePrecision,
                        (_, sql_type) => sql_type,
                    };
                    let nullable = match self.nullability {
                        Nullability::Always => true,
                        Nullability::FromData => saw_null || records.is_empty(),
                    };
                    Column::new(name, sql_type, nullable)
                }
            })
            .collect();

        Schema::new(columns)
    }
}

fn coerce_record(record: &StringRecord, schema: &Schema) -> Result<Vec<Value>> {
    let line = record.position().map(|p| p.line());
    schema
        .columns
        .iter()
        .zip(record.iter())
        .map(|(column, raw)| {
            let value = coerce_value(raw, column.sql_type)
                .map_err(|message| IngestError::parse_at(line, &column.name, message))?;
            if value.is_null() && !column.nullable {
                return Err(IngestError::parse_at(
                    line,
                    &column.name,
                    "null in non-nullable column",
                ));
            }
            Ok(value)
        })
        .collect()
}

/// Decode one raw cell into the column's storage type
pub(crate) fn coerce_value(raw: &str, sql_type: SqlType) -> std::result::Result<Value, String> {
    let trimmed = raw.trim();
    if NULL_TOKENS.contains(&trimmed) {
        return Ok(Value::Null);
    }

    match sql_type {
        SqlType::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(format!("not a boolean: '{raw}'"))
            }
        }
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => {
            let value = parse_integer(trimmed).ok_or_else(|| format!("not an integer: '{raw}'"))?;
            let fits = match sql_type {
                SqlType::SmallInt => i16::try_from(value).is_ok(),
                SqlType::Integer => i32::try_from(value).is_ok(),
                _ => true,
            };
            if !fits {
                return Err(format!(
                    "integer out of range for {}: {value}",
                    sql_type.to_postgres()
                ));
            }
            Ok(Value::Int(value))
        }
        SqlType::Real | SqlType::DoublePrecision => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("not a number: '{raw}'")),
        SqlType::Numeric => {
            if trimmed.parse::<f64>().is_ok() {
                Ok(Value::Numeric(trimmed.to_string()))
            } else {
                Err(format!("not a decimal: '{raw}'"))
            }
        }
        SqlType::Text => Ok(Value::Text(raw.to_string())),
        SqlType::Date => parse_date(trimmed)
            .or_else(|| parse_timestamp(trimmed).map(|ts| ts.date()))
            .map(Value::Date)
            .ok_or_else(|| format!("not a date: '{raw}'")),
        SqlType::Timestamp => parse_timestamp(trimmed)
            .or_else(|| parse_date(trimmed).and_then(|d| d.and_hms_opt(0, 0, 0)))
            .map(Value::Timestamp)
            .ok_or_else(|| format!("not a timestamp: '{raw}'")),
        SqlType::TimestampTz => DateTime::parse_from_rfc3339(trimmed)
            .map(|ts| ts.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_timestamp(trimmed).map(|ts| ts.and_utc()))
            .map(Value::TimestampTz)
            .ok_or_else(|| format!("not a timestamp: '{raw}'")),
        SqlType::Bytea => Ok(Value::Bytes(raw.as_bytes().to_vec())),
    }
}

/// Integers, including integral floats such as `1.0`
fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(v) = value.parse::<i64>() {
        return Some(v);
    }
    let float = value.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

fn csv_error(locator: &str, err: csv::Error) -> IngestError {
    if !err.is_io_error() {
        return err.into();
    }
    match err.into_kind() {
        csv::ErrorKind::Io(e) => io_error(locator, e),
        kind => IngestError::parse(format!("{kind:?}")),
    }
}

/// Corrupt or truncated data is a parse failure; anything else means the source went away
fn io_error(locator: &str, err: io::Error) -> IngestError {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            IngestError::parse(format!("corrupt source data: {err}"))
        }
        _ => IngestError::source_unavailable(locator, err),
    }
}
