//! Conversion from Arrow RecordBatch to typed rows.
//!
//! Arrow arrays are decoded column by column into `Value`s and then transposed
//! into records aligned with the destination schema.

use arrow::array::*;
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Decimal128Type, Decimal256Type, Float32Type, Float64Type,
    Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{IngestError, Result};
use crate::formats::batch::Value;

/// Convert an Arrow RecordBatch into rows of typed values
pub fn record_batch_to_rows(batch: &RecordBatch) -> Result<Vec<Vec<Value>>> {
    let num_rows = batch.num_rows();
    if num_rows == 0 {
        return Ok(Vec::new());
    }

    let schema = batch.schema();
    let mut columns: Vec<std::vec::IntoIter<Value>> = Vec::with_capacity(batch.num_columns());
    for (col_idx, field) in schema.fields().iter().enumerate() {
        let values = array_to_values(batch.column(col_idx).as_ref()).map_err(|message| {
            IngestError::Parse {
                line: None,
                column: Some(field.name().clone()),
                message,
            }
        })?;
        columns.push(values.into_iter());
    }

    // Transpose to rows
    let mut rows = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let row = columns
            .iter_mut()
            .map(|col| col.next().unwrap_or(Value::Null))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Decode one Arrow array; nulls become `Value::Null`
fn array_to_values(array: &dyn Array) -> std::result::Result<Vec<Value>, String> {
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => {
            let arr = as_boolean_array(array);
            collect(arr.len(), |i| arr.is_null(i), |i| Ok(Value::Bool(arr.value(i))))?
        }
        DataType::Int8 => convert_int::<Int8Type>(array)?,
        DataType::Int16 => convert_int::<Int16Type>(array)?,
        DataType::Int32 => convert_int::<Int32Type>(array)?,
        DataType::Int64 => convert_int::<Int64Type>(array)?,
        DataType::UInt8 => convert_int::<UInt8Type>(array)?,
        DataType::UInt16 => convert_int::<UInt16Type>(array)?,
        DataType::UInt32 => convert_int::<UInt32Type>(array)?,
        DataType::UInt64 => {
            let arr = as_primitive_array::<UInt64Type>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Numeric(arr.value(i).to_string()))
            })?
        }
        DataType::Float32 => {
            let arr = as_primitive_array::<Float32Type>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Float(f64::from(arr.value(i))))
            })?
        }
        DataType::Float64 => {
            let arr = as_primitive_array::<Float64Type>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| Ok(Value::Float(arr.value(i))))?
        }
        DataType::Utf8 => {
            let arr = as_string_array(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Text(arr.value(i).to_string()))
            })?
        }
        DataType::LargeUtf8 => {
            let arr = as_largestring_array(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Text(arr.value(i).to_string()))
            })?
        }
        DataType::Utf8View => {
            let arr = array.as_string_view();
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Text(arr.value(i).to_string()))
            })?
        }
        DataType::Binary => {
            let arr = as_generic_binary_array::<i32>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Bytes(arr.value(i).to_vec()))
            })?
        }
        DataType::LargeBinary => {
            let arr = as_generic_binary_array::<i64>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Bytes(arr.value(i).to_vec()))
            })?
        }
        DataType::Date32 => {
            let arr = as_primitive_array::<Date32Type>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                let days = arr.value(i);
                // Days since epoch
                NaiveDate::from_ymd_opt(1970, 1, 1)
                    .and_then(|epoch| {
                        epoch.checked_add_signed(chrono::Duration::days(i64::from(days)))
                    })
                    .map(Value::Date)
                    .ok_or_else(|| format!("invalid date: {days}"))
            })?
        }
        DataType::Date64 => {
            let arr = as_primitive_array::<Date64Type>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                let millis = arr.value(i);
                DateTime::from_timestamp_millis(millis)
                    .map(|dt| Value::Date(dt.date_naive()))
                    .ok_or_else(|| format!("invalid date: {millis}"))
            })?
        }
        DataType::Timestamp(unit, tz) => convert_timestamp(array, unit, tz.is_some())?,
        DataType::Decimal128(_, scale) => {
            let arr = as_primitive_array::<Decimal128Type>(array);
            let scale = *scale;
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Numeric(format_decimal128(arr.value(i), scale)))
            })?
        }
        DataType::Decimal256(_, _) => {
            let arr = as_primitive_array::<Decimal256Type>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                Ok(Value::Numeric(arr.value_as_string(i)))
            })?
        }
        other => return Err(format!("unsupported array type for conversion: {other:?}")),
    };

    Ok(values)
}

fn collect(
    len: usize,
    is_null: impl Fn(usize) -> bool,
    value: impl Fn(usize) -> std::result::Result<Value, String>,
) -> std::result::Result<Vec<Value>, String> {
    (0..len)
        .map(|i| if is_null(i) { Ok(Value::Null) } else { value(i) })
        .collect()
}

/// Helper to convert integer arrays that fit in i64
fn convert_int<T: ArrowPrimitiveType>(array: &dyn Array) -> std::result::Result<Vec<Value>, String>
where
    T::Native: Into<i64>,
{
    let arr = as_primitive_array::<T>(array);
    collect(arr.len(), |i| arr.is_null(i), |i| Ok(Value::Int(arr.value(i).into())))
}

/// Convert timestamp arrays; zoned timestamps are normalized to UTC
fn convert_timestamp(
    array: &dyn Array,
    unit: &TimeUnit,
    zoned: bool,
) -> std::result::Result<Vec<Value>, String> {
    let to_value = |dt: Option<DateTime<Utc>>, raw: i64| -> std::result::Result<Value, String> {
        let dt = dt.ok_or_else(|| format!("invalid timestamp: {raw}"))?;
        Ok(if zoned {
            Value::TimestampTz(dt)
        } else {
            Value::Timestamp(dt.naive_utc())
        })
    };

    match unit {
        TimeUnit::Second => {
            let arr = as_primitive_array::<TimestampSecondType>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                let seconds = arr.value(i);
                to_value(DateTime::from_timestamp(seconds, 0), seconds)
            })
        }
        TimeUnit::Millisecond => {
            let arr = as_primitive_array::<TimestampMillisecondType>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                let millis = arr.value(i);
                to_value(DateTime::from_timestamp_millis(millis), millis)
            })
        }
        TimeUnit::Microsecond => {
            let arr = as_primitive_array::<TimestampMicrosecondType>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                let micros = arr.value(i);
                to_value(DateTime::from_timestamp_micros(micros), micros)
            })
        }
        TimeUnit::Nanosecond => {
            let arr = as_primitive_array::<TimestampNanosecondType>(array);
            collect(arr.len(), |i| arr.is_null(i), |i| {
                let nanos = arr.value(i);
                to_value(Some(DateTime::from_timestamp_nanos(nanos)), nanos)
            })
        }
    }
}

/// Format a Decimal128 value with the given scale
fn format_decimal128(value: i128, scale: i8) -> String {
    if scale <= 0 {
        let zeros = "0".repeat(scale.unsigned_abs() as usize);
        return if value == 0 {
            "0".to_string()
        } else {
            format!("{value}{zeros}")
        };
    }

    let scale = scale as u32;
    let divisor = 10_i128.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let int_part = (value / divisor).unsigned_abs();
    let frac_part = (value % divisor).unsigned_abs();

    // Format with proper padding
    format!(
        "{sign}{int_part}.{frac_part:0width$}",
        width = scale as usize
    )
}
