//! Mapping from Arrow field types to destination column types.

use arrow::datatypes::{DataType, Schema as ArrowSchema};

use crate::db::schema::{Column, Schema, SqlType};
use crate::error::{IngestError, Result};

/// Storage type for an Arrow data type
pub fn arrow_to_sql_type(data_type: &DataType) -> Result<SqlType> {
    let sql_type = match data_type {
        DataType::Boolean => SqlType::Boolean,
        DataType::Int8 | DataType::Int16 | DataType::UInt8 => SqlType::SmallInt,
        DataType::Int32 | DataType::UInt16 => SqlType::Integer,
        DataType::Int64 | DataType::UInt32 => SqlType::BigInt,
        // Wider than BIGINT
        DataType::UInt64 => SqlType::Numeric,
        DataType::Float32 => SqlType::Real,
        DataType::Float64 => SqlType::DoublePrecision,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => SqlType::Numeric,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => SqlType::Text,
        DataType::Binary | DataType::LargeBinary => SqlType::Bytea,
        DataType::Date32 | DataType::Date64 => SqlType::Date,
        DataType::Timestamp(_, None) => SqlType::Timestamp,
        DataType::Timestamp(_, Some(_)) => SqlType::TimestampTz,
        // All-null columns (e.g. `ehail_fee` in the green trip files) carry no type
        DataType::Null => SqlType::Text,
        other => {
            return Err(IngestError::parse(format!(
                "unsupported parquet column type: {other:?}"
            )));
        }
    };
    Ok(sql_type)
}

/// Destination schema from the embedded Arrow schema, nullability included
pub fn arrow_to_schema(arrow_schema: &ArrowSchema) -> Result<Schema> {
    let columns = arrow_schema
        .fields()
        .iter()
        .map(|field| {
            let sql_type = arrow_to_sql_type(field.data_type()).map_err(|e| match e {
                IngestError::Parse { message, .. } => IngestError::Parse {
                    line: None,
                    column: Some(field.name().clone()),
                    message,
                },
                other => other,
            })?;
            Ok(Column::new(field.name(), sql_type, field.is_nullable()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Schema::new(columns))
}
