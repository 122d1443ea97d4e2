use chrono::{NaiveDate, NaiveDateTime};

/// SQL data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Bytea,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Text => "TEXT",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            SqlType::Bytea => "BYTEA",
        }
    }

    /// Find the most specific common type that accommodates both types
    pub fn common_type(&self, other: &SqlType) -> SqlType {
        if self == other {
            return *self;
        }

        use SqlType::*;
        match (self, other) {
            (SmallInt, Integer) | (Integer, SmallInt) => Integer,
            (SmallInt | Integer, BigInt) | (BigInt, SmallInt | Integer) => BigInt,

            (SmallInt | Integer | BigInt, Numeric) | (Numeric, SmallInt | Integer | BigInt) => {
                Numeric
            }

            (Real, DoublePrecision) | (DoublePrecision, Real) => DoublePrecision,
            (SmallInt | Integer | BigInt | Numeric, Real | DoublePrecision)
            | (Real | DoublePrecision, SmallInt | Integer | BigInt | Numeric) => DoublePrecision,

            (Date, Timestamp) | (Timestamp, Date) => Timestamp,
            (Date | Timestamp, TimestampTz) | (TimestampTz, Date | Timestamp) => TimestampTz,

            _ => Text,
        }
    }
}

/// A column in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable,
        }
    }
}

/// A table schema (ordered collection of columns)
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Generate DDL statement for creating a table
    pub fn to_ddl(&self, table_name: &str) -> String {
        let mut ddl = format!("CREATE TABLE {} (\n", quote_ident(table_name));

        let column_defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let nullable_clause = if col.nullable { "" } else { " NOT NULL" };
                format!(
                    "  {} {}{}",
                    quote_ident(&col.name),
                    col.sql_type.to_postgres(),
                    nullable_clause
                )
            })
            .collect();

        ddl.push_str(&column_defs.join(",\n"));
        ddl.push_str("\n)");

        ddl
    }
}

/// Double-quote an identifier, escaping embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Value-based type inference for delimited columns the type map does not cover
pub struct SchemaInferrer;

impl SchemaInferrer {
    /// Infer the type of a single value; `None` for a null token
    pub fn infer_value_type(value: &str) -> Option<SqlType> {
        let trimmed = value.trim();

        if crate::config::NULL_TOKENS.contains(&trimmed) {
            return None;
        }

        if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            return Some(SqlType::Boolean);
        }

        // Integers are widened to BIGINT: a later window may exceed what the
        // first one suggests.
        if trimmed.parse::<i64>().is_ok() {
            return Some(SqlType::BigInt);
        }

        if trimmed.parse::<f64>().is_ok() {
            return Some(SqlType::DoublePrecision);
        }

        if parse_date(trimmed).is_some() {
            return Some(SqlType::Date);
        }

        if parse_timestamp(trimmed).is_some() {
            return Some(SqlType::Timestamp);
        }

        Some(SqlType::Text)
    }

    /// Infer column type from its values, returning (type, saw_null)
    pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a str>) -> (SqlType, bool) {
        let mut inferred_type: Option<SqlType> = None;
        let mut has_nulls = false;

        for value in values {
            match Self::infer_value_type(value) {
                Some(val_type) => {
                    inferred_type = Some(match inferred_type {
                        None => val_type,
                        Some(current) => current.common_type(&val_type),
                    });
                }
                None => {
                    has_nulls = true;
                }
            }
        }

        (inferred_type.unwrap_or(SqlType::Text), has_nulls)
    }
}

/// Parse a calendar date in one of the accepted formats
/// (YYYY-MM-DD, MM/DD/YYYY, DD-MM-YYYY, DD/MM/YYYY)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%d/%m/%Y"];

    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Parse a timestamp in one of the formats PostgreSQL also accepts
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 9] = [
        "%Y-%m-%d %H:%M:%S",    // 2025-01-01 12:34:56
        "%Y-%m-%dT%H:%M:%S",    // 2025-01-01T12:34:56 (ISO 8601)
        "%Y-%m-%d %H:%M:%S%.f", // With fractional seconds
        "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 with fractional seconds
        "%Y-%m-%d %H:%M",       // Without seconds
        "%Y-%m-%dT%H:%M",       // ISO 8601 without seconds
        "%m/%d/%Y %H:%M:%S",    // US format with time
        "%m/%d/%Y %I:%M:%S %p", // US format with AM/PM
        "%d-%m-%Y %H:%M:%S",    // European format with time
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_value_types() {
        assert_eq!(SchemaInferrer::infer_value_type("42"), Some(SqlType::BigInt));
        assert_eq!(
            SchemaInferrer::infer_value_type("9999999999"),
            Some(SqlType::BigInt)
        );
        assert_eq!(
            SchemaInferrer::infer_value_type("3.14"),
            Some(SqlType::DoublePrecision)
        );
        assert_eq!(
            SchemaInferrer::infer_value_type("true"),
            Some(SqlType::Boolean)
        );
        assert_eq!(
            SchemaInferrer::infer_value_type("hello"),
            Some(SqlType::Text)
        );
        assert_eq!(
            SchemaInferrer::infer_value_type("2025-12-03"),
            Some(SqlType::Date)
        );
        assert_eq!(
            SchemaInferrer::infer_value_type("2025-12-03 08:15:00"),
            Some(SqlType::Timestamp)
        );
        assert_eq!(SchemaInferrer::infer_value_type(""), None);
        assert_eq!(SchemaInferrer::infer_value_type("NaN"), None);
    }

    #[test]
    fn test_type_promotion() {
        assert_eq!(
            SqlType::SmallInt.common_type(&SqlType::Integer),
            SqlType::Integer
        );
        assert_eq!(
            SqlType::Integer.common_type(&SqlType::BigInt),
            SqlType::BigInt
        );
        assert_eq!(
            SqlType::BigInt.common_type(&SqlType::DoublePrecision),
            SqlType::DoublePrecision
        );
        assert_eq!(
            SqlType::Date.common_type(&SqlType::Timestamp),
            SqlType::Timestamp
        );
        assert_eq!(SqlType::BigInt.common_type(&SqlType::Text), SqlType::Text);
        assert_eq!(SqlType::Boolean.common_type(&SqlType::BigInt), SqlType::Text);
    }

    #[test]
    fn test_infer_column_type_with_nulls() {
        let (sql_type, nullable) = SchemaInferrer::infer_column_type(["1", "", "3"]);
        assert_eq!(sql_type, SqlType::BigInt);
        assert!(nullable);

        let (sql_type, nullable) = SchemaInferrer::infer_column_type(["1", "2.5"]);
        assert_eq!(sql_type, SqlType::DoublePrecision);
        assert!(!nullable);

        // A column with no values at all falls back to TEXT
        let (sql_type, nullable) = SchemaInferrer::infer_column_type(std::iter::empty());
        assert_eq!(sql_type, SqlType::Text);
        assert!(!nullable);
    }

    #[test]
    fn test_mixed_types_promote_to_text() {
        let (sql_type, _) = SchemaInferrer::infer_column_type(["123", "hello", "456"]);
        assert_eq!(sql_type, SqlType::Text);
    }

    #[test]
    fn test_generate_ddl() {
        let schema = Schema::new(vec![
            Column::new("id", SqlType::BigInt, false),
            Column::new("name", SqlType::Text, true),
            Column::new("fare_amount", SqlType::DoublePrecision, true),
        ]);

        let ddl = schema.to_ddl("trips");

        assert!(ddl.contains("CREATE TABLE \"trips\""));
        assert!(ddl.contains("\"id\" BIGINT NOT NULL"));
        assert!(ddl.contains("\"name\" TEXT"));
        assert!(!ddl.contains("\"name\" TEXT NOT NULL"));
        assert!(ddl.contains("\"fare_amount\" DOUBLE PRECISION"));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("Zone"), "\"Zone\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_date_parsing() {
        let test_cases = [
            ("2025-01-01", true, "ISO date"),
            ("12/25/2025", true, "US format MM/DD/YYYY"),
            ("25-12-2025", true, "European format DD-MM-YYYY"),
            ("2024-02-29", true, "Valid leap year"),
            ("2025-02-29", false, "Invalid non-leap year Feb 29"),
            ("2025-13-01", false, "Invalid month 13"),
            ("2025-04-31", false, "April 31 doesn't exist"),
        ];

        for (input, valid, description) in test_cases {
            assert_eq!(
                parse_date(input).is_some(),
                valid,
                "Failed: {} - input '{}'",
                description,
                input
            );
        }
    }

    #[test]
    fn test_timestamp_parsing() {
        let test_cases = [
            ("2025-01-01T12:34:56", true, "ISO 8601"),
            ("2025-01-01 12:34:56", true, "SQL format"),
            ("2025-01-01 12:34", true, "Without seconds"),
            ("2025-01-01 12:34:56.123", true, "With fractional seconds"),
            ("01/15/2021 09:05:00 PM", true, "US format with AM/PM"),
            ("path/to/file:123", false, "File path"),
            ("http://example.com:8080", false, "URL"),
        ];

        for (input, valid, description) in test_cases {
            assert_eq!(
                parse_timestamp(input).is_some(),
                valid,
                "Failed: {} - input '{}'",
                description,
                input
            );
        }
    }
}
