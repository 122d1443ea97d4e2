//! Field-name to storage-type mapping for delimited sources.
//!
//! Delimited files carry no types, so each dataset ships a `TypeMap` naming the
//! storage type of the fields it knows about and the fields to parse as
//! timestamps. Fields the map does not name are inferred from the data.

use crate::db::SqlType;

#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    dtypes: Vec<(String, SqlType)>,
    parse_dates: Vec<String>,
}

impl TypeMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<N: Into<String>>(
        dtypes: impl IntoIterator<Item = (N, SqlType)>,
        parse_dates: impl IntoIterator<Item = N>,
    ) -> Self {
        Self {
            dtypes: dtypes.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            parse_dates: parse_dates.into_iter().map(Into::into).collect(),
        }
    }

    /// Yellow taxi trip records
    pub fn yellow() -> Self {
        use SqlType::*;
        Self::new(
            [
                ("VendorID", BigInt),
                ("passenger_count", BigInt),
                ("trip_distance", DoublePrecision),
                ("RatecodeID", BigInt),
                ("store_and_fwd_flag", Text),
                ("PULocationID", BigInt),
                ("DOLocationID", BigInt),
                ("payment_type", BigInt),
                ("fare_amount", DoublePrecision),
                ("extra", DoublePrecision),
                ("mta_tax", DoublePrecision),
                ("tip_amount", DoublePrecision),
                ("tolls_amount", DoublePrecision),
                ("improvement_surcharge", DoublePrecision),
                ("total_amount", DoublePrecision),
                ("congestion_surcharge", DoublePrecision),
            ],
            ["tpep_pickup_datetime", "tpep_dropoff_datetime"],
        )
    }

    /// Taxi zone lookup table
    pub fn zones() -> Self {
        use SqlType::*;
        Self::new(
            [
                ("LocationID", BigInt),
                ("service_zone", Text),
                ("Zone", Text),
                ("Borough", Text),
            ],
            [],
        )
    }

    /// Storage type and nullability of a field, if the map knows it
    ///
    /// Mapped fields are always nullable: the upstream files leave cells blank.
    pub fn lookup(&self, field: &str) -> Option<(SqlType, bool)> {
        if self.parse_dates.iter().any(|d| d == field) {
            return Some((SqlType::Timestamp, true));
        }
        self.dtypes
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, sql_type)| (*sql_type, true))
    }

    pub fn parse_dates(&self) -> &[String] {
        &self.parse_dates
    }

    /// Mapped field names (dtypes and date columns) absent from `header`
    pub fn missing_from<'a>(&'a self, header: &[String]) -> (Vec<&'a str>, Vec<&'a str>) {
        let absent = |name: &String| !header.iter().any(|h| h == name);
        let dtypes = self
            .dtypes
            .iter()
            .map(|(name, _)| name)
            .filter(|&n| absent(n))
            .map(String::as_str)
            .collect();
        let dates = self
            .parse_dates
            .iter()
            .filter(|&n| absent(n))
            .map(String::as_str)
            .collect();
        (dtypes, dates)
    }
}
