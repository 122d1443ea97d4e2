//! Table writer: replace-then-append into the destination.
//!
//! Every writer call runs in its own transaction. Rows are sent as multi-row
//! `INSERT` statements sized to stay under the backend's bind-parameter limit.

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::postgres::PgConnection;
use std::future::Future;

use super::pool::{Pool, PoolConnection};
use super::schema::{Column, Schema, SqlType, quote_ident};
use crate::config::{PG_MAX_BIND_PARAMS, QUERY_TIMEOUT, SQLITE_MAX_BIND_PARAMS};
use crate::error::{IngestError, Result};
use crate::formats::batch::{RowBatch, Value};

type PgQuery<'q> =
    sqlx::query::Query<'q, sqlx::Postgres, <sqlx::Postgres as sqlx::Database>::Arguments<'q>>;

/// Destination of an ingestion run
#[async_trait]
pub trait TableWriter: Send + Sync {
    /// Drop `table` if present, create it from `schema` and insert `batch`
    async fn replace(&self, table: &str, schema: &Schema, batch: &RowBatch) -> Result<()>;

    /// Insert `batch` into `table`, whose columns must match the batch's exactly
    async fn append(&self, table: &str, batch: &RowBatch) -> Result<()>;
}

/// `TableWriter` over the destination connection pool
#[derive(Debug, Clone)]
pub struct SqlTableWriter {
    pool: Pool,
}

impl SqlTableWriter {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn max_bind_params(&self) -> usize {
        if self.pool.is_postgres() {
            PG_MAX_BIND_PARAMS
        } else {
            SQLITE_MAX_BIND_PARAMS
        }
    }

    async fn execute(&self, plan: &WritePlan<'_>) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        match &mut conn {
            PoolConnection::Postgres(pg_conn) => write_postgres(&mut **pg_conn, plan).await,
            #[cfg(test)]
            PoolConnection::Sqlite(sqlite_conn) => {
                sqlite::write_sqlite(&mut **sqlite_conn, plan).await
            }
        }
    }
}

#[async_trait]
impl TableWriter for SqlTableWriter {
    async fn replace(&self, table: &str, schema: &Schema, batch: &RowBatch) -> Result<()> {
        let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
        let plan = WritePlan::new(
            vec![drop_sql, schema.to_ddl(table)],
            table,
            &schema.columns,
            batch.rows(),
            self.max_bind_params(),
            self.pool.is_postgres(),
        );

        self.execute(&plan).await?;

        tracing::info!(
            table,
            columns = schema.len(),
            rows = batch.num_rows(),
            statements = plan.inserts.len(),
            "replaced table"
        );
        Ok(())
    }

    async fn append(&self, table: &str, batch: &RowBatch) -> Result<()> {
        // Checked before acquiring: the lookup takes its own connection
        let table_columns = self.pool.table_columns(table).await?;
        let batch_columns = batch.column_names();
        if table_columns != batch_columns {
            return Err(IngestError::SchemaMismatch {
                table: table.to_string(),
                table_columns,
                batch_columns,
            });
        }

        let plan = WritePlan::new(
            Vec::new(),
            table,
            &batch.schema().columns,
            batch.rows(),
            self.max_bind_params(),
            self.pool.is_postgres(),
        );

        self.execute(&plan).await?;

        tracing::debug!(table, rows = batch.num_rows(), "appended batch");
        Ok(())
    }
}

/// Statements of one writer call, run in order inside one transaction
struct WritePlan<'a> {
    ddl: Vec<String>,
    columns: &'a [Column],
    inserts: Vec<InsertStatement<'a>>,
}

struct InsertStatement<'a> {
    sql: String,
    rows: &'a [Vec<Value>],
}

impl<'a> WritePlan<'a> {
    fn new(
        ddl: Vec<String>,
        table: &str,
        columns: &'a [Column],
        rows: &'a [Vec<Value>],
        max_bind_params: usize,
        postgres: bool,
    ) -> Self {
        let rows_per_statement = rows_per_statement(columns.len(), max_bind_params);
        let inserts = if columns.is_empty() {
            Vec::new()
        } else {
            rows.chunks(rows_per_statement)
                .map(|chunk| InsertStatement {
                    sql: insert_sql(table, columns, chunk.len(), postgres),
                    rows: chunk,
                })
                .collect()
        };

        Self {
            ddl,
            columns,
            inserts,
        }
    }
}

fn rows_per_statement(num_columns: usize, max_bind_params: usize) -> usize {
    (max_bind_params / num_columns.max(1)).max(1)
}

/// Build `INSERT INTO t ("a", "b") VALUES ($1, $2), ($3, $4), ...`
///
/// On PostgreSQL, NUMERIC parameters are bound as text and cast in SQL.
fn insert_sql(table: &str, columns: &[Column], num_rows: usize, postgres: bool) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();

    let mut param_idx = 1;
    let mut value_groups = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let placeholders: Vec<String> = columns
            .iter()
            .map(|col| {
                let placeholder = if postgres {
                    format!("${param_idx}")
                } else {
                    "?".to_string()
                };
                param_idx += 1;

                if postgres && col.sql_type == SqlType::Numeric {
                    format!("CAST({placeholder} AS NUMERIC)")
                } else {
                    placeholder
                }
            })
            .collect();
        value_groups.push(format!("({})", placeholders.join(", ")));
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        column_list.join(", "),
        value_groups.join(", ")
    )
}

/// Bound a statement by the query timeout; elapsed time is a destination error
async fn timed<T>(statement: impl Future<Output = Result<T, sqlx::Error>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, statement).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(IngestError::Destination(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!(
                "statement timed out after {} seconds",
                QUERY_TIMEOUT.as_secs()
            ),
        )))),
    }
}

async fn write_postgres(conn: &mut PgConnection, plan: &WritePlan<'_>) -> Result<()> {
    let mut tx = conn.begin().await?;

    for ddl in &plan.ddl {
        timed(sqlx::query(ddl).execute(&mut *tx)).await?;
    }

    for insert in &plan.inserts {
        let mut query = sqlx::query(&insert.sql);
        for row in insert.rows {
            for (value, column) in row.iter().zip(plan.columns) {
                query = bind_typed_value(query, value, column)?;
            }
        }
        timed(query.execute(&mut *tx)).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Bind a single value with the native type of its column
fn bind_typed_value<'q>(query: PgQuery<'q>, value: &'q Value, column: &Column) -> Result<PgQuery<'q>> {
    let out_of_range = || {
        IngestError::parse_at(
            None,
            &column.name,
            format!("value out of range for {}", column.sql_type.to_postgres()),
        )
    };

    Ok(match (column.sql_type, value) {
        (sql_type, Value::Null) => bind_null(query, sql_type),

        (SqlType::Boolean, Value::Bool(b)) => query.bind(*b),
        (SqlType::SmallInt, Value::Int(i)) => {
            query.bind(i16::try_from(*i).map_err(|_| out_of_range())?)
        }
        (SqlType::Integer, Value::Int(i)) => {
            query.bind(i32::try_from(*i).map_err(|_| out_of_range())?)
        }
        (SqlType::BigInt, Value::Int(i)) => query.bind(*i),
        (SqlType::Real, Value::Float(f)) => query.bind(*f as f32),
        (SqlType::Real, Value::Int(i)) => query.bind(*i as f32),
        (SqlType::DoublePrecision, Value::Float(f)) => query.bind(*f),
        (SqlType::DoublePrecision, Value::Int(i)) => query.bind(*i as f64),

        // Text parameters, cast to NUMERIC in the statement
        (SqlType::Numeric, Value::Numeric(n)) => query.bind(n.as_str()),
        (SqlType::Numeric, Value::Int(i)) => query.bind(i.to_string()),
        (SqlType::Numeric, Value::Float(f)) => query.bind(f.to_string()),

        (SqlType::Text, Value::Text(s)) => query.bind(s.as_str()),
        (SqlType::Date, Value::Date(d)) => query.bind(*d),
        (SqlType::Timestamp, Value::Timestamp(ts)) => query.bind(*ts),
        (SqlType::TimestampTz, Value::TimestampTz(ts)) => query.bind(*ts),
        (SqlType::Bytea, Value::Bytes(b)) => query.bind(b.as_slice()),

        (sql_type, value) => {
            return Err(IngestError::parse_at(
                None,
                &column.name,
                format!(
                    "cannot store {} value in {} column",
                    value.kind(),
                    sql_type.to_postgres()
                ),
            ));
        }
    })
}

/// Bind NULL with the parameter type of the column
fn bind_null(query: PgQuery<'_>, sql_type: SqlType) -> PgQuery<'_> {
    match sql_type {
        SqlType::Boolean => query.bind(None::<bool>),
        SqlType::SmallInt => query.bind(None::<i16>),
        SqlType::Integer => query.bind(None::<i32>),
        SqlType::BigInt => query.bind(None::<i64>),
        SqlType::Real => query.bind(None::<f32>),
        SqlType::DoublePrecision => query.bind(None::<f64>),
        SqlType::Numeric | SqlType::Text => query.bind(None::<String>),
        SqlType::Date => query.bind(None::<chrono::NaiveDate>),
        SqlType::Timestamp => query.bind(None::<chrono::NaiveDateTime>),
        SqlType::TimestampTz => query.bind(None::<chrono::DateTime<chrono::Utc>>),
        SqlType::Bytea => query.bind(None::<Vec<u8>>),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn zones_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Column::new("LocationID", SqlType::BigInt, true),
            Column::new("Borough", SqlType::Text, true),
        ]))
    }

    fn zone_rows(range: std::ops::Range<i64>) -> Vec<Vec<Value>> {
        range
            .map(|i| vec![Value::Int(i), Value::Text(format!("borough_{i}"))])
            .collect()
    }

    #[test]
    fn test_insert_sql_postgres() {
        let columns = vec![
            Column::new("id", SqlType::BigInt, false),
            Column::new("amount", SqlType::Numeric, true),
        ];
        assert_eq!(
            insert_sql("trips", &columns, 2, true),
            "INSERT INTO \"trips\" (\"id\", \"amount\") VALUES \
             ($1, CAST($2 AS NUMERIC)), ($3, CAST($4 AS NUMERIC))"
        );
        assert_eq!(
            insert_sql("trips", &columns, 1, false),
            "INSERT INTO \"trips\" (\"id\", \"amount\") VALUES (?, ?)"
        );
    }

    #[test]
    fn test_statements_stay_under_bind_limit() {
        assert_eq!(rows_per_statement(19, PG_MAX_BIND_PARAMS), 3449);
        assert_eq!(rows_per_statement(2, 5), 2);
        assert_eq!(rows_per_statement(10, 5), 1);

        let schema = zones_schema();
        let rows = zone_rows(0..7);
        let plan = WritePlan::new(Vec::new(), "zones", &schema.columns, &rows, 4, false);
        let sizes: Vec<usize> = plan.inserts.iter().map(|s| s.rows.len()).collect();
        assert_eq!(sizes, vec![2, 2, 2, 1]);
    }

    #[test]
    fn test_postgres_bind_rejects_out_of_range() {
        let column = Column::new("passenger_count", SqlType::SmallInt, true);
        let value = Value::Int(40_000);
        let query = sqlx::query::<sqlx::Postgres>("SELECT $1");
        match bind_typed_value(query, &value, &column) {
            Err(IngestError::Parse { column, message, .. }) => {
                assert_eq!(column.as_deref(), Some("passenger_count"));
                assert!(message.contains("out of range"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("40000 bound as SMALLINT"),
        }

        let column = Column::new("VendorID", SqlType::Integer, true);
        let value = Value::Int(i64::from(i32::MAX) + 1);
        assert!(bind_typed_value(sqlx::query("SELECT $1"), &value, &column).is_err());
    }

    #[test]
    fn test_postgres_bind_rejects_type_mismatch() {
        let column = Column::new("VendorID", SqlType::BigInt, true);
        let value = Value::Text("one".to_string());
        match bind_typed_value(sqlx::query("SELECT $1"), &value, &column) {
            Err(IngestError::Parse { message, .. }) => {
                assert!(message.contains("cannot store"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("text bound as BIGINT"),
        }
    }

    #[test]
    fn test_postgres_bind_native_types() {
        let pickup = crate::db::schema::parse_timestamp("2021-01-01 00:30:10").unwrap();
        let cases = vec![
            (SqlType::Numeric, Value::Numeric("12.50".to_string())),
            (SqlType::Numeric, Value::Int(7)),
            (SqlType::Numeric, Value::Null),
            (SqlType::BigInt, Value::Null),
            (SqlType::SmallInt, Value::Int(4)),
            (SqlType::DoublePrecision, Value::Int(3)),
            (SqlType::Timestamp, Value::Timestamp(pickup)),
            (SqlType::TimestampTz, Value::Null),
            (SqlType::Text, Value::Text("EWR".to_string())),
        ];

        let mut query = sqlx::query::<sqlx::Postgres>("SELECT 1");
        for (sql_type, value) in &cases {
            let column = Column::new("c", *sql_type, true);
            query = bind_typed_value(query, value, &column).unwrap();
        }
    }

    #[tokio::test]
    async fn test_replace_then_append() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = SqlTableWriter::new(pool.clone());
        let schema = zones_schema();

        let first = RowBatch::new(Arc::clone(&schema), zone_rows(0..3));
        writer.replace("zones", &schema, &first).await.unwrap();
        assert_eq!(pool.count_rows("zones").await.unwrap(), 3);

        let second = RowBatch::new(Arc::clone(&schema), zone_rows(3..5));
        writer.append("zones", &second).await.unwrap();
        assert_eq!(pool.count_rows("zones").await.unwrap(), 5);

        // A second replace starts from scratch
        writer.replace("zones", &schema, &first).await.unwrap();
        assert_eq!(pool.count_rows("zones").await.unwrap(), 3);
        assert_eq!(
            pool.table_columns("zones").await.unwrap(),
            vec!["LocationID", "Borough"]
        );
    }

    #[tokio::test]
    async fn test_replace_with_empty_batch_creates_table() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = SqlTableWriter::new(pool.clone());
        let schema = zones_schema();

        writer
            .replace("zones", &schema, &RowBatch::empty(Arc::clone(&schema)))
            .await
            .unwrap();
        assert_eq!(pool.count_rows("zones").await.unwrap(), 0);
        assert_eq!(pool.table_columns("zones").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_schema_mismatch() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = SqlTableWriter::new(pool.clone());
        let schema = zones_schema();
        writer
            .replace("zones", &schema, &RowBatch::new(Arc::clone(&schema), zone_rows(0..2)))
            .await
            .unwrap();

        let other = Arc::new(Schema::new(vec![
            Column::new("Borough", SqlType::Text, true),
            Column::new("LocationID", SqlType::BigInt, true),
        ]));
        let batch = RowBatch::new(
            Arc::clone(&other),
            vec![vec![Value::Text("EWR".into()), Value::Int(1)]],
        );
        match writer.append("zones", &batch).await.unwrap_err() {
            IngestError::SchemaMismatch {
                table_columns,
                batch_columns,
                ..
            } => {
                assert_eq!(table_columns, vec!["LocationID", "Borough"]);
                assert_eq!(batch_columns, vec!["Borough", "LocationID"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.count_rows("zones").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_to_missing_table_is_mismatch() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = SqlTableWriter::new(pool);
        let schema = zones_schema();
        let batch = RowBatch::new(Arc::clone(&schema), zone_rows(0..1));
        assert!(matches!(
            writer.append("missing", &batch).await,
            Err(IngestError::SchemaMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_append_rolls_back() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = SqlTableWriter::new(pool.clone());
        let schema = Arc::new(Schema::new(vec![Column::new("id", SqlType::BigInt, false)]));
        writer
            .replace(
                "ids",
                &schema,
                &RowBatch::new(Arc::clone(&schema), vec![vec![Value::Int(1)]]),
            )
            .await
            .unwrap();

        // NOT NULL violation on the second statement's rows
        let bad = RowBatch::new(
            Arc::clone(&schema),
            vec![vec![Value::Int(2)], vec![Value::Null]],
        );
        assert!(matches!(
            writer.append("ids", &bad).await,
            Err(IngestError::Destination(_))
        ));
        assert_eq!(pool.count_rows("ids").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_typed_values_round_trip_through_sqlite() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        let writer = SqlTableWriter::new(pool.clone());
        let schema = Arc::new(Schema::new(vec![
            Column::new("flag", SqlType::Boolean, true),
            Column::new("fare", SqlType::DoublePrecision, true),
            Column::new("pickup", SqlType::Timestamp, true),
        ]));
        let pickup = crate::db::schema::parse_timestamp("2021-01-01 00:30:10").unwrap();
        let batch = RowBatch::new(
            Arc::clone(&schema),
            vec![
                vec![Value::Bool(true), Value::Float(8.5), Value::Timestamp(pickup)],
                vec![Value::Null, Value::Null, Value::Null],
            ],
        );
        writer.replace("typed", &schema, &batch).await.unwrap();

        let mut conn = match pool.acquire().await.unwrap() {
            PoolConnection::Sqlite(conn) => conn,
            _ => unreachable!(),
        };
        let (fare,): (f64,) = sqlx::query_as("SELECT fare FROM typed WHERE flag = 1")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(fare, 8.5);
    }
}
