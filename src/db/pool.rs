//! Adapter between bb8 and the sqlx::Postgres driver.
use anyhow::{Context, Result};
use derive_builder::Builder;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::ConnectOptions;

use crate::config::{CONNECT_TIMEOUT, PING_TIMEOUT};

pub type Bb8Connection = bb8::PooledConnection<'static, ConnectionManager>;

/// Inner pool variants
#[derive(Debug, Clone)]
enum PoolInner {
    Postgres(bb8::Pool<ConnectionManager>),
    #[cfg(test)]
    Sqlite(sqlx::SqlitePool),
}

/// Connection that can be either Postgres or SQLite
pub enum PoolConnection {
    Postgres(Bb8Connection),
    #[cfg(test)]
    Sqlite(sqlx::pool::PoolConnection<sqlx::Sqlite>),
}

/// Destination handle shared by the writer. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: PoolInner,
}

#[derive(Builder)]
pub struct PoolArgs {
    #[builder(setter(into), default = "\"localhost\".to_string()")]
    host: String,
    #[builder(default = "5432")]
    port: u16,
    #[builder(setter(into))]
    username: String,
    #[builder(setter(into))]
    password: String,
    #[builder(setter(into))]
    database: String,
    #[builder(default = "4")]
    max_pool_size: u32,
}

/// Open a connection pool and verify that one connection can be established
pub async fn pool(args: PoolArgs) -> Result<Pool> {
    let PoolArgs {
        host,
        port,
        username,
        password,
        database,
        max_pool_size,
    } = args;

    let connect_options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&username)
        .password(&password)
        .database(&database);

    let bb8_pool = bb8::Builder::new()
        .max_size(max_pool_size)
        .connection_timeout(CONNECT_TIMEOUT)
        .build(ConnectionManager::new(connect_options))
        .await
        .context("Failed to create connection pool")?;

    // bb8 connects lazily; fail here rather than on the first batch
    drop(
        bb8_pool
            .get()
            .await
            .map_err(run_error_to_sqlx)
            .with_context(|| format!("Failed to connect to {database} at {host}:{port}"))?,
    );

    tracing::info!(%host, port, %database, "connected to destination");

    Ok(Pool {
        inner: PoolInner::Postgres(bb8_pool),
    })
}

fn run_error_to_sqlx(e: bb8::RunError<sqlx::Error>) -> sqlx::Error {
    match e {
        bb8::RunError::User(e) => e,
        bb8::RunError::TimedOut => sqlx::Error::PoolTimedOut,
    }
}

impl Pool {
    /// Create an in-memory SQLite pool for testing
    ///
    /// A single connection: every in-memory SQLite connection is its own database.
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self, sqlx::Error> {
        let sqlite_pool = sqlx::sqlite::SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Pool {
            inner: PoolInner::Sqlite(sqlite_pool),
        })
    }

    pub async fn acquire(&self) -> Result<PoolConnection, sqlx::Error> {
        match &self.inner {
            PoolInner::Postgres(pool) => {
                let conn = pool.get_owned().await.map_err(run_error_to_sqlx)?;
                Ok(PoolConnection::Postgres(conn))
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => {
                let conn = pool.acquire().await?;
                Ok(PoolConnection::Sqlite(conn))
            }
        }
    }

    /// Check if this pool is using PostgreSQL (returns false for SQLite)
    pub fn is_postgres(&self) -> bool {
        matches!(&self.inner, PoolInner::Postgres(_))
    }

    /// Column names of an existing table in ordinal order; empty if the table is missing
    pub async fn table_columns(&self, table_name: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = match &self.inner {
            PoolInner::Postgres(pool) => {
                let mut conn = pool.get().await.map_err(run_error_to_sqlx)?;
                let query = r#"
                    SELECT column_name::text
                    FROM information_schema.columns
                    WHERE table_name = $1
                    AND table_schema = current_schema()
                    ORDER BY ordinal_position
                "#;
                sqlx::query_as(query)
                    .bind(table_name)
                    .fetch_all(&mut *conn)
                    .await?
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => {
                sqlx::query_as("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                    .bind(table_name)
                    .fetch_all(pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Count rows of a table (used by the runner summary and tests)
    pub async fn count_rows(&self, table_name: &str) -> Result<i64, sqlx::Error> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            super::schema::quote_ident(table_name)
        );
        let (count,): (i64,) = match &self.inner {
            PoolInner::Postgres(pool) => {
                let mut conn = pool.get().await.map_err(run_error_to_sqlx)?;
                sqlx::query_as(&sql).fetch_one(&mut *conn).await?
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => sqlx::query_as(&sql).fetch_one(pool).await?,
        };
        Ok(count)
    }
}

// Wrap the connect options so that we can implement the bb8::ManageConnection trait.
#[derive(Debug)]
pub struct ConnectionManager {
    connect_options: PgConnectOptions,
}

impl ConnectionManager {
    /// Create a new `ConnectionManager` with the specified connect options.
    pub fn new(connect_options: PgConnectOptions) -> Self {
        Self { connect_options }
    }
}

impl bb8::ManageConnection for ConnectionManager {
    type Connection = PgConnection;
    type Error = sqlx::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        tokio::time::timeout(CONNECT_TIMEOUT, self.connect_options.connect())
            .await
            .map_err(|_| sqlx::Error::PoolTimedOut)?
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        tokio::time::timeout(PING_TIMEOUT, sqlx::Connection::ping(conn))
            .await
            // Convert tokio timeouts into sqlx pool timeouts. bb8 will retry a different connection on ping failure.
            .map_err(|_| sqlx::Error::PoolTimedOut)
            // Make sure that we also look at the actual ping result
            .and_then(|result| result)?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        // sqlx::PgConnection provides no non-async way to check for closed/broken connections.
        false
    }
}
