use clap::Parser;
use taxi_ingest::runner::{IngestArgs, Service, run_ingest};

/// Ingest NYC taxi data (yellow, green, or zones) into PostgreSQL
#[derive(Parser, Clone)]
#[command(version)]
struct Args {
    /// PostgreSQL user
    #[arg(long, env = "PG_USER", default_value = "root")]
    pg_user: String,

    /// PostgreSQL password
    #[arg(long, env = "PG_PASS", default_value = "root", hide_env_values = true)]
    pg_pass: String,

    /// PostgreSQL host
    #[arg(long, env = "PG_HOST", default_value = "localhost")]
    pg_host: String,

    /// PostgreSQL port
    #[arg(long, env = "PG_PORT", default_value = "5432")]
    pg_port: u16,

    /// PostgreSQL database name
    #[arg(long, env = "PG_DB", default_value = "ny_taxi")]
    pg_db: String,

    /// Year of the data (for trips)
    #[arg(long, env = "INGEST_YEAR", default_value = "2025")]
    year: u16,

    /// Month of the data (for trips)
    #[arg(long, env = "INGEST_MONTH", default_value = "11")]
    month: u8,

    /// Target table name (defaults based on service if empty)
    #[arg(long, env = "INGEST_TARGET_TABLE", default_value = "")]
    target_table: String,

    /// Rows per streamed window
    #[arg(long, env = "INGEST_CHUNKSIZE", default_value = "100000")]
    chunksize: usize,

    /// Service type to ingest (yellow, green, zones)
    #[arg(long, env = "INGEST_SERVICE", default_value = "yellow")]
    service: String,

    /// Source URL or local path overriding the service default
    #[arg(long, env = "INGEST_SOURCE_URI")]
    source_uri: Option<String>,

    /// Quiet mode - minimal output, only show summary
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing based on quiet mode; RUST_LOG takes precedence
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let default_filter = if args.quiet {
        "warn"
    } else {
        "taxi_ingest=info,sqlx=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let service = Service::parse(&args.service)?;

    if !args.quiet {
        println!("Taxi Data Ingest");
        println!("================");
        println!("Database: {} at {}:{}", args.pg_db, args.pg_host, args.pg_port);
        println!("Service: {}", service);
        if service != Service::Zones {
            println!("Period: {}-{:02}", args.year, args.month);
        }
        println!();
    }

    let ingest_args = IngestArgs {
        pg_host: args.pg_host,
        pg_port: args.pg_port,
        pg_user: args.pg_user,
        pg_pass: args.pg_pass,
        pg_db: args.pg_db,
        service,
        year: args.year,
        month: args.month,
        target_table: args.target_table,
        chunk_size: args.chunksize,
        source_uri: args.source_uri,
    };

    let result = run_ingest(ingest_args).await?;

    println!();
    println!("Ingest Summary");
    println!("==============");
    println!("Run ID: {}", result.run_id);
    println!("Source: {}", result.source);
    println!("Table: {}", result.table);
    println!("Batches written: {}", result.batches);
    println!("Rows ingested: {}", result.rows);
    println!("Rows in table: {}", result.table_rows);
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
    if let (Some(p50), Some(p99)) = (result.p50_batch_ms, result.p99_batch_ms) {
        println!("Batch write time: p50 {p50}ms, p99 {p99}ms");
    }
    println!(
        "Throughput: {:.2} rows/sec",
        result.rows as f64 / result.duration.as_secs_f64().max(f64::EPSILON)
    );

    Ok(())
}
