//! folio: command-line tool for managing and searching folio entities.
//!
//! Records are written through the searchable service, so every `add` and
//! `patch` also refreshes the record's search vector.

mod args;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_core::{RecordId, SearchRequest, SortKey};
use folio_db::{log_pool_metrics, Database, PoolConfig};
use folio_search::{SearchSettings, SearchableService};

use crate::args::{load_schema, parse_assignment, record_values};

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Weighted full-text search for PostgreSQL records")]
#[command(propagate_version = true)]
struct Cli {
    /// Entity schema YAML (default: built-in books schema)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Database URL (default: $DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Create a record and index it
    Add {
        /// Field values as FIELD=VALUE
        #[arg(value_parser = parse_assignment)]
        values: Vec<(String, JsonValue)>,

        /// Field values as a JSON object
        #[arg(long)]
        json: Option<String>,
    },

    /// Change some fields of a record and re-index it
    Patch {
        /// Record primary key
        id: String,

        /// Field values as FIELD=VALUE
        #[arg(value_parser = parse_assignment, required_unless_present = "json")]
        values: Vec<(String, JsonValue)>,

        /// Field values as a JSON object
        #[arg(long)]
        json: Option<String>,
    },

    /// Find records, ranked by relevance when a term is given
    Search {
        /// Free-text search term
        term: Option<String>,

        /// Equality filter as FIELD=VALUE (repeatable)
        #[arg(short, long, value_parser = parse_assignment)]
        filter: Vec<(String, JsonValue)>,

        /// Sort as FIELD[:asc|desc] (repeatable); `rank` sorts by relevance
        #[arg(short, long)]
        sort: Vec<SortKey>,

        /// Output column (repeatable); include `rank` to keep relevance
        #[arg(long)]
        select: Vec<String>,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<i64>,

        /// Records to skip
        #[arg(long)]
        offset: Option<i64>,
    },

    /// Rebuild the search vector of every record
    Reindex,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _file_guard = init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("Error: {}", user_facing_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "folio=info,folio_db=info,folio_search=info")
///
/// Console logs go to stderr so stdout carries only command output.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "folio=info,folio_db=info,folio_search=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("folio.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let schema = load_schema(cli.schema.as_deref())?;
    let database_url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/folio".to_string()),
    };

    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    log_pool_metrics(db.pool());
    let service = SearchableService::new(
        schema.clone(),
        db.shared_executor(),
        &SearchSettings::from_env()?,
    );

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
            info!(subsystem = "cli", op = "migrate", "Migrations applied");
        }
        Commands::Add { values, json } => {
            let values = record_values(json.as_deref(), values)?;
            print_record(&service.create(&values).await?)?;
        }
        Commands::Patch { id, values, json } => {
            let id = RecordId::from_value(&JsonValue::String(id.clone()))
                .ok_or_else(|| anyhow::anyhow!("Invalid record id '{}'", id))?;
            let values = record_values(json.as_deref(), values)?;
            print_record(&service.patch(id, &values).await?)?;
        }
        Commands::Search {
            term,
            filter,
            sort,
            select,
            limit,
            offset,
        } => {
            let mut request = SearchRequest {
                term,
                ..Default::default()
            };
            request.filters.extend(filter);
            if !sort.is_empty() {
                request.sort = Some(sort);
            }
            if !select.is_empty() {
                request.selection = Some(select);
            }
            request.limit = limit;
            request.offset = offset;

            for record in service.find(&request).await? {
                print_record(&record)?;
            }
        }
        Commands::Reindex => {
            let report = service.reindex().await?;
            println!(
                "{} records: {} indexed, {} skipped",
                report.total, report.updated, report.skipped
            );
        }
    }

    db.pool().close().await;
    Ok(())
}

/// Folio errors are reduced to their generic user message; storage detail
/// only reaches the log. Anything else (bad arguments, unreadable files) is
/// shown as is.
fn user_facing_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<folio_core::Error>() {
        Some(folio_err) => folio_err.user_message().to_string(),
        None => format!("{:#}", err),
    }
}

fn print_record(record: &Map<String, JsonValue>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}
