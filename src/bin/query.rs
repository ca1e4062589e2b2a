//! One-shot query against a model's PostgreSQL store: matches `name` or `title`
//! case-insensitively and logs the documents found.

use clap::Parser;
use rest_protocols::controller::{CliArgs, ControllerOptions};
use rest_protocols::{DbRegistry, HttpAdapter, PgDocumentStore, ProtocolOptions};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "protocols-query", about = "Search a model's documents by name or title")]
struct Args {
    /// Model to query.
    #[arg(long, default_value = "example")]
    model: String,
    /// Case-insensitive pattern; empty matches everything.
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    limit: Option<u64>,
    /// Schema holding the model tables (overrides PROTOCOLS_SCHEMA).
    #[arg(long)]
    schema: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rest_protocols=info")))
        .init();
    match run(Args::parse()).await {
        Ok(docs) => {
            println!("{}", docs);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "protocols-query failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<String, Box<dyn std::error::Error>> {
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/protocols".into());
    let schema = args
        .schema
        .clone()
        .or_else(|| std::env::var("PROTOCOLS_SCHEMA").ok())
        .unwrap_or_else(|| "protocols".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    let store = PgDocumentStore::new(pool.clone(), &schema, &args.model);
    store.ensure_table().await?;

    // Results are printed below; the handler must not end the process.
    let mut config = rest_protocols::config::from_env()?;
    config.exit_on_cli_complete = Some(false);
    let adapter = HttpAdapter::new(ProtocolOptions {
        db: DbRegistry::new().with(&args.model, Arc::new(store)),
        config,
        ..Default::default()
    })?;
    let query = rest_protocols::controller::cli::cli(adapter.context(), &ControllerOptions::new(&args.model))?;
    let result = query(CliArgs {
        search: args.search,
        limit: args.limit,
    })
    .await;
    pool.close().await;
    Ok(serde_json::to_string_pretty(&result?)?)
}
