mod cli;
mod commands;

use clap::Parser;
use services::{Clock, LmsServices};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, normalize_sqlite_url, prepare_sqlite_file};

const DEFAULT_LOG_FILTER: &str = "lms=info,services=info,storage=info";

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    // stdout carries command output; logs go to stderr.
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_url = normalize_sqlite_url(&cli.db_url);
    prepare_sqlite_file(&db_url)?;

    // Connecting also migrates.
    let services = LmsServices::new_sqlite(&db_url, Clock::default()).await?;
    info!(db = %db_url, "storage ready");

    let output = commands::execute(&services, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "command failed");
        eprintln!("{err}");
        std::process::exit(2);
    }
}
