//! # Activity Ingest Entry Point
//!
//! Runs one ingestion batch for the configured project and prints the report.

use std::process::ExitCode;
use std::sync::Arc;

use activity_ingest::{
    config::ConfigLoader,
    db,
    ingest::{IngestionPipeline, PipelineState},
    telemetry,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "activity-ingest", about = "Ingest GitHub issue events into the activity store")]
struct Cli {
    /// Issue number to refresh; repeat for several
    #[arg(long = "issue", value_name = "N")]
    issues: Vec<i64>,

    /// Overwrite activities that are already stored
    #[arg(long)]
    force: bool,

    /// Apply pending migrations before ingesting
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    info!(profile = %config.profile, "Loaded configuration");

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    if cli.migrate {
        db::migrate(&db).await.context("running migrations")?;
    }

    let pipeline = IngestionPipeline::from_config(&config, Arc::new(db))
        .context("building ingestion pipeline")?;
    let report = pipeline
        .run(&cli.issues, cli.force)
        .await
        .context("ingestion run")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(match report.state {
        PipelineState::Failed { .. } | PipelineState::Aborted { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
