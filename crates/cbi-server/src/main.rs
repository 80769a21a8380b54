//! CBI Server - Main entry point

use anyhow::Result;
use cbi_common::logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{error, info, warn};

use cbi_server::{
    api::{self, AppState},
    config::Config,
    db,
    ingest::{self, datasets, sink::PgSink, IngestConfig, RunReport},
};

#[derive(Parser)]
#[command(name = "cbi-server", version, about = "Chicago open data ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve HTTP and run the ingestion timer (default)
    Serve,
    /// Run datasets once and exit; non-zero exit if any run failed
    Run {
        /// Dataset ids; defaults to INGEST_DATASETS
        datasets: Vec<String>,
    },
    /// List registered datasets
    Datasets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let log_config = LogConfig::default()
        .with_log_file_prefix("cbi-server")
        .with_filter_directives("cbi_server=debug,tower_http=debug,sqlx=warn")
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Run { datasets } => run_once(datasets).await,
        Command::Datasets => {
            list_datasets();
            Ok(())
        },
    }
}

async fn serve() -> Result<()> {
    info!("Starting CBI Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = db::create_pool(&config.database)?;

    let ingest_config = IngestConfig::from_env()?;
    let scheduler = ingest::build_scheduler(
        &ingest_config,
        &ingest_config.datasets,
        Arc::new(PgSink::new(db_pool.clone())),
    )?;

    let _timer = if ingest_config.enabled {
        info!(interval_secs = ingest_config.interval_secs, "Ingestion is enabled, starting timer");
        Some(scheduler.clone().start(ingest_config.interval()))
    } else {
        info!("Ingestion is disabled (INGEST_ENABLED=false)");
        None
    };

    let state = AppState {
        db: db_pool,
        scheduler,
        project_id: Arc::from(config.server.project_id.as_str()),
    };
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

async fn run_once(requested: Vec<String>) -> Result<()> {
    let config = Config::load()?;
    let ingest_config = IngestConfig::from_env()?;
    let ids = if requested.is_empty() {
        ingest_config.datasets.clone()
    } else {
        requested
    };

    let db_pool = db::create_pool(&config.database)?;
    let scheduler =
        ingest::build_scheduler(&ingest_config, &ids, Arc::new(PgSink::new(db_pool)))?;

    let scheduled = scheduler.datasets();
    let unscheduled: Vec<_> = ids
        .iter()
        .filter(|id| !scheduled.contains(&id.as_str()))
        .collect();
    if !unscheduled.is_empty() {
        anyhow::bail!(
            "Cannot run {:?}: reverse geocoding requires GEOCODER_API_KEY",
            unscheduled
        );
    }

    let reports = scheduler.run_all().await;
    let failed: Vec<_> = reports
        .iter()
        .filter(|r| !r.is_success())
        .map(RunReport::dataset)
        .collect();

    for report in &reports {
        match report {
            RunReport::Completed(outcome) => info!(
                dataset = outcome.dataset,
                fetched = outcome.records_fetched,
                loaded = outcome.records_loaded,
                rejected = outcome.rejections.total(),
                ok = outcome.is_success(),
                "Run finished"
            ),
            RunReport::Skipped { dataset, reason } => warn!(dataset, reason = %reason, "Run skipped"),
            RunReport::Panicked { dataset, message } => error!(dataset, error = %message, "Run panicked"),
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Ingestion failed for {:?}", failed);
    }

    Ok(())
}

fn list_datasets() {
    for schema in datasets::all() {
        let resources: Vec<_> = schema.sources.iter().map(|s| s.resource).collect();
        info!(
            dataset = schema.id,
            table = schema.table,
            sources = ?resources,
            natural_key = ?schema.natural_key,
            geocoded = !schema.enrichments.is_empty(),
            "Registered dataset"
        );
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
