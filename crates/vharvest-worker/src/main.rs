//! Command-line driver for a harvest batch.
//!
//! ```text
//! vharvest-worker run <table.csv>   process a table, Ctrl-C stops cleanly
//! vharvest-worker retry             reprocess failed rows from the ledger
//! vharvest-worker stop              raise the stop flag for a running batch
//! vharvest-worker reset             clear the flag and the work directory
//! ```

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vharvest_worker::{parse_link_table, ControlFlag, HarvestConfig, HarvestService, RetryStart};

const USAGE: &str = "usage: vharvest-worker <run <table.csv> | retry | stop | reset>";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = HarvestConfig::from_env();
    info!("Harvest config: {:?}", config);

    let code = match args.first().map(String::as_str) {
        Some("run") => match args.get(1) {
            Some(path) => run_table(config, path).await,
            None => usage(),
        },
        Some("retry") => retry(config).await,
        Some("stop") => match ControlFlag::open(&config.stop_marker).signal().await {
            Ok(()) => 0,
            Err(e) => fail("Failed to raise stop flag", e),
        },
        Some("reset") => match build_service(config) {
            Some(service) => match service.reset().await {
                Ok(()) => 0,
                Err(e) => fail("Reset failed", e),
            },
            None => 1,
        },
        _ => usage(),
    };

    std::process::exit(code);
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vharvest=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

fn build_service(config: HarvestConfig) -> Option<HarvestService> {
    match HarvestService::from_env(config) {
        Ok(service) => Some(service),
        Err(e) => {
            error!("Failed to initialise harvester: {}", e);
            None
        }
    }
}

async fn run_table(config: HarvestConfig, path: &str) -> i32 {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => return fail("Failed to read input table", e),
    };
    let rows = match parse_link_table(&text) {
        Ok(rows) => rows,
        Err(e) => return fail("Invalid input table", e),
    };
    let Some(service) = build_service(config) else {
        return 1;
    };

    if let Err(e) = service.start(rows).await {
        return fail("Failed to start batch", e);
    }
    supervise(&service).await
}

async fn retry(config: HarvestConfig) -> i32 {
    let Some(service) = build_service(config) else {
        return 1;
    };
    match service.retry().await {
        Ok(RetryStart::NothingToRetry) => {
            info!("Nothing to retry");
            0
        }
        Ok(RetryStart::Started(total)) => {
            info!("Retrying {} rows", total);
            supervise(&service).await
        }
        Err(e) => fail("Failed to start retry", e),
    }
}

/// Wait for the batch, turning Ctrl-C into a cooperative stop.
async fn supervise(service: &HarvestService) -> i32 {
    tokio::select! {
        _ = service.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, stopping after the current step");
            if let Err(e) = service.signal_stop().await {
                error!("Failed to raise stop flag: {}", e);
            }
            service.wait().await;
        }
    }

    let snapshot = service.poll_progress().await;
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to render progress: {}", e),
    }
    0
}

fn usage() -> i32 {
    eprintln!("{}", USAGE);
    2
}

fn fail(context: &str, e: impl std::fmt::Display) -> i32 {
    error!("{}: {}", context, e);
    1
}
