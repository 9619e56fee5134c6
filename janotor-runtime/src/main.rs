use std::{env, process, sync::Arc};

use anyhow::Context;
use janotor::{config::Config, main_loop::reconcile_loop, reconcile::Reconciler};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let run_once = env::args().skip(1).any(|a| a == "--once");

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!("Error: {}", e);
            process::exit(1);
        }
    };

    let reconciler = Arc::new(Reconciler::from_config(Arc::clone(&config))?);

    tracing::info!(
        "Syncing {} (page size {}, at most {} pages) into {}",
        config.source_url(),
        config.page_size,
        config.max_pages,
        config.ledger_url
    );

    if run_once {
        return match reconciler.run_pass().await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!("[reconcile] Error: {}", e);
                process::exit(1);
            }
        };
    }

    tracing::info!(
        "Starting donation fetcher, will run every {} seconds",
        config.poll_interval.as_secs_f64()
    );

    tokio::select! {
        _ = reconcile_loop(reconciler, config.poll_interval) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for ctrl-c")?;
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }

    Ok(())
}
