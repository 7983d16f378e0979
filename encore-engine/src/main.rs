//! Encore engine - main entry point
//!
//! Standalone harness for the progression engine: spawns one global sweep
//! per active owner plus the periodic ticket-demand sweep, and keeps the
//! owner set fresh as gigs start and finish. Focused loops are spawned by
//! whatever front end is watching a gig; this binary only provides the
//! unattended cadences.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_common::config::{load_engine_config, resolve_database_path};
use encore_common::db::{init_database, queries};
use encore_common::ChangeNotifier;
use encore_engine::tickets::TicketDemandSimulator;
use encore_engine::triggers::global_sweep_loop;
use encore_engine::GigEngine;

/// Command-line arguments for encore-engine
#[derive(Parser, Debug)]
#[command(name = "encore-engine")]
#[command(about = "Live performance progression and ticket demand engine")]
#[command(version)]
struct Args {
    /// Path to the SQLite database
    #[arg(short, long, env = "ENCORE_DATABASE")]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_engine=debug,encore_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let db_path = resolve_database_path(args.database.as_deref(), "ENCORE_DATABASE")
        .context("Failed to resolve database path")?;
    let config = load_engine_config().context("Failed to load engine config")?;

    info!("Starting Encore engine");
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let notifier = ChangeNotifier::new();
    let engine = Arc::new(GigEngine::new(pool.clone(), notifier.clone()));
    let simulator = TicketDemandSimulator::new(pool.clone(), notifier.clone());

    let (stop_tx, stop_rx) = watch::channel(false);

    // Ticket demand: one sweep per simulated day
    let ticket_interval = Duration::from_secs(config.ticket_sweep_interval_secs);
    let mut ticket_stop = stop_rx.clone();
    let ticket_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(ticket_interval) => {
                    if let Err(e) = simulator.run_daily_sweep().await {
                        error!(error = %e, "ticket demand sweep failed");
                    }
                }
                changed = ticket_stop.changed() => {
                    if changed.is_err() || *ticket_stop.borrow() {
                        break;
                    }
                }
            }
        }
    });

    // Global sweeps: one loop per owner with live gigs, refreshed every
    // sweep interval as owners come and go
    let sweep_engine = engine.clone();
    let sweep_config = config.clone();
    let mut sweep_stop = stop_rx.clone();
    let sweep_task = tokio::spawn(async move {
        let mut running: HashMap<uuid::Uuid, tokio::task::JoinHandle<()>> = HashMap::new();
        loop {
            match queries::list_active_owners(sweep_engine.pool()).await {
                Ok(owners) => {
                    running.retain(|_, handle| !handle.is_finished());
                    for owner_id in owners {
                        running.entry(owner_id).or_insert_with(|| {
                            tokio::spawn(global_sweep_loop(
                                sweep_engine.clone(),
                                owner_id,
                                sweep_config.clone(),
                                sweep_stop.clone(),
                            ))
                        });
                    }
                }
                Err(e) => error!(error = %e, "failed to list active owners"),
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sweep_config.sweep_interval_secs)) => {}
                changed = sweep_stop.changed() => {
                    if changed.is_err() || *sweep_stop.borrow() {
                        break;
                    }
                }
            }
        }
    });

    shutdown_signal().await;
    info!("Shutting down");
    let _ = stop_tx.send(true);
    let _ = sweep_task.await;
    let _ = ticket_task.await;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
