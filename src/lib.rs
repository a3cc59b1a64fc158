pub mod backend;
pub mod cafe;
pub mod config;
pub mod generator;
pub mod http;
pub mod util;

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use crate::backend::db::Executor;
use crate::cafe::CafeData;
use crate::config::Config;
use crate::util::error;

/// Opens the database, prepares the cafe tables, then generates visits and serves requests until shutdown.
pub async fn run(config: Config) -> Result<(), error::Error> {
    // A database that cannot be opened is fatal
    let executor = Arc::new(Executor::open(config.storage, &config.db_path)?);
    let cafe_data = Arc::new(CafeData::setup(executor, config.cafe_count, &config.cafe_prefix)?);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let generator = cafe_data.generator(config.generator, config.start_date)?;
    let generator_task = tokio::spawn(generator::run_generator(generator, config.initial_delay, config.interval, shutdown_rx.clone()));

    http::serve(listener, cafe_data, shutdown_rx).await?;

    match generator_task.await? {
        Ok(generator) => {
            info!(generated = generator.state().generation_counter, "data generator stopped");
        },
        Err(e) => {
            warn!(error = %e, "data generator ended early");
        }
    }
    info!("shutdown complete");
    return Ok(());
}

/// Sets the shutdown flag when SIGINT or SIGTERM arrives.
/// The flag is state, so loops that start watching it after the signal still stop.
fn spawn_signal_handler(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT, shutting down");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, shutting down");
                        }
                    }
                }
                Err(e) => {
                    warn!("failed to register SIGTERM handler: {e}, falling back to SIGINT only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received shutdown signal, shutting down");
        }

        shutdown.send_replace(true);
    });
}
