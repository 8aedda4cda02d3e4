mod config;
mod connection;
mod error;
mod event_source;
mod input_state;
mod sender;

use crate::config::ClientConfig;
use crate::connection::{Backoff, ConnectionManager, ConnectionSlot, TcpConnector};
use crate::input_state::InputStore;
use crate::sender::SenderLoop;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::select;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async_main(config));

    // Tokio's stdin reads on a blocking thread that can't be interrupted
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn async_main(config: ClientConfig) -> anyhow::Result<()> {
    info!(
        "Starting remote-gamepad client, server is {}",
        config.server_address
    );

    let store = InputStore::new(config.keymap()?);
    let slot = Arc::new(ConnectionSlot::new());
    let shutdown = CancellationToken::new();

    let manager = ConnectionManager::new(
        TcpConnector::new(config.server_address.clone()),
        Arc::clone(&slot),
        Backoff::from_config(&config.backoff),
        config.connect_timeout(),
    );
    let sender = SenderLoop::new(
        store.clone(),
        Arc::clone(&slot),
        config.send_period(),
        config.send_timeout(),
    );

    // Spawn tasks and wait for them to complete
    let mut join_set = tokio::task::JoinSet::new();
    join_set.spawn(manager.run(shutdown.clone()));
    join_set.spawn(sender.run(shutdown.clone()));
    join_set.spawn(event_source::run(
        BufReader::new(tokio::io::stdin()),
        store,
        shutdown.clone(),
    ));
    join_set.spawn(report_connections(
        slot.subscribe(),
        config.server_address.clone(),
        shutdown.clone(),
    ));

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                ctrl_c_shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
        }
    });

    while let Some(join_result) = join_set.join_next().await {
        if let Err(e) = join_result {
            error!("A task failed: {e}");
            shutdown.cancel();
        }
    }

    info!("Client exiting");
    Ok(())
}

/// The only connection news the user sees: each time a link comes up.
async fn report_connections(
    mut status: watch::Receiver<bool>,
    address: String,
    shutdown: CancellationToken,
) {
    loop {
        select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        if *status.borrow_and_update() {
            info!("Connected to {address}");
        }
    }
}
