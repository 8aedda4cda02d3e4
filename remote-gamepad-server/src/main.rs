mod axis_mapper;
mod config;
mod error;
mod server;
mod transport;
mod virtual_device;

use crate::axis_mapper::AxisMapper;
use crate::config::{ServerConfig, Transport};
use crate::error::ServerError;
use crate::server::Server;
use crate::transport::Listener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: ServerConfig) -> anyhow::Result<()> {
    match config.transport {
        Transport::Tcp => {
            info!(
                "Starting remote-gamepad server on {}",
                config.listen_address
            );
            let listener = transport::bind_tcp(config.listen_address).await?;
            serve(listener, config).await
        }
        #[cfg(target_os = "linux")]
        Transport::Rfcomm => {
            info!(
                "Starting remote-gamepad server on RFCOMM channel {}",
                config.rfcomm_channel
            );
            let listener = transport::bind_rfcomm(config.rfcomm_channel).await?;
            serve(listener, config).await
        }
        #[cfg(not(target_os = "linux"))]
        Transport::Rfcomm => anyhow::bail!("the rfcomm transport is only available on Linux"),
    }
}

async fn serve(listener: impl Listener, config: ServerConfig) -> anyhow::Result<()> {
    let device = virtual_device::new_device(&config.device)
        .await
        .map_err(ServerError::SinkInit)?;
    info!("Created virtual device \"{}\"", config.device.name);

    let shutdown = CancellationToken::new();
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

    Server::new(listener, device, AxisMapper::new(config.axes))
        .run(shutdown)
        .await
}
