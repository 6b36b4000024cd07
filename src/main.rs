use anyhow::Context;
use ftp_relay::config::{get_logs_dir, load_config};
use ftp_relay::events::{EventBus, LoggingEventHandler};
use ftp_relay::logging::{flush_logs, init_logging};
use ftp_relay::shutdown::ShutdownCoordinator;
use ftp_relay::{SuppaFtpConnector, TransferController};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logs_dir = get_logs_dir()?;
    if let Err(e) = init_logging(&logs_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = run().await;
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    flush_logs();
    result
}

async fn run() -> anyhow::Result<()> {
    let config = load_config().context("Failed to load ~/.ftp-relay/config.json")?;
    let watch_folder = config
        .watch_folder_path()
        .context("watchFolder is not set in the config file")?;

    let event_bus = EventBus::new(config.event_capacity);
    let shutdown = ShutdownCoordinator::new();
    let handler = LoggingEventHandler::new(event_bus.clone(), shutdown.clone()).start();

    let controller = Arc::new(TransferController::new(
        config.endpoint()?,
        config.credential(),
        Arc::new(SuppaFtpConnector),
        event_bus,
        config.transfer_options(),
    )?);
    info!(server = %controller.endpoint(), "ftp-relay started");

    let monitor = controller
        .monitor_folder(
            &watch_folder,
            &config.remote_directory,
            config.monitor_options(),
            shutdown.child_token(),
        )
        .with_context(|| format!("Failed to watch {}", watch_folder.display()))?;

    shutdown.wait_for_signal().await;

    // Joining the worker blocks until any in-flight chunk finishes
    tokio::task::spawn_blocking(move || monitor.stop())
        .await
        .context("Folder monitor shutdown panicked")?;
    handler.await.context("Event handler panicked")?;

    info!("ftp-relay stopped");
    Ok(())
}
