use super::{EventBus, TransferEvent, TransferEventPayload};
use crate::shutdown::ShutdownCoordinator;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handler that mirrors transfer events into the log
pub struct LoggingEventHandler {
    event_bus: EventBus,
    shutdown: ShutdownCoordinator,
}

impl LoggingEventHandler {
    pub fn new(event_bus: EventBus, shutdown: ShutdownCoordinator) -> Self {
        Self {
            event_bus,
            shutdown,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        // Subscribe before spawning so no event published after start() is missed
        let mut rx = self.event_bus.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => Self::handle_event(&event),
                            Err(broadcast::error::RecvError::Closed) => {
                                info!("Logging handler stopped (event bus closed)");
                                break;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "Logging handler lagged");
                            }
                        }
                    }
                    _ = self.shutdown.cancelled() => {
                        debug!("Logging handler gracefully shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn handle_event(event: &TransferEvent) {
        match &event.payload {
            TransferEventPayload::Connecting { remote_path } => {
                debug!(
                    transfer_id = %event.transfer_id,
                    file_name = %event.file_name,
                    remote_path = %remote_path,
                    direction = ?event.direction,
                    "Connecting"
                );
            }
            TransferEventPayload::Progress {
                total_bytes,
                completed_bytes,
            } => {
                debug!(
                    transfer_id = %event.transfer_id,
                    file_name = %event.file_name,
                    completed_bytes,
                    total_bytes,
                    "Progress"
                );
            }
            TransferEventPayload::Completed { bytes } => {
                info!(
                    transfer_id = %event.transfer_id,
                    file_name = %event.file_name,
                    bytes,
                    direction = ?event.direction,
                    "Transfer completed"
                );
            }
            TransferEventPayload::Failed { kind, message } => {
                warn!(
                    transfer_id = %event.transfer_id,
                    file_name = %event.file_name,
                    kind = ?kind,
                    direction = ?event.direction,
                    "Transfer failed: {}",
                    message
                );
            }
        }
    }
}
