//! Transfer controller: chunked upload and download against an FTP capability.
//!
//! Every call opens its own control connection, streams the file in fixed-size
//! chunks and reports through the event bus. Per transfer the bus sees
//! `Connecting`, zero or more `Progress`, then exactly one `Completed` or
//! `Failed`. Errors come back as values; the controller keeps no mutable state
//! between calls, so one instance can be shared across threads.

mod download;
mod upload;

use crate::error::TransferError;
use crate::events::{EventBus, TransferDirection, TransferEventPayload};
use crate::ftp::{Credential, FtpConnector, FtpEndpoint};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Bytes moved per read/write round
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub chunk_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What a successful transfer moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub transfer_id: Uuid,
    pub file_name: String,
    pub remote_path: String,
    pub bytes_transferred: u64,
    pub chunks: u64,
}

pub struct TransferController {
    endpoint: FtpEndpoint,
    credential: Credential,
    connector: Arc<dyn FtpConnector>,
    events: EventBus,
    options: TransferOptions,
}

impl std::fmt::Debug for TransferController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferController")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential)
            .field("connector", &"<connector>")
            .field("options", &self.options)
            .finish()
    }
}

impl TransferController {
    pub fn new(
        endpoint: FtpEndpoint,
        credential: Credential,
        connector: Arc<dyn FtpConnector>,
        events: EventBus,
        options: TransferOptions,
    ) -> Result<Self, TransferError> {
        if options.chunk_size == 0 {
            return Err(TransferError::Validation(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            credential,
            connector,
            events,
            options,
        })
    }

    pub fn endpoint(&self) -> &FtpEndpoint {
        &self.endpoint
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn publish(
        &self,
        transfer_id: Uuid,
        direction: TransferDirection,
        file_name: &str,
        payload: TransferEventPayload,
    ) {
        self.events.publish(transfer_id, direction, file_name, payload);
    }

    /// Publishes the terminal event for a transfer and passes the result through
    fn finish(
        &self,
        transfer_id: Uuid,
        direction: TransferDirection,
        file_name: &str,
        result: Result<TransferSummary, TransferError>,
    ) -> Result<TransferSummary, TransferError> {
        match &result {
            Ok(summary) => {
                info!(
                    transfer_id = %transfer_id,
                    file_name = %file_name,
                    remote_path = %summary.remote_path,
                    bytes = summary.bytes_transferred,
                    "{:?} finished",
                    direction
                );
                self.publish(
                    transfer_id,
                    direction,
                    file_name,
                    TransferEventPayload::Completed {
                        bytes: summary.bytes_transferred,
                    },
                );
            }
            Err(e) => {
                warn!(
                    transfer_id = %transfer_id,
                    file_name = %file_name,
                    kind = ?e.kind(),
                    "{:?} failed: {}",
                    direction,
                    e
                );
                self.publish(
                    transfer_id,
                    direction,
                    file_name,
                    TransferEventPayload::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                );
            }
        }
        result
    }
}

/// Fill `buffer` from `reader`; returns less than `buffer.len()` only at end of stream
fn read_chunk<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
