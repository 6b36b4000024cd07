use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sequence number for ordering events
pub type EventSequence = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// All transfer-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub transfer_id: Uuid,
    pub direction: TransferDirection,
    pub file_name: String,
    pub payload: TransferEventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEventPayload {
    /// Opening the control connection and logging in
    Connecting { remote_path: String },

    /// One chunk written to the server
    Progress {
        total_bytes: u64,
        completed_bytes: u64,
    },

    /// Terminal: transfer finished
    Completed { bytes: u64 },

    /// Terminal: transfer gave up
    Failed { kind: ErrorKind, message: String },
}

impl TransferEvent {
    pub fn payload_type(&self) -> &str {
        match &self.payload {
            TransferEventPayload::Connecting { .. } => "connecting",
            TransferEventPayload::Progress { .. } => "progress",
            TransferEventPayload::Completed { .. } => "completed",
            TransferEventPayload::Failed { .. } => "failed",
        }
    }

    /// Completed and Failed end a transfer; nothing follows them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            TransferEventPayload::Completed { .. } | TransferEventPayload::Failed { .. }
        )
    }
}
