use super::{read_chunk, TransferController, TransferSummary};
use crate::error::{ErrorContext, TransferError};
use crate::events::{TransferDirection, TransferEventPayload};
use crate::validation::{base_name, join_remote_path, validate_local_file, validate_remote_directory};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

impl TransferController {
    /// Upload `local_path` into `remote_directory` on the configured server
    ///
    /// The remote name is the local base name. Progress is published after
    /// every chunk with the bytes actually written so far; the declared total
    /// is the file size when the upload starts, and no more than that many
    /// bytes are sent even if the file keeps growing.
    pub fn upload_file(
        &self,
        local_path: &Path,
        remote_directory: &str,
        cancel: &CancellationToken,
    ) -> Result<TransferSummary, TransferError> {
        let transfer_id = Uuid::new_v4();
        let file_name = base_name(local_path).unwrap_or_else(|_| local_path.display().to_string());

        let result = self.run_upload(transfer_id, &file_name, local_path, remote_directory, cancel);
        self.finish(transfer_id, TransferDirection::Upload, &file_name, result)
    }

    fn run_upload(
        &self,
        transfer_id: Uuid,
        file_name: &str,
        local_path: &Path,
        remote_directory: &str,
        cancel: &CancellationToken,
    ) -> Result<TransferSummary, TransferError> {
        validate_remote_directory(remote_directory)?;
        let (path, total_bytes) = validate_local_file(local_path)?;
        let file = File::open(&path).context("Failed to open source file")?;
        let remote_path = join_remote_path(remote_directory, file_name);

        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        self.publish(
            transfer_id,
            TransferDirection::Upload,
            file_name,
            TransferEventPayload::Connecting {
                remote_path: remote_path.clone(),
            },
        );

        let mut session = self.connector.connect(&self.endpoint, &self.credential)?;
        let mut stream = session.start_upload(&remote_path)?;
        debug!(transfer_id = %transfer_id, remote_path = %remote_path, total_bytes, "Upload stream open");

        let mut source = file.take(total_bytes);
        let mut buffer = vec![0u8; self.options.chunk_size];
        let mut completed_bytes = 0u64;
        let mut chunks = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let read = read_chunk(&mut source, &mut buffer).context("Failed to read source file")?;
            if read == 0 {
                break;
            }

            stream.write_all(&buffer[..read]).map_err(|e| {
                TransferError::Connection(format!("Data stream write failed: {}", e))
            })?;
            completed_bytes += read as u64;
            chunks += 1;

            self.publish(
                transfer_id,
                TransferDirection::Upload,
                file_name,
                TransferEventPayload::Progress {
                    total_bytes,
                    completed_bytes,
                },
            );
        }

        session.finish_upload(stream)?;
        if let Err(e) = session.quit() {
            warn!(transfer_id = %transfer_id, "QUIT after upload failed: {}", e);
        }

        Ok(TransferSummary {
            transfer_id,
            file_name: file_name.to_string(),
            remote_path,
            bytes_transferred: completed_bytes,
            chunks,
        })
    }
}
