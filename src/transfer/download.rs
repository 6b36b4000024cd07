use super::{read_chunk, TransferController, TransferSummary};
use crate::error::{ErrorContext, TransferError};
use crate::events::{TransferDirection, TransferEventPayload};
use crate::ftp::{Credential, RemoteLocation};
use crate::validation::{join_remote_path, validate_file_name};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

impl TransferController {
    /// Download `file_name` from `remote_address` into `local_directory`
    ///
    /// `remote_address` is `host[:port][/directory]`, optionally prefixed with
    /// `ftp://`, and is independent of the controller's own server, as is
    /// `credential`. Data is written to a temp file in `local_directory` once
    /// the server has accepted RETR; it replaces `file_name` only when the
    /// whole file arrived, so a failure leaves any existing file untouched.
    pub fn download_file(
        &self,
        local_directory: &Path,
        file_name: &str,
        remote_address: &str,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<TransferSummary, TransferError> {
        let transfer_id = Uuid::new_v4();
        let result = self.run_download(
            transfer_id,
            local_directory,
            file_name,
            remote_address,
            credential,
            cancel,
        );
        self.finish(transfer_id, TransferDirection::Download, file_name, result)
    }

    fn run_download(
        &self,
        transfer_id: Uuid,
        local_directory: &Path,
        file_name: &str,
        remote_address: &str,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<TransferSummary, TransferError> {
        validate_file_name(file_name)?;
        if !local_directory.is_dir() {
            return Err(TransferError::Validation(format!(
                "Local directory does not exist: {}",
                local_directory.display()
            )));
        }

        let location = RemoteLocation::parse(remote_address)?;
        let remote_path = join_remote_path(&location.directory, file_name);

        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        self.publish(
            transfer_id,
            TransferDirection::Download,
            file_name,
            TransferEventPayload::Connecting {
                remote_path: remote_path.clone(),
            },
        );

        let mut session = self.connector.connect(&location.endpoint, credential)?;
        let mut stream = session.start_download(&remote_path)?;

        let local_path = local_directory.join(file_name);
        let mut target = PartialFile::create(&local_path)?;
        debug!(transfer_id = %transfer_id, local_path = %local_path.display(), "Download stream open");

        let mut buffer = vec![0u8; self.options.chunk_size];
        let mut bytes = 0u64;
        let mut chunks = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let read = read_chunk(&mut stream, &mut buffer).map_err(|e| {
                TransferError::Connection(format!("Data stream read failed: {}", e))
            })?;
            if read == 0 {
                break;
            }

            target
                .write_all(&buffer[..read])
                .context("Failed to write local file")?;
            bytes += read as u64;
            chunks += 1;
        }

        session.finish_download(stream)?;
        target.commit()?;
        if let Err(e) = session.quit() {
            warn!(transfer_id = %transfer_id, "QUIT after download failed: {}", e);
        }

        Ok(TransferSummary {
            transfer_id,
            file_name: file_name.to_string(),
            remote_path,
            bytes_transferred: bytes,
            chunks,
        })
    }
}

/// Download target written next to the final path and moved into place on
/// commit; dropping it uncommitted deletes only the temp file
struct PartialFile {
    path: PathBuf,
    temp: NamedTempFile,
}

impl PartialFile {
    fn create(path: &Path) -> Result<Self, TransferError> {
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".ftp-relay-")
            .suffix(".part")
            .tempfile_in(directory)
            .context("Failed to create local file")?;
        Ok(Self {
            path: path.to_path_buf(),
            temp,
        })
    }

    fn commit(self) -> Result<(), TransferError> {
        self.temp
            .as_file()
            .sync_all()
            .context("Failed to flush local file")?;
        self.temp
            .persist(&self.path)
            .map_err(|e| e.error)
            .context("Failed to move download into place")?;
        Ok(())
    }
}

impl Write for PartialFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}
