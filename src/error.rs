use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// ftp-relay errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// Local filesystem errors (open, read, write, lock)
    #[error("Local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// Could not reach or log in to the FTP server
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server answered with an unexpected reply
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Validation errors (path, file name, options)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A watched file never became exclusively openable
    #[error("File still locked after {attempts} attempts: {}", .path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Filesystem watch errors
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification carried in failure events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LocalIo,
    Connection,
    Protocol,
    Validation,
    LockTimeout,
    Cancelled,
    Watch,
    Config,
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::LocalIo(_) => ErrorKind::LocalIo,
            TransferError::Connection(_) => ErrorKind::Connection,
            TransferError::Protocol(_) => ErrorKind::Protocol,
            TransferError::Validation(_) => ErrorKind::Validation,
            TransferError::LockTimeout { .. } => ErrorKind::LockTimeout,
            TransferError::Cancelled => ErrorKind::Cancelled,
            TransferError::Watch(_) => ErrorKind::Watch,
            TransferError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Control-channel and data-channel socket failures are connection errors;
/// anything the server said that we did not expect is a protocol error.
impl From<suppaftp::FtpError> for TransferError {
    fn from(err: suppaftp::FtpError) -> Self {
        use suppaftp::FtpError;
        match err {
            FtpError::ConnectionError(e) => TransferError::Connection(e.to_string()),
            FtpError::InvalidAddress(e) => TransferError::Connection(e.to_string()),
            other => TransferError::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::Config(err.to_string())
    }
}

impl From<TransferError> for String {
    fn from(err: TransferError) -> String {
        err.to_string()
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> Result<T, TransferError>;
}

impl<T, E: Into<TransferError>> ErrorContext<T> for Result<T, E> {
    fn context(self, msg: &str) -> Result<T, TransferError> {
        self.map_err(|e| {
            let err: TransferError = e.into();
            match err {
                TransferError::LocalIo(e) => {
                    TransferError::LocalIo(std::io::Error::new(e.kind(), format!("{}: {}", msg, e)))
                }
                TransferError::Connection(s) => TransferError::Connection(format!("{}: {}", msg, s)),
                TransferError::Protocol(s) => TransferError::Protocol(format!("{}: {}", msg, s)),
                TransferError::Validation(s) => TransferError::Validation(format!("{}: {}", msg, s)),
                TransferError::Config(s) => TransferError::Config(format!("{}: {}", msg, s)),
                other => other,
            }
        })
    }
}
