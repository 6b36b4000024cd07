//! FTP upload/download of single files, plus a watch folder that uploads
//! newly created images once their writer has released them.
//!
//! Library exports are shared by the binary and the integration tests.

pub mod config;
pub mod error;
pub mod events;
pub mod ftp;
pub mod logging;
pub mod monitor;
pub mod shutdown;
pub mod transfer;
pub mod validation;

pub use error::{ErrorKind, TransferError};
pub use events::{EventBus, TransferDirection, TransferEvent, TransferEventPayload};
pub use ftp::{Credential, FtpConnector, FtpEndpoint, FtpSession, SuppaFtpConnector};
pub use monitor::{FolderMonitor, LockWaitPolicy, MonitorOptions, WatchTarget};
pub use transfer::{TransferController, TransferOptions, TransferSummary};
