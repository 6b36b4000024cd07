//! FTP capability seam.
//!
//! The transfer controller only talks to `FtpConnector`/`FtpSession`. The
//! production implementation lives in `client.rs` and wraps `suppaftp`; tests
//! plug in an in-memory server instead.

mod client;

pub use client::SuppaFtpConnector;

use crate::error::TransferError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use url::Url;

pub const DEFAULT_FTP_PORT: u16 = 21;

/// Username/password handed to the server on login
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous", "anonymous@")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Host and control port of an FTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpEndpoint {
    pub host: String,
    pub port: u16,
}

impl FtpEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port` or `ftp://host[:port]`, ignoring any path
    pub fn parse(address: &str) -> Result<Self, TransferError> {
        RemoteLocation::parse(address).map(|location| location.endpoint)
    }

    /// `host:port` form accepted by `ToSocketAddrs`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for FtpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ftp://{}:{}", self.host, self.port)
    }
}

/// A server plus a directory on it, e.g. `ftp://cams.local:2121/incoming`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub endpoint: FtpEndpoint,
    /// Directory relative to the login directory; empty for the login directory
    pub directory: String,
}

impl RemoteLocation {
    pub fn parse(address: &str) -> Result<Self, TransferError> {
        let trimmed = address.trim();
        let without_scheme = match trimmed.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("ftp") => rest,
            Some((scheme, _)) => {
                return Err(TransferError::Validation(format!(
                    "Unsupported scheme '{}' in address '{}'",
                    scheme, address
                )))
            }
            None => trimmed,
        };

        // Split authority and path on the raw string so the path keeps its
        // original spelling (no percent-encoding round trip).
        let (authority, directory) = match without_scheme.split_once('/') {
            Some((authority, path)) => (authority, path.trim_matches('/')),
            None => (without_scheme, ""),
        };

        if authority.is_empty() {
            return Err(TransferError::Validation(format!(
                "Missing host in address '{}'",
                address
            )));
        }

        let url = Url::parse(&format!("ftp://{}", authority)).map_err(|e| {
            TransferError::Validation(format!("Invalid FTP address '{}': {}", address, e))
        })?;

        let host = url
            .host_str()
            .ok_or_else(|| TransferError::Validation(format!("Missing host in address '{}'", address)))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(DEFAULT_FTP_PORT);

        Ok(Self {
            endpoint: FtpEndpoint { host, port },
            directory: directory.to_string(),
        })
    }
}

/// Opens authenticated, binary-mode sessions against a server
pub trait FtpConnector: Send + Sync {
    fn connect(
        &self,
        endpoint: &FtpEndpoint,
        credential: &Credential,
    ) -> Result<Box<dyn FtpSession>, TransferError>;
}

/// One control connection. Every transfer opens its own session and quits it.
pub trait FtpSession: Send {
    /// STOR: returns the data stream the caller writes chunks into
    fn start_upload(&mut self, remote_path: &str) -> Result<Box<dyn Write + Send>, TransferError>;

    /// Closes the data stream and reads the server's transfer-complete reply
    fn finish_upload(&mut self, stream: Box<dyn Write + Send>) -> Result<(), TransferError>;

    /// RETR: returns the data stream the caller reads chunks from
    fn start_download(&mut self, remote_path: &str) -> Result<Box<dyn Read + Send>, TransferError>;

    fn finish_download(&mut self, stream: Box<dyn Read + Send>) -> Result<(), TransferError>;

    fn quit(&mut self) -> Result<(), TransferError>;
}
