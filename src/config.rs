use crate::error::TransferError;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::ftp::{Credential, FtpEndpoint};
use crate::monitor::{
    LockWaitPolicy, MonitorOptions, DEFAULT_LOCK_MAX_ATTEMPTS, DEFAULT_LOCK_POLL_INTERVAL,
    DEFAULT_WATCH_PATTERN,
};
use crate::transfer::{TransferOptions, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// `host`, `host:port` or `ftp://host[:port]`
    pub server: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Default upload destination; "" is the login directory
    #[serde(default)]
    pub remote_directory: String,
    /// Folder to auto-upload from; `~` is expanded
    #[serde(default)]
    pub watch_folder: Option<String>,
    #[serde(default = "default_watch_pattern")]
    pub watch_pattern: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,
    #[serde(default = "default_lock_max_attempts")]
    pub lock_max_attempts: u32,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_username() -> String {
    "anonymous".to_string()
}

fn default_watch_pattern() -> String {
    DEFAULT_WATCH_PATTERN.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_lock_poll_interval_ms() -> u64 {
    DEFAULT_LOCK_POLL_INTERVAL.as_millis() as u64
}

fn default_lock_max_attempts() -> u32 {
    DEFAULT_LOCK_MAX_ATTEMPTS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl RelayConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            username: default_username(),
            password: String::new(),
            remote_directory: String::new(),
            watch_folder: None,
            watch_pattern: default_watch_pattern(),
            chunk_size: default_chunk_size(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            lock_max_attempts: default_lock_max_attempts(),
            event_capacity: default_event_capacity(),
        }
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.server.trim().is_empty() {
            return Err(TransferError::Config("server must not be empty".to_string()));
        }
        self.endpoint()?;
        if self.chunk_size == 0 {
            return Err(TransferError::Config("chunkSize must be greater than zero".to_string()));
        }
        if self.lock_max_attempts == 0 {
            return Err(TransferError::Config(
                "lockMaxAttempts must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(TransferError::Config(
                "eventCapacity must be greater than zero".to_string(),
            ));
        }
        crate::validation::validate_remote_directory(&self.remote_directory)
            .map_err(|e| TransferError::Config(e.to_string()))?;
        crate::monitor::FileFilter::new(&self.watch_pattern)
            .map_err(|e| TransferError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn endpoint(&self) -> Result<FtpEndpoint, TransferError> {
        FtpEndpoint::parse(&self.server).map_err(|e| TransferError::Config(e.to_string()))
    }

    pub fn credential(&self) -> Credential {
        Credential::new(&self.username, &self.password)
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            chunk_size: self.chunk_size,
        }
    }

    pub fn lock_wait_policy(&self) -> LockWaitPolicy {
        LockWaitPolicy::new(
            Duration::from_millis(self.lock_poll_interval_ms),
            self.lock_max_attempts,
        )
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            pattern: self.watch_pattern.clone(),
            lock_wait: self.lock_wait_policy(),
        }
    }

    /// Watch folder with `~` expanded
    pub fn watch_folder_path(&self) -> Option<PathBuf> {
        self.watch_folder
            .as_deref()
            .map(|folder| PathBuf::from(shellexpand::tilde(folder).as_ref()))
    }
}

pub fn get_config_dir() -> Result<PathBuf, TransferError> {
    dirs::home_dir()
        .map(|home_dir| home_dir.join(".ftp-relay"))
        .ok_or_else(|| TransferError::Config("Could not find home directory".to_string()))
}

pub fn get_config_file_path() -> Result<PathBuf, TransferError> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf, TransferError> {
    Ok(get_config_dir()?.join("logs"))
}

/// Create `dir` if needed, owner-only on Unix
pub fn ensure_private_dir(dir: &Path) -> Result<(), TransferError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn ensure_config_dir() -> Result<(), TransferError> {
    ensure_private_dir(&get_config_dir()?)
}

/// Load `~/.ftp-relay/config.json`
pub fn load_config() -> Result<RelayConfig, TransferError> {
    ensure_config_dir()?;
    load_config_from(&get_config_file_path()?)
}

pub fn load_config_from(path: &Path) -> Result<RelayConfig, TransferError> {
    if !path.exists() {
        return Err(TransferError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)?;
    let config: RelayConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &RelayConfig) -> Result<(), TransferError> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}
