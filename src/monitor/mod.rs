//! Watch-folder auto-upload.
//!
//! A `FolderMonitor` owns a non-recursive `notify` watcher on one directory
//! and a single worker thread. Created files whose name matches the watch
//! pattern are waited on until their writer lets go, then uploaded to the
//! monitor's destination. The worker handles one file at a time, so uploads
//! triggered by the monitor never overlap.

mod lock_wait;

pub use lock_wait::{
    probe_exclusive, LockWaitPolicy, DEFAULT_LOCK_MAX_ATTEMPTS, DEFAULT_LOCK_POLL_INTERVAL,
};

use crate::error::TransferError;
use crate::events::{TransferDirection, TransferEventPayload};
use crate::transfer::TransferController;
use ignore::overrides::{Override, OverrideBuilder};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

pub const DEFAULT_WATCH_PATTERN: &str = "*.jpg";

/// How often the worker wakes up to check for cancellation
const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Fallback poll interval for platforms where `notify` polls
const FILE_WATCH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Folder being watched and where its files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub folder_path: PathBuf,
    pub destination_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Glob matched case-insensitively against the file name
    pub pattern: String,
    pub lock_wait: LockWaitPolicy,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_WATCH_PATTERN.to_string(),
            lock_wait: LockWaitPolicy::default(),
        }
    }
}

/// File-name filter for the watch pattern
#[derive(Debug, Clone)]
pub struct FileFilter {
    matcher: Override,
}

impl FileFilter {
    pub fn new(pattern: &str) -> Result<Self, TransferError> {
        let invalid =
            |e: ignore::Error| TransferError::Validation(format!("Invalid watch pattern '{}': {}", pattern, e));

        // Matched against bare file names, so the root is irrelevant
        let mut builder = OverrideBuilder::new("");
        builder.case_insensitive(true).map_err(invalid)?;
        builder.add(pattern).map_err(invalid)?;
        let matcher = builder.build().map_err(invalid)?;

        Ok(Self { matcher })
    }

    pub fn matches(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => self.matcher.matched(Path::new(name), false).is_whitelist(),
            None => false,
        }
    }
}

impl TransferController {
    /// Start watching `folder_path`; new matching files are uploaded to
    /// `ftp_destination_path`
    ///
    /// Watching stops when the returned monitor is stopped or dropped, or
    /// when `cancel` fires.
    pub fn monitor_folder(
        self: &Arc<Self>,
        folder_path: &Path,
        ftp_destination_path: &str,
        options: MonitorOptions,
        cancel: CancellationToken,
    ) -> Result<FolderMonitor, TransferError> {
        let target = WatchTarget {
            folder_path: folder_path.to_path_buf(),
            destination_path: ftp_destination_path.to_string(),
        };
        FolderMonitor::start(Arc::clone(self), target, options, cancel)
    }
}

#[derive(Debug)]
pub struct FolderMonitor {
    target: WatchTarget,
    cancel: CancellationToken,
    _watcher: RecommendedWatcher,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl FolderMonitor {
    pub fn start(
        controller: Arc<TransferController>,
        target: WatchTarget,
        options: MonitorOptions,
        cancel: CancellationToken,
    ) -> Result<Self, TransferError> {
        crate::validation::validate_remote_directory(&target.destination_path)?;
        if !target.folder_path.is_dir() {
            return Err(TransferError::Validation(format!(
                "Watch folder does not exist: {}",
                target.folder_path.display()
            )));
        }
        let filter = FileFilter::new(&options.pattern)?;
        // Stopping this monitor must not cancel the caller's other work
        let cancel = cancel.child_token();

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            tx,
            Config::default().with_poll_interval(FILE_WATCH_POLL_INTERVAL),
        )?;
        watcher.watch(&target.folder_path, RecursiveMode::NonRecursive)?;

        info!(
            folder = %target.folder_path.display(),
            destination = %target.destination_path,
            pattern = %options.pattern,
            "Watching folder"
        );

        let worker = MonitorWorker {
            controller,
            destination: target.destination_path.clone(),
            filter,
            lock_wait: options.lock_wait,
            cancel: cancel.clone(),
        };
        let thread_handle = thread::Builder::new()
            .name("folder-monitor".to_string())
            .spawn(move || worker.run(rx))?;

        Ok(Self {
            target,
            cancel,
            _watcher: watcher,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop watching and wait for the worker; an upload in progress is
    /// cancelled at its next chunk boundary
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Folder monitor worker panicked");
            }
            info!(folder = %self.target.folder_path.display(), "Stopped watching folder");
        }
    }
}

impl Drop for FolderMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct MonitorWorker {
    controller: Arc<TransferController>,
    destination: String,
    filter: FileFilter,
    lock_wait: LockWaitPolicy,
    cancel: CancellationToken,
}

impl MonitorWorker {
    fn run(self, rx: mpsc::Receiver<notify::Result<Event>>) {
        while !self.cancel.is_cancelled() {
            match rx.recv_timeout(EVENT_POLL_TIMEOUT) {
                Ok(Ok(event)) => self.handle_event(event),
                Ok(Err(e)) => warn!("File watcher error: {:?}", e),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Folder monitor worker exiting");
    }

    fn handle_event(&self, event: Event) {
        match event.kind {
            EventKind::Create(_) => {
                for path in event.paths {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    if self.filter.matches(&path) && !path.is_dir() {
                        self.handle_created(&path);
                    } else {
                        trace!(path = %path.display(), "Ignoring created entry");
                    }
                }
            }
            EventKind::Modify(_) => {
                // Only creations trigger uploads
                trace!(paths = ?event.paths, "Ignoring change notification");
            }
            _ => {}
        }
    }

    fn handle_created(&self, path: &Path) {
        info!(path = %path.display(), "New file detected");

        match self.lock_wait.wait_until_ready(path, &self.cancel) {
            Ok(attempts) => {
                debug!(path = %path.display(), attempts, "File released by writer");
            }
            Err(TransferError::Cancelled) => return,
            Err(e) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                warn!(path = %path.display(), "Skipping upload: {}", e);
                self.controller.events().publish(
                    Uuid::new_v4(),
                    TransferDirection::Upload,
                    &file_name,
                    TransferEventPayload::Failed {
                        kind: e.kind(),
                        message: e.to_string(),
                    },
                );
                return;
            }
        }

        // Failures are logged and published by the controller
        let _ = self
            .controller
            .upload_file(path, &self.destination, &self.cancel);
    }
}
