use crate::config::ensure_private_dir;
use crate::error::TransferError;
use std::path::Path;
use std::sync::{LazyLock, Mutex, Once};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const LOG_FILE_NAME: &str = "app.log";

static LOGGER_INITIALIZED: Once = Once::new();

// Keep the guard alive for the lifetime of the program
static FILE_APPENDER_GUARD: LazyLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    LazyLock::new(|| Mutex::new(None));

/// Console plus `<logs_dir>/app.log`, both filtered by `RUST_LOG` (default `info`)
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_logging(logs_dir: &Path) -> Result<(), TransferError> {
    ensure_private_dir(logs_dir)?;

    LOGGER_INITIALIZED.call_once(|| {
        // Console logging - compact format
        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_filter(default_env_filter());

        let file_appender = tracing_appender::rolling::never(logs_dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
            *guard_mutex = Some(guard);
        }

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(default_env_filter());

        // try_init: a host application may already own the global subscriber
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init();
    });

    Ok(())
}

/// Flush buffered file output; call once before the process exits
pub fn flush_logs() {
    if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
        guard_mutex.take();
    }
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
