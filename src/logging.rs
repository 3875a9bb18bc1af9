use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "keyglow.log";

/// Directory the log file is written to
pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("keyglow")
}

/// Initialise logging to a file, since the overlay owns the terminal.
/// The level is `info`, or `debug` when asked for, in which case `RUST_LOG`
/// may override it. Keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init(debug: bool) -> Option<WorkerGuard> {
    let dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("keyglow: logging disabled, cannot create {}: {}", dir.display(), e);
        return None;
    }

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, LOG_FILE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    Some(guard)
}
