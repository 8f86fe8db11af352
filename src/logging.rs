// Logging module - tracing subscriber initialization
//
// Output goes to stdout; file logging is opt-in and writes JSON lines
// through a non-blocking writer with configurable rotation. The returned
// guard must be kept alive for the duration of the program so buffered
// logs flush on exit.
//
// Filter precedence: RUST_LOG env var > config file > default "info".
// The embedded backend module gets its own level directive so a quiet
// backend does not silence the gateway (or vice versa).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogRotation};

/// Initialize the global tracing subscriber from config.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    let default_filter = format!(
        "memgate={},memgate::backend={},tower_http=debug,axum=debug",
        config.logging.level, config.backend.log_level
    );

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    if !config.logging.file_enabled {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return None;
    }

    // Create log directory if it doesn't exist
    if let Err(e) = std::fs::create_dir_all(&config.logging.file_dir) {
        eprintln!(
            "Warning: Could not create log directory {:?}: {}",
            config.logging.file_dir, e
        );
        // Fall back to stdout-only logging
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return None;
    }

    // Create rolling file appender based on configured rotation
    let file_appender = match config.logging.file_rotation {
        LogRotation::Hourly => tracing_appender::rolling::hourly(
            &config.logging.file_dir,
            &config.logging.file_prefix,
        ),
        LogRotation::Daily => tracing_appender::rolling::daily(
            &config.logging.file_dir,
            &config.logging.file_prefix,
        ),
        LogRotation::Never => tracing_appender::rolling::never(
            &config.logging.file_dir,
            &config.logging.file_prefix,
        ),
    };

    // Wrap in non-blocking writer (writes happen in a background thread).
    // File layer uses JSON format for structured log parsing.
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    Some(guard)
}
