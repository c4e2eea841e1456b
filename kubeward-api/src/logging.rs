///! Logging setup
///! Console output plus an optional rolling JSON file

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

use crate::config::LoggingConfig;

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "kubeward.log";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must be held for the life of the process or buffered file output is lost.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_ansi(true)
        .with_writer(io::stdout);

    if config.file_logging_enabled {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .json()
            .with_writer(writer);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            "Logging initialized - level: {}, file: {}",
            config.level,
            config.log_dir.display()
        );
        return Ok(Some(guard));
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;

    tracing::info!("Logging initialized - level: {}", config.level);
    Ok(None)
}
