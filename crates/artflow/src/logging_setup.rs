use anyhow::{Context, Result};
use artflow_core::LogConfig;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the log file writer running until dropped
pub struct LogGuard {
    _worker: WorkerGuard,
    path: PathBuf,
}

impl LogGuard {
    /// File this run logs to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Install the global subscriber for the daemon.
///
/// Console output goes to stderr. With file output enabled, events are
/// also written to a fresh file in `log_dir` through a background writer;
/// the returned guard must outlive the program's last log line.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    let console = config.console_output.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(true)
            .with_filter(level_filter(config))
    });

    let (file, guard) = if config.file_output {
        let (writer, guard) = open_log_file(config)?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(level_filter(config));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    match &guard {
        Some(guard) => tracing::info!(
            "ArtFlow logging at {} (file {:?})",
            config.parse_level(),
            guard.path()
        ),
        None => tracing::info!("ArtFlow logging at {}", config.parse_level()),
    }
    Ok(guard)
}

/// Configured level, unless `RUST_LOG` says otherwise
fn level_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Create this run's log file and prune older ones down to `max_files`
fn open_log_file(config: &LogConfig) -> Result<(NonBlocking, LogGuard)> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Cannot create log directory {:?}", config.log_dir))?;

    let path = config.current_log_path();
    let file = File::create(&path).with_context(|| format!("Cannot open log file {:?}", path))?;

    // Run after creating the new file so it counts towards the limit
    match config.cleanup_old_logs() {
        Ok(0) => {}
        Ok(removed) => eprintln!("Removed {} old log files", removed),
        Err(e) => eprintln!("Warning: cannot prune old log files: {}", e),
    }

    let (writer, worker) = tracing_appender::non_blocking(file);
    Ok((
        writer,
        LogGuard {
            _worker: worker,
            path,
        },
    ))
}
