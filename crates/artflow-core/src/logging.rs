//! Logging configuration
//!
//! Only describes where logs go; the subscriber itself is installed by the
//! binary.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tracing::Level;

/// Log file name prefix
const LOG_PREFIX: &str = "artflow";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Minimum level (trace, debug, info, warn, error)
    pub level: String,
    /// Log to stderr
    pub console_output: bool,
    /// Log to a file in `log_dir`
    pub file_output: bool,
    pub log_dir: PathBuf,
    /// Number of log files to keep, the current one included
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            max_files: 5,
        }
    }
}

impl LogConfig {
    /// Parse the configured level, falling back to INFO
    pub fn parse_level(&self) -> Level {
        self.level.trim().parse().unwrap_or(Level::INFO)
    }

    /// Create the log directory if file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Path of the log file for this run
    pub fn current_log_path(&self) -> PathBuf {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.log_dir.join(format!("{}-{}.log", LOG_PREFIX, stamp))
    }

    /// Delete the oldest log files so that at most `max_files` remain
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_dir.is_dir() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = std::fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(LOG_PREFIX) && n.ends_with(".log"))
            })
            .collect();

        if logs.len() <= self.max_files {
            return Ok(0);
        }

        // Timestamped names sort chronologically
        logs.sort();
        let excess = logs.len() - self.max_files;
        for path in &logs[..excess] {
            std::fs::remove_file(path)?;
        }
        Ok(excess)
    }
}
