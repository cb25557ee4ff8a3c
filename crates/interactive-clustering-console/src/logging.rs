use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};

/// Where log events may go without disturbing the program's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// The terminal belongs to the dashboard: log to the configured file or nowhere.
    FileOnly,
}

/// `RUST_LOG` wins over the configured level.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(f) => Ok(f),
        Err(_) => EnvFilter::try_new(level.trim())
            .map_err(|e| Error::config(format!("invalid log level '{level}': {e}"))),
    }
}

pub fn init(cfg: &LoggingConfig, target: LogTarget) -> Result<()> {
    let filter = env_filter(&cfg.level)?;

    let installed = match (cfg.file.as_deref(), target) {
        (Some(path), _) => {
            let file = open_log_file(path)?;
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            match cfg.format {
                LogFormat::Pretty => builder.try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
        (None, LogTarget::Stderr) => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            match cfg.format {
                LogFormat::Pretty => builder.try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
        (None, LogTarget::FileOnly) => return Ok(()),
    };
    installed.map_err(|e| Error::msg(format!("failed to install log subscriber: {e}")))
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::config(format!(
                "failed to create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::config(format!("failed to open log file {}: {e}", path.display())))
}
