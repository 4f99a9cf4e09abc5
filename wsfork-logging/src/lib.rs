//! Tracing subscriber setup shared by wsfork binaries.
//!
//! Configuration comes from the environment:
//!
//! - `LOG_LEVEL`: default filter when `RUST_LOG` is unset (`info`)
//! - `LOG_FORMAT`: `human` or `json`
//! - `LOG_OUTPUT`: `console`, `file` or `both`
//! - `LOG_FILE_PATH`: file sink, rotated daily (`/tmp/wsfork.log`)

use std::{env, path::Path, path::PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, fmt::writer::MakeWriterExt, prelude::*, registry, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            output: LogOutput::Console,
            file_path: PathBuf::from("/tmp/wsfork.log"),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unknown values fall back to the defaults rather than failing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };
        let output = match lookup("LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => LogOutput::Console,
        };

        Self {
            level: lookup("LOG_LEVEL").unwrap_or(defaults.level),
            format,
            output,
            file_path: lookup("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| LoggingError::Filter(e.to_string()))?,
        };

        Ok(filter
            .add_directive("hyper=warn".parse().map_err(|e| LoggingError::Filter(format!("{e}")))?)
            .add_directive("reqwest=warn".parse().map_err(|e| LoggingError::Filter(format!("{e}")))?))
    }
}

/// Initializes the global tracing subscriber from environment variables.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_subscriber() -> Result<Option<WorkerGuard>, LoggingError> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = settings.env_filter()?;
    let json = settings.format == LogFormat::Json;

    let (file_writer, guard) = match settings.output {
        LogOutput::Console => (None, None),
        LogOutput::File | LogOutput::Both => {
            let dir = settings
                .file_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = settings
                .file_path
                .file_name()
                .unwrap_or_else(|| "wsfork.log".as_ref());
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
    };

    let subscriber = registry().with(filter);

    match (settings.output, file_writer) {
        (LogOutput::Both, Some(file)) => {
            let layer = fmt::layer().with_writer(std::io::stderr.and(file));
            if json {
                subscriber.with(layer.json()).try_init()?;
            } else {
                subscriber.with(layer).try_init()?;
            }
        }
        (LogOutput::File, Some(file)) => {
            let layer = fmt::layer().with_ansi(false).with_writer(file);
            if json {
                subscriber.with(layer.json()).try_init()?;
            } else {
                subscriber.with(layer).try_init()?;
            }
        }
        _ => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            if json {
                subscriber.with(layer.json()).try_init()?;
            } else {
                subscriber.with(layer).try_init()?;
            }
        }
    }

    Ok(guard)
}
