use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default prefix of log files
pub const LOG_PREFIX: &str = "arcpack";

/// Where and how the converter logs.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory for the daily rotated log files
    pub dir: Utf8PathBuf,
    pub prefix: String,
    /// Debug level instead of info. `RUST_LOG` wins over both.
    pub debug: bool,
    /// Mirror log lines to stderr
    pub console: bool,
    /// Write the log file as JSON lines
    pub json: bool,
}

impl LogOptions {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: LOG_PREFIX.to_string(),
            debug: false,
            console: false,
            json: false,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if self.debug { "debug" } else { "info" }))
    }
}

/// Install the global subscriber.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(options: &LogOptions) -> Result<WorkerGuard> {
    if !options.dir.exists() {
        fs::create_dir_all(&options.dir)
            .with_context(|| format!("Failed to create log directory: {}", options.dir))?;
    }

    let file_appender = rolling::daily(&options.dir, &options.prefix);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let plain_file = (!options.json).then(|| {
        fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json_file = options.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(writer.clone())
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
    });
    let console = options.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(options.filter())
        .with(plain_file)
        .with(json_file)
        .with(console)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.dir,
        options.prefix,
        options.debug,
        options.console,
        options.json
    );

    Ok(guard)
}
