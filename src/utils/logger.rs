use anyhow::{Context, Result};
use colored::Colorize;
use env_logger::{Builder, Target, WriteStyle};
use log::Level;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Log handle passed to the collector and its pipeline stages.
///
/// Carries the log target every line is emitted under, so the collector never logs through an
/// implicit module path. `Logger::default()` needs no backend (lines are dropped until one is set).
#[derive(Clone, Debug)]
pub struct Logger {
    target: Arc<str>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(&format!("{}::collector", env!("CARGO_PKG_NAME")))
    }
}

impl Logger {
    pub fn new(target: &str) -> Self {
        Self {
            target: Arc::from(target),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Handle for a sub-stage, e.g. `filecolly::collector::walk`.
    pub fn child(&self, stage: &str) -> Self {
        Self::new(&format!("{}::{}", self.target, stage))
    }
}

/// Install the process logger and return the collector's log handle.
///
/// Our crate logs at Info (Debug when `verbose`); dependencies at Warn. With `log_file` set,
/// output is appended to that file without colors.
pub fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<Logger> {
    use log::LevelFilter;

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = Builder::from_default_env();
    builder
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level); // Our crate: use requested level

    if let Some(path) = log_file {
        let fd = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder
            .target(Target::Pipe(Box::new(fd)))
            .write_style(WriteStyle::Never)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}: {} [{}] {}",
                    env!("CARGO_PKG_NAME"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
    } else {
        builder.format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => unreachable!(),
                    };
                    let path = record.target().to_string().white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, path, record.args())
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        });
    }

    builder.try_init().context("install logger")?;
    Ok(Logger::default())
}
