//! Tracing setup for host applications.
//!
//! Use `RUST_LOG` to control the level (e.g. `RUST_LOG=pbilink_core=debug`);
//! the default is `warn`. Mobile hosts without a console log to a daily
//! rolling file instead of stderr.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name prefix for the rolling file target
const LOG_FILE_PREFIX: &str = "pbilink.log";

#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    /// Daily rolling files in `directory`
    File { directory: PathBuf },
}

/// Install the global tracing subscriber.
///
/// For `LogTarget::File` the returned guard flushes buffered lines when
/// dropped, so keep it alive for the life of the app.
pub fn init_tracing(target: LogTarget) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(None)
        }
        LogTarget::File { directory } => {
            std::fs::create_dir_all(&directory).with_context(|| {
                format!("Failed to create log directory: {}", directory.display())
            })?;
            let appender = tracing_appender::rolling::daily(&directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
    }
}
