use std::io;
use std::path::PathBuf;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Directory for daily rolling log files. Logs go to stderr when unset.
pub const LOG_DIR_ENV: &str = "CHORUS_LOG_DIR";
const LOG_FILE_PREFIX: &str = "chorus.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber. The filter comes from `RUST_LOG`
/// (default `info`).
pub fn init_tracing() -> io::Result<()> {
    let log_dir = std::env::var_os(LOG_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(env_filter());

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "chorus::utils::tracing",
            path = %log_dir.display(),
            "Tracing initialized with daily file output"
        );
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::default()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(env_filter());

        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "chorus::utils::tracing",
            "Tracing initialized with stderr output"
        );
    }

    Ok(())
}
