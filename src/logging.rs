// src/logging.rs

//! Diagnostics for the `migradag` binary.
//!
//! The binary's output is the plan's dependency network (text or JSON) on
//! stdout, so it can be piped into other tools. Plan loading, validation
//! problems under `validation = "warn"` and everything else logged through
//! `tracing` go to stderr.
//!
//! `--log-level` sets one level for everything. Without it, `MIGRADAG_LOG`
//! is read as a filter directive list (`debug`, or
//! `info,migradag::readiness=trace`), falling back to `info`.

use anyhow::{Result, anyhow};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "MIGRADAG_LOG";

/// Install the stderr subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = resolve_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install logging subscriber: {e}"))
}

fn resolve_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return at_level(level.into());
    }

    env.map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| at_level(LevelFilter::INFO))
}

fn at_level(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy("")
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_environment() {
        let filter = resolve_filter(Some(LogLevel::Warn), Some("trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn environment_accepts_directives() {
        let filter = resolve_filter(None, Some(" info,migradag::readiness=trace "));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        let filter = resolve_filter(None, Some("debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn blank_or_missing_environment_means_info() {
        assert_eq!(resolve_filter(None, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(resolve_filter(None, Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }
}
