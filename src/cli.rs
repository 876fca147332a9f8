// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `migradag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "migradag",
    version,
    about = "Validate and inspect dependency-gated migration plans.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    ///
    /// Default: `Migradag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MIGRADAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// How to print the dependency network.
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Also print each migration's definition (text format only).
    #[arg(long)]
    pub details: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_plan_in_working_directory() {
        let args = CliArgs::try_parse_from(["migradag"]).unwrap();
        assert_eq!(args.config, default_config_path());
        assert_eq!(args.format, OutputFormat::Text);
        assert!(!args.details);
    }

    #[test]
    fn explicit_config_and_json_format() {
        let args =
            CliArgs::try_parse_from(["migradag", "--config", "plans/x.toml", "--format", "json"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("plans/x.toml"));
        assert_eq!(args.format, OutputFormat::Json);
    }
}
