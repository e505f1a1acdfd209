// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `chainsvc`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chainsvc",
    version,
    about = "Launch and supervise a blockchain RPC backend and its connector.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Chainsvc.toml` in the current working directory if it
    /// exists, otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the `rpcType` setting (none, local, remote, remote-auto).
    #[arg(long, value_name = "TYPE")]
    pub rpc_type: Option<String>,

    /// Override the `chain` setting.
    #[arg(long, value_name = "NAME")]
    pub chain: Option<String>,

    /// Override the `chainId` setting.
    #[arg(long, value_name = "ID")]
    pub chain_id: Option<u64>,

    /// Start both services, report status once, then shut down.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CHAINSVC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the configuration, but don't launch anything.
    #[arg(long)]
    pub dry_run: bool,
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

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_optional() {
        let args = CliArgs::try_parse_from(["chainsvc"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.rpc_type.is_none());
        assert!(!args.once);
        assert!(!args.dry_run);
    }

    #[test]
    fn parses_overrides_and_flags() {
        let args = CliArgs::try_parse_from([
            "chainsvc",
            "--config",
            "svc.toml",
            "--rpc-type",
            "remote",
            "--chain-id",
            "61",
            "--once",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("svc.toml")));
        assert_eq!(args.rpc_type.as_deref(), Some("remote"));
        assert_eq!(args.chain_id, Some(61));
        assert!(args.once);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn rejects_non_numeric_chain_id() {
        assert!(CliArgs::try_parse_from(["chainsvc", "--chain-id", "abc"]).is_err());
    }
}
