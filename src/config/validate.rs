// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, ConnectorConfig, RawConfigFile, RpcConfig};
use crate::errors::{ChainsvcError, Result};
use crate::exec::{OutputStream, ReadinessDetector};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ChainsvcError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_rpc(&raw)?;
        validate_connector_binary(&raw)?;

        let readiness = ReadinessDetector::new(&raw.connector.ready_pattern)?;
        let ready_timeout = parse_nonzero_duration("[connector].ready_timeout", &raw.connector.ready_timeout)?;
        let ready_stream = parse_stream(&raw.connector.ready_stream)?;
        let shutdown_timeout = parse_nonzero_duration("[shutdown].timeout", &raw.shutdown.timeout)?;

        Ok(ConfigFile {
            bin_dir: raw.paths.bin_dir,
            log_dir: raw.paths.log_dir,
            rpc: RpcConfig {
                binary: raw.rpc.binary,
                args: raw.rpc.args,
                port: raw.rpc.port,
                remote_url: raw.rpc.remote_url,
            },
            connector: ConnectorConfig {
                binary: raw.connector.binary,
                args: raw.connector.args,
                readiness,
                ready_timeout,
                ready_stream,
            },
            shutdown_timeout,
            settings: raw.settings,
        })
    }
}

fn validate_rpc(cfg: &RawConfigFile) -> Result<()> {
    if cfg.rpc.binary.trim().is_empty() {
        return Err(ChainsvcError::ConfigError(
            "[rpc].binary must not be empty".to_string(),
        ));
    }

    if cfg.rpc.port == 0 {
        return Err(ChainsvcError::ConfigError(
            "[rpc].port must be >= 1 (got 0)".to_string(),
        ));
    }

    let url = cfg.rpc.remote_url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ChainsvcError::ConfigError(format!(
            "[rpc].remote_url must be an http(s) URL (got {url:?})"
        )));
    }

    Ok(())
}

fn validate_connector_binary(cfg: &RawConfigFile) -> Result<()> {
    if cfg.connector.binary.trim().is_empty() {
        return Err(ChainsvcError::ConfigError(
            "[connector].binary must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn parse_stream(s: &str) -> Result<OutputStream> {
    match s.trim().to_lowercase().as_str() {
        "stdout" => Ok(OutputStream::Stdout),
        "stderr" => Ok(OutputStream::Stderr),
        other => Err(ChainsvcError::ConfigError(format!(
            "[connector].ready_stream must be \"stdout\" or \"stderr\" (got {other:?})"
        ))),
    }
}

fn parse_nonzero_duration(field: &str, s: &str) -> Result<Duration> {
    let dur = parse_duration(s)
        .map_err(|e| ChainsvcError::ConfigError(format!("{field}: {e}")))?;
    if dur.is_zero() {
        return Err(ChainsvcError::ConfigError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(dur)
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_src: &str) -> RawConfigFile {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = ConfigFile::try_from(raw("")).unwrap();
        assert_eq!(cfg.rpc.port, 8545);
        assert_eq!(cfg.rpc.binary, "geth");
        assert_eq!(cfg.connector.ready_timeout, Duration::from_secs(60));
        assert_eq!(cfg.connector.ready_stream, OutputStream::Stderr);
        assert!(cfg.connector.readiness.matches("Connector started on 127.0.0.1:1920"));
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(10));
        assert!(cfg.settings.is_empty());
    }

    #[test]
    fn durations_accept_common_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration(" 2m ").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(parse_duration("6000000000000000h").is_err());
        assert!(parse_duration("400000000000000000m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );

        let err = ConfigFile::try_from(raw("[shutdown]\ntimeout = \"6000000000000000h\"\n"))
            .unwrap_err();
        match err {
            ChainsvcError::ConfigError(msg) => assert!(msg.contains("too large"), "{msg}"),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ConfigFile::try_from(raw("[connector]\nready_timeout = \"0s\"\n")).unwrap_err();
        match err {
            ChainsvcError::ConfigError(msg) => assert!(msg.contains("ready_timeout"), "{msg}"),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn bad_pattern_and_stream_are_rejected() {
        assert!(matches!(
            ConfigFile::try_from(raw("[connector]\nready_pattern = \"(\"\n")),
            Err(ChainsvcError::ConfigError(_))
        ));
        assert!(matches!(
            ConfigFile::try_from(raw("[connector]\nready_stream = \"stdin\"\n")),
            Err(ChainsvcError::ConfigError(_))
        ));
    }

    #[test]
    fn rpc_section_is_checked() {
        assert!(ConfigFile::try_from(raw("[rpc]\nport = 0\n")).is_err());
        assert!(ConfigFile::try_from(raw("[rpc]\nbinary = \"  \"\n")).is_err());
        assert!(ConfigFile::try_from(raw("[rpc]\nremote_url = \"ftp://x\"\n")).is_err());
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        assert!(toml::from_str::<RawConfigFile>("[rpc]\nprot = 1\n").is_err());
    }
}
