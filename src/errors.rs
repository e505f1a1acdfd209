// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::download::DownloadError;
use crate::types::{ServiceKind, ServiceStatus};

#[derive(Error, Debug)]
pub enum ChainsvcError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid launch configuration: {0}")]
    InvalidConfig(String),

    #[error("{service} dependency unavailable: {source}")]
    DependencyUnavailable {
        service: ServiceKind,
        #[source]
        source: DownloadError,
    },

    #[error("failed to launch {service}: {reason}")]
    LaunchFailure { service: ServiceKind, reason: String },

    #[error("{service} did not become ready within {timeout:?}")]
    LaunchTimeout {
        service: ServiceKind,
        timeout: Duration,
    },

    #[error("{service} process exited unexpectedly (code: {code:?})")]
    UnexpectedExit {
        service: ServiceKind,
        code: Option<i32>,
    },

    #[error("failed to shut down {service}: {reason}")]
    ShutdownFailure { service: ServiceKind, reason: String },

    #[error("{service} is busy ({status})")]
    ServiceBusy {
        service: ServiceKind,
        status: ServiceStatus,
    },

    #[error("invalid {service} transition: {from} -> {to}")]
    InvalidTransition {
        service: ServiceKind,
        from: ServiceStatus,
        to: ServiceStatus,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ChainsvcError>;
