// src/notify/mod.rs

//! Status notification boundary.
//!
//! The orchestrator reports everything observers need through a
//! [`StatusNotifier`]. Calls are fire-and-forget: nothing is returned and
//! implementations must not block.

use std::fmt;
use std::fmt::Debug;

use crate::types::{Readiness, ServiceKind};

pub mod channel;

pub use channel::ChannelNotifier;

/// Receiver of status, info and error messages for display.
pub trait StatusNotifier: Send + Sync + Debug {
    fn status(&self, service: ServiceKind, readiness: Readiness);
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn chain(&self, rpc_type: &str, chain_name: &str, chain_id: u64);
    fn rpc_url(&self, url: &str);
}

/// Owned form of a single notifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Status {
        service: ServiceKind,
        readiness: Readiness,
    },
    Info(String),
    Error(String),
    Chain {
        rpc_type: String,
        name: String,
        id: u64,
    },
    RpcUrl(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Status { service, readiness } => {
                write!(f, "status {service} {readiness}")
            }
            Notification::Info(msg) => write!(f, "info {msg}"),
            Notification::Error(msg) => write!(f, "error {msg}"),
            Notification::Chain { rpc_type, name, id } => {
                write!(f, "chain {rpc_type} {name} {id}")
            }
            Notification::RpcUrl(url) => write!(f, "rpc-url {url}"),
        }
    }
}
