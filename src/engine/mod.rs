// src/engine/mod.rs

//! Service orchestration engine.
//!
//! Structure:
//! - [`orchestrator`]: the [`Orchestrator`] value owning configuration and
//!   both service slots. All public operations live here.
//! - [`slot`]: per-service state machine plus the handle and event channel
//!   of the current instance.
//! - [`startup`]: launch strategy per mode, including the connector's
//!   readiness wait.
//! - [`shutdown`]: stop sequence for one slot.
//! - [`events`]: applying process events that arrive outside of a pending
//!   operation (exit after readiness, faults).

use std::path::PathBuf;
use std::time::Duration;

use crate::exec::{ProcessEvent, ReadinessDetector};
use crate::types::{LaunchMode, ServiceKind, ServiceStatus, ServicesConfig};

mod events;
pub mod orchestrator;
mod shutdown;
pub mod slot;
mod startup;

pub use orchestrator::Orchestrator;
pub use slot::ServiceSlot;

/// Default upper bound for the connector's readiness wait.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Knobs for the orchestrator that do not come from the settings source.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Port of the local JSON-RPC endpoint.
    pub rpc_port: u16,
    /// Endpoint reported in remote mode.
    pub remote_rpc_url: String,
    /// Banner matcher for the connector's output.
    pub readiness: ReadinessDetector,
    /// How long the connector may take to print its banner.
    pub ready_timeout: Duration,
    /// Directory created before the connector starts and passed as `{log_dir}`.
    pub log_dir: Option<PathBuf>,
}

impl OrchestratorOptions {
    pub fn local_rpc_url(&self) -> String {
        format!("http://localhost:{}", self.rpc_port)
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            rpc_port: 8545,
            remote_rpc_url: "https://mewapi.epool.io".to_string(),
            readiness: ReadinessDetector::default(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            log_dir: None,
        }
    }
}

/// Result of starting one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedService {
    pub service: ServiceKind,
    pub mode: LaunchMode,
    pub pid: Option<u32>,
    pub endpoint: Option<String>,
}

impl LaunchedService {
    /// Placeholder for a service that was intentionally not launched.
    pub fn disabled(service: ServiceKind) -> Self {
        Self {
            service,
            mode: LaunchMode::Disabled,
            pid: None,
            endpoint: None,
        }
    }
}

/// A process event together with the service it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub service: ServiceKind,
    pub event: ProcessEvent,
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub config: ServicesConfig,
    pub rpc: ServiceStatus,
    pub connector: ServiceStatus,
    pub rpc_pid: Option<u32>,
    pub connector_pid: Option<u32>,
}
