use std::fmt;
use std::str::FromStr;

/// Strategy used to obtain a service.
///
/// - `Disabled`: nothing is launched and no endpoint is available.
/// - `LocalRun`: spawn a local process and manage its lifetime.
/// - `LocalExisting`: a local process is already running; only use it.
/// - `RemoteUrl`: talk to a well-known remote endpoint, no process at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchMode {
    Disabled,
    LocalRun,
    LocalExisting,
    RemoteUrl,
}

impl LaunchMode {
    /// Label shown to observers in `chain` notifications.
    pub fn label(self) -> &'static str {
        match self {
            LaunchMode::Disabled => "none",
            LaunchMode::LocalRun | LaunchMode::LocalExisting => "local",
            LaunchMode::RemoteUrl => "remote",
        }
    }
}

/// Parses the external `rpcType` setting.
///
/// Only `none`, `remote`, `remote-auto` and `local` are recognised; the
/// `LocalExisting` mode has no settings spelling.
impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(LaunchMode::Disabled),
            "remote" | "remote-auto" => Ok(LaunchMode::RemoteUrl),
            "local" => Ok(LaunchMode::LocalRun),
            other => Err(format!(
                "invalid rpc type: {other:?} (expected \"none\", \"local\", \"remote\" or \"remote-auto\")"
            )),
        }
    }
}

/// The two backends managed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Rpc,
    Connector,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Rpc => "rpc",
            ServiceKind::Connector => "connector",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    #[default]
    NotStarted,
    Starting,
    Stopping,
    Ready,
    Error,
}

impl ServiceStatus {
    /// Whether `self -> next` is an edge of the lifecycle graph.
    ///
    /// Self-transitions are always allowed and treated as no-ops.
    pub fn can_transition_to(self, next: ServiceStatus) -> bool {
        use ServiceStatus::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (NotStarted, Starting)
                | (NotStarted, Ready)
                | (Starting, Ready)
                | (Starting, Error)
                | (Starting, NotStarted)
                | (Starting, Stopping)
                | (Ready, Stopping)
                | (Ready, NotStarted)
                | (Stopping, NotStarted)
                | (Stopping, Error)
                | (Error, NotStarted)
                | (Error, Starting)
        )
    }

    /// Collapse the lifecycle to the boolean observers care about.
    pub fn readiness(self) -> Readiness {
        if self == ServiceStatus::Ready {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::NotStarted => "not started",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Ready => "ready",
            ServiceStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Coarse status as displayed by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Ready => f.write_str("ready"),
            Readiness::NotReady => f.write_str("not ready"),
        }
    }
}

/// Chain the services are configured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
    pub name: String,
    pub id: u64,
}

impl ChainSpec {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// The public chain every remote endpoint serves.
    pub fn mainnet() -> Self {
        Self::new("mainnet", 61)
    }

    /// Test chain used until settings say otherwise.
    pub fn morden() -> Self {
        Self::new("morden", 62)
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::morden()
    }
}

/// Launch configuration for both services plus the selected chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicesConfig {
    pub connector_mode: LaunchMode,
    pub rpc_mode: LaunchMode,
    pub chain: ChainSpec,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            connector_mode: LaunchMode::LocalRun,
            rpc_mode: LaunchMode::LocalRun,
            chain: ChainSpec::default(),
        }
    }
}
