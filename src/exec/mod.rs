// src/exec/mod.rs

//! Process launching layer.
//!
//! The orchestrator never touches `tokio::process` directly. It talks to a
//! [`Launcher`], which hands back a [`ServiceHandle`] and pushes typed
//! [`ProcessEvent`]s onto a channel owned by the caller.
//!
//! - [`local`] spawns real processes and watches their output and exit.
//! - [`detached`] provides handles for services that have no process to
//!   manage (remote endpoints, already running local nodes).
//! - [`readiness`] recognises the "service started" banner in output chunks.
//! - [`args`] expands `{chain}`-style placeholders in argument templates.

use std::fmt::Debug;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::{ChainSpec, ServiceKind};

pub mod args;
pub mod detached;
pub mod local;
pub mod readiness;

pub use detached::DetachedHandle;
pub use local::{LocalProcessHandle, LocalProcessLauncher, OutputStream, ProcessSpec};
pub use readiness::ReadinessDetector;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capacity of the per-launch event channel.
pub const EVENT_BUFFER: usize = 256;

/// Lifecycle events pushed by a launched process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One chunk (line) of diagnostic output.
    Output(String),
    /// The process exited on its own.
    Exited { code: Option<i32> },
    /// Internal fault while supervising the process. Never fatal.
    Fault(String),
}

/// Everything a launcher needs to build the command line for one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub service: ServiceKind,
    pub chain: ChainSpec,
    pub rpc_port: u16,
    pub log_dir: Option<PathBuf>,
}

/// Spawns one kind of service.
///
/// Production code uses [`LocalProcessLauncher`]; tests provide launchers
/// that never spawn anything.
pub trait Launcher: Send + Debug {
    /// Start an instance and return its handle.
    ///
    /// `events` belongs to this launch only; the implementation keeps a
    /// clone for as long as the instance lives.
    fn launch(
        &mut self,
        request: &LaunchRequest,
        events: mpsc::Sender<ProcessEvent>,
    ) -> BoxFuture<'_, Result<Box<dyn ServiceHandle>>>;
}

/// Opaque reference to a running (or process-less) service instance.
pub trait ServiceHandle: Send + Debug {
    /// OS process id, if there is a process behind this handle.
    fn pid(&self) -> Option<u32>;

    /// Stop the instance. Completes once it is gone.
    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// The launchers for both services.
#[derive(Debug)]
pub struct Launchers {
    pub rpc: Box<dyn Launcher>,
    pub connector: Box<dyn Launcher>,
}

impl Launchers {
    pub fn new(rpc: impl Launcher + 'static, connector: impl Launcher + 'static) -> Self {
        Self {
            rpc: Box::new(rpc),
            connector: Box::new(connector),
        }
    }
}
