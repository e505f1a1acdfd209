// src/exec/detached.rs

use crate::errors::Result;
use crate::exec::{BoxFuture, ServiceHandle};

/// Handle for a service the orchestrator uses but does not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachedHandle {
    /// A well-known remote endpoint.
    Remote { url: String },
    /// A local node somebody else started.
    Existing { url: String },
}

impl DetachedHandle {
    pub fn url(&self) -> &str {
        match self {
            DetachedHandle::Remote { url } | DetachedHandle::Existing { url } => url,
        }
    }
}

impl ServiceHandle for DetachedHandle {
    fn pid(&self) -> Option<u32> {
        None
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
