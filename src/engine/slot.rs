// src/engine/slot.rs

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{ChainsvcError, Result};
use crate::exec::{Launcher, ProcessEvent, ServiceHandle};
use crate::types::{ServiceKind, ServiceStatus};

/// State of one managed service.
///
/// Owns the launcher for that service, the handle of the current instance
/// (if any) and the receiving end of that instance's event channel.
#[derive(Debug)]
pub struct ServiceSlot {
    kind: ServiceKind,
    status: ServiceStatus,
    launcher: Box<dyn Launcher>,
    handle: Option<Box<dyn ServiceHandle>>,
    events: Option<mpsc::Receiver<ProcessEvent>>,
}

impl ServiceSlot {
    pub fn new(kind: ServiceKind, launcher: Box<dyn Launcher>) -> Self {
        Self {
            kind,
            status: ServiceStatus::NotStarted,
            launcher,
            handle: None,
            events: None,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.pid())
    }

    pub fn has_events(&self) -> bool {
        self.events.is_some()
    }

    /// Move to `next`, rejecting edges the state machine does not allow.
    pub fn transition(&mut self, next: ServiceStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ChainsvcError::InvalidTransition {
                service: self.kind,
                from: self.status,
                to: next,
            });
        }
        if self.status != next {
            debug!(service = %self.kind, from = %self.status, to = %next, "status transition");
            self.status = next;
        }
        Ok(())
    }

    /// Fail with `ServiceBusy` unless the slot can accept a new start.
    pub fn ensure_idle(&self) -> Result<()> {
        let busy = self.handle.is_some()
            || matches!(
                self.status,
                ServiceStatus::Starting | ServiceStatus::Stopping
            );
        if busy {
            return Err(ChainsvcError::ServiceBusy {
                service: self.kind,
                status: self.status,
            });
        }
        Ok(())
    }

    pub(crate) fn launcher_mut(&mut self) -> &mut dyn Launcher {
        self.launcher.as_mut()
    }

    /// Store the handle of a freshly launched instance.
    pub(crate) fn attach(&mut self, handle: Box<dyn ServiceHandle>) {
        self.handle = Some(handle);
        self.events = None;
    }

    /// Start routing the instance's events through [`Orchestrator::next_event`].
    ///
    /// [`Orchestrator::next_event`]: crate::engine::Orchestrator::next_event
    pub(crate) fn attach_events(&mut self, events: mpsc::Receiver<ProcessEvent>) {
        self.events = Some(events);
    }

    /// Take the handle out of the slot and stop listening for its events.
    pub(crate) fn release(&mut self) -> Option<Box<dyn ServiceHandle>> {
        self.events = None;
        self.handle.take()
    }

    pub(crate) fn events_mut(&mut self) -> Option<&mut mpsc::Receiver<ProcessEvent>> {
        self.events.as_mut()
    }

    /// Forget a receiver whose senders are all gone.
    pub(crate) fn detach_events(&mut self) {
        self.events = None;
    }

    /// Collect events that are already queued, without waiting.
    pub(crate) fn drain_events(&mut self) -> Vec<ProcessEvent> {
        let mut drained = Vec::new();
        let Some(rx) = self.events.as_mut() else {
            return drained;
        };
        let closed = loop {
            match rx.try_recv() {
                Ok(event) => drained.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break false,
                Err(mpsc::error::TryRecvError::Disconnected) => break true,
            }
        };
        if closed {
            self.events = None;
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{BoxFuture, LaunchRequest};

    #[derive(Debug)]
    struct NoLaunch;

    impl Launcher for NoLaunch {
        fn launch(
            &mut self,
            _request: &LaunchRequest,
            _events: mpsc::Sender<ProcessEvent>,
        ) -> BoxFuture<'_, Result<Box<dyn ServiceHandle>>> {
            Box::pin(async {
                Err(ChainsvcError::LaunchFailure {
                    service: ServiceKind::Rpc,
                    reason: "not supported".into(),
                })
            })
        }
    }

    fn slot() -> ServiceSlot {
        ServiceSlot::new(ServiceKind::Connector, Box::new(NoLaunch))
    }

    #[test]
    fn new_slot_is_idle_and_not_started() {
        let s = slot();
        assert_eq!(s.status(), ServiceStatus::NotStarted);
        assert!(!s.has_handle());
        assert!(s.ensure_idle().is_ok());
    }

    #[test]
    fn illegal_transition_is_rejected_and_state_kept() {
        let mut s = slot();
        let err = s.transition(ServiceStatus::Stopping).unwrap_err();
        assert!(matches!(
            err,
            ChainsvcError::InvalidTransition {
                from: ServiceStatus::NotStarted,
                to: ServiceStatus::Stopping,
                ..
            }
        ));
        assert_eq!(s.status(), ServiceStatus::NotStarted);
    }

    #[test]
    fn starting_slot_is_busy() {
        let mut s = slot();
        s.transition(ServiceStatus::Starting).unwrap();
        assert!(matches!(
            s.ensure_idle(),
            Err(ChainsvcError::ServiceBusy {
                status: ServiceStatus::Starting,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn drain_collects_queued_events_and_notices_close() {
        let mut s = slot();
        let (tx, rx) = mpsc::channel(4);
        s.attach(Box::new(crate::exec::DetachedHandle::Existing { url: "x".into() }));
        s.attach_events(rx);

        tx.send(ProcessEvent::Output("a".into())).await.unwrap();
        tx.send(ProcessEvent::Exited { code: Some(0) }).await.unwrap();
        assert_eq!(s.drain_events().len(), 2);
        assert!(s.has_events());

        drop(tx);
        assert!(s.drain_events().is_empty());
        assert!(!s.has_events());
    }
}
