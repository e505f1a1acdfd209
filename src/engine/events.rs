// src/engine/events.rs

//! Process events that arrive while no operation is waiting for them.

use tracing::{debug, error, trace, warn};

use crate::engine::slot::ServiceSlot;
use crate::errors::ChainsvcError;
use crate::exec::ProcessEvent;
use crate::notify::StatusNotifier;
use crate::types::{Readiness, ServiceStatus};

/// Fold one event into the slot's state.
///
/// Output is already logged by the launcher. Faults are never fatal. An exit
/// of a running service resets it to `NotStarted` and is reported, but there
/// is no caller to return an error to.
pub(crate) fn apply_event(
    slot: &mut ServiceSlot,
    event: &ProcessEvent,
    notifier: &dyn StatusNotifier,
) {
    let service = slot.kind();
    match event {
        ProcessEvent::Output(chunk) => {
            trace!(%service, chunk = %chunk, "output event");
        }
        ProcessEvent::Fault(msg) => {
            warn!(%service, fault = %msg, "process fault");
        }
        ProcessEvent::Exited { code } => handle_exit(slot, *code, notifier),
    }
}

fn handle_exit(slot: &mut ServiceSlot, code: Option<i32>, notifier: &dyn StatusNotifier) {
    let service = slot.kind();
    let status = slot.status();
    slot.release();

    match status {
        ServiceStatus::Ready | ServiceStatus::Starting => {
            if let Err(err) = slot.transition(ServiceStatus::NotStarted) {
                error!(%service, error = %err, "cannot reset service after exit");
                return;
            }
            let err = ChainsvcError::UnexpectedExit { service, code };
            error!(%service, ?code, "service exited unexpectedly");
            notifier.status(service, Readiness::NotReady);
            notifier.error(&err.to_string());
        }
        other => {
            debug!(%service, ?code, status = %other, "exit observed outside of a running state");
        }
    }
}
