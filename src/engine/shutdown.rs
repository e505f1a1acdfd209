// src/engine/shutdown.rs

use tracing::{error, info};

use crate::engine::slot::ServiceSlot;
use crate::errors::{ChainsvcError, Result};
use crate::notify::StatusNotifier;
use crate::types::{Readiness, ServiceStatus};

/// Stop the instance held by `slot`, if there is one.
///
/// Slots without a handle are left alone and produce no notifications.
pub(crate) async fn stop_service(
    slot: &mut ServiceSlot,
    notifier: &dyn StatusNotifier,
) -> Result<()> {
    if !slot.has_handle() {
        return Ok(());
    }

    let service = slot.kind();
    slot.transition(ServiceStatus::Stopping)?;
    let Some(mut handle) = slot.release() else {
        return Ok(());
    };

    info!(%service, pid = ?handle.pid(), "stopping service");

    match handle.shutdown().await {
        Ok(()) => {
            slot.transition(ServiceStatus::NotStarted)?;
            info!(%service, "service stopped");
            notifier.status(service, Readiness::NotReady);
            Ok(())
        }
        Err(err) => {
            slot.transition(ServiceStatus::Error)?;
            let err = match err {
                ChainsvcError::ShutdownFailure { .. } => err,
                other => ChainsvcError::ShutdownFailure {
                    service,
                    reason: other.to_string(),
                },
            };
            error!(%service, error = %err, "service shutdown failed");
            notifier.error(&err.to_string());
            Err(err)
        }
    }
}
