// src/engine/startup.rs

//! Launch strategy per service.
//!
//! The RPC backend is ready as soon as its process has an id. The connector
//! is ready once its output contains the readiness banner; that wait is
//! bounded by [`OrchestratorOptions::ready_timeout`].

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::download::Downloader;
use crate::engine::slot::ServiceSlot;
use crate::engine::{LaunchedService, OrchestratorOptions};
use crate::errors::{ChainsvcError, Result};
use crate::exec::{DetachedHandle, EVENT_BUFFER, LaunchRequest, ProcessEvent, ReadinessDetector};
use crate::notify::StatusNotifier;
use crate::types::{ChainSpec, LaunchMode, Readiness, ServiceKind, ServiceStatus};

/// Shared, read-only inputs of both start sequences.
pub(crate) struct StartContext<'a> {
    pub options: &'a OrchestratorOptions,
    pub notifier: &'a dyn StatusNotifier,
    pub chain: &'a ChainSpec,
}

impl StartContext<'_> {
    fn request(&self, service: ServiceKind) -> LaunchRequest {
        LaunchRequest {
            service,
            chain: self.chain.clone(),
            rpc_port: self.options.rpc_port,
            log_dir: self.options.log_dir.clone(),
        }
    }

    /// Log and notify a failure, then hand it back for returning.
    fn fail(&self, err: ChainsvcError) -> ChainsvcError {
        error!(error = %err, "service start failed");
        self.notifier.error(&err.to_string());
        err
    }
}

/// How the connector's readiness wait ended (short of timing out).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BannerOutcome {
    Ready,
    Exited(Option<i32>),
}

/// Start the RPC backend according to `mode`.
pub(crate) async fn start_rpc(
    slot: &mut ServiceSlot,
    mode: LaunchMode,
    downloader: &mut dyn Downloader,
    ctx: &StartContext<'_>,
) -> Result<LaunchedService> {
    slot.ensure_idle().map_err(|e| ctx.fail(e))?;
    reset(slot, ctx)?;

    match mode {
        LaunchMode::Disabled => {
            warn!("rpc launch mode is disabled; nothing to start");
            ctx.notifier.error("RPC connection type is not configured");
            Ok(LaunchedService::disabled(ServiceKind::Rpc))
        }
        LaunchMode::RemoteUrl => {
            let url = ctx.options.remote_rpc_url.clone();
            use_detached(slot, mode, DetachedHandle::Remote { url }, ctx)
        }
        LaunchMode::LocalExisting => {
            let url = ctx.options.local_rpc_url();
            use_detached(slot, mode, DetachedHandle::Existing { url }, ctx)
        }
        LaunchMode::LocalRun => launch_local_rpc(slot, downloader, ctx).await,
    }
}

fn use_detached(
    slot: &mut ServiceSlot,
    mode: LaunchMode,
    handle: DetachedHandle,
    ctx: &StartContext<'_>,
) -> Result<LaunchedService> {
    let url = handle.url().to_string();
    slot.transition(ServiceStatus::Ready)?;
    slot.attach(Box::new(handle));

    info!(%url, ?mode, "using rpc endpoint without a local process");
    ctx.notifier.info(&format!("Using RPC endpoint {url}"));
    ctx.notifier.rpc_url(&url);
    ctx.notifier.status(ServiceKind::Rpc, Readiness::Ready);

    Ok(LaunchedService {
        service: ServiceKind::Rpc,
        mode,
        pid: None,
        endpoint: Some(url),
    })
}

async fn launch_local_rpc(
    slot: &mut ServiceSlot,
    downloader: &mut dyn Downloader,
    ctx: &StartContext<'_>,
) -> Result<LaunchedService> {
    let service = ServiceKind::Rpc;

    if let Err(source) = downloader.download_if_not_exists().await {
        return Err(ctx.fail(ChainsvcError::DependencyUnavailable { service, source }));
    }

    ctx.notifier.info("Launching RPC backend");
    slot.transition(ServiceStatus::Starting)?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let request = ctx.request(service);
    let mut handle = match slot.launcher_mut().launch(&request, tx).await {
        Ok(handle) => handle,
        Err(err) => {
            slot.transition(ServiceStatus::Error)?;
            return Err(ctx.fail(as_launch_failure(service, err)));
        }
    };

    let Some(pid) = handle.pid() else {
        // Without a pid there is nothing to supervise.
        if let Err(err) = handle.shutdown().await {
            warn!(%service, error = %err, "failed to stop pid-less rpc instance");
        }
        slot.transition(ServiceStatus::Error)?;
        return Err(ctx.fail(ChainsvcError::LaunchFailure {
            service,
            reason: "launcher returned no process id".to_string(),
        }));
    };

    slot.attach(handle);
    slot.attach_events(rx);
    slot.transition(ServiceStatus::Ready)?;

    info!(%service, pid, chain = %ctx.chain.name, "rpc backend running");
    ctx.notifier.info(&format!("RPC backend started (pid {pid})"));
    ctx.notifier.status(service, Readiness::Ready);

    Ok(LaunchedService {
        service,
        mode: LaunchMode::LocalRun,
        pid: Some(pid),
        endpoint: Some(ctx.options.local_rpc_url()),
    })
}

/// Start the connector and wait for its readiness banner.
pub(crate) async fn start_connector(
    slot: &mut ServiceSlot,
    mode: LaunchMode,
    ctx: &StartContext<'_>,
) -> Result<LaunchedService> {
    let service = ServiceKind::Connector;

    slot.ensure_idle().map_err(|e| ctx.fail(e))?;
    if mode != LaunchMode::LocalRun {
        warn!(?mode, "connector is always launched locally; ignoring configured mode");
    }
    reset(slot, ctx)?;

    if let Some(dir) = &ctx.options.log_dir {
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(path = ?dir, error = %err, "failed to create connector log directory");
        }
    }

    slot.transition(ServiceStatus::Starting)?;
    ctx.notifier.info("Launching connector");

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let request = ctx.request(service);
    let handle = match slot.launcher_mut().launch(&request, tx).await {
        Ok(handle) => handle,
        Err(err) => {
            slot.transition(ServiceStatus::Error)?;
            return Err(ctx.fail(as_launch_failure(service, err)));
        }
    };
    let pid = handle.pid();
    slot.attach(handle);

    let limit = ctx.options.ready_timeout;
    let outcome = timeout(limit, wait_for_banner(&mut rx, &ctx.options.readiness)).await;

    match outcome {
        Ok(BannerOutcome::Ready) => {
            slot.attach_events(rx);
            slot.transition(ServiceStatus::Ready)?;
            info!(%service, ?pid, "connector is ready");
            ctx.notifier.status(service, Readiness::Ready);
            Ok(LaunchedService {
                service,
                mode: LaunchMode::LocalRun,
                pid,
                endpoint: None,
            })
        }
        Ok(BannerOutcome::Exited(code)) => {
            slot.release();
            slot.transition(ServiceStatus::NotStarted)?;
            Err(ctx.fail(ChainsvcError::UnexpectedExit { service, code }))
        }
        Err(_elapsed) => {
            slot.transition(ServiceStatus::Error)?;
            if let Some(mut handle) = slot.release() {
                if let Err(err) = handle.shutdown().await {
                    warn!(%service, error = %err, "failed to stop connector after readiness timeout");
                }
            }
            Err(ctx.fail(ChainsvcError::LaunchTimeout {
                service,
                timeout: limit,
            }))
        }
    }
}

/// Consume events until the banner shows up or the process is gone.
pub(crate) async fn wait_for_banner(
    events: &mut mpsc::Receiver<ProcessEvent>,
    detector: &ReadinessDetector,
) -> BannerOutcome {
    while let Some(event) = events.recv().await {
        match event {
            ProcessEvent::Output(chunk) => {
                if detector.matches(&chunk) {
                    return BannerOutcome::Ready;
                }
                trace!(chunk = %chunk, "no readiness match");
            }
            ProcessEvent::Fault(msg) => {
                warn!(fault = %msg, "fault while waiting for readiness");
            }
            ProcessEvent::Exited { code } => return BannerOutcome::Exited(code),
        }
    }
    debug!("event channel closed before readiness");
    BannerOutcome::Exited(None)
}

/// Every start begins from `NotStarted` with observers told "not ready".
fn reset(slot: &mut ServiceSlot, ctx: &StartContext<'_>) -> Result<()> {
    slot.transition(ServiceStatus::NotStarted)?;
    ctx.notifier.status(slot.kind(), Readiness::NotReady);
    Ok(())
}

fn as_launch_failure(service: ServiceKind, err: ChainsvcError) -> ChainsvcError {
    match err {
        ChainsvcError::LaunchFailure { .. } => err,
        other => ChainsvcError::LaunchFailure {
            service,
            reason: other.to_string(),
        },
    }
}
