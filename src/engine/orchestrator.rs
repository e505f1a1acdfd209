// src/engine/orchestrator.rs

use std::future::pending;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::download::Downloader;
use crate::engine::events::apply_event;
use crate::engine::shutdown::stop_service;
use crate::engine::slot::ServiceSlot;
use crate::engine::startup::{StartContext, start_connector, start_rpc};
use crate::engine::{LaunchedService, OrchestratorOptions, ServiceEvent, StatusSnapshot};
use crate::errors::Result;
use crate::exec::{Launchers, ProcessEvent};
use crate::notify::StatusNotifier;
use crate::settings::{RPC_TYPE, SettingsSource, parse_rpc_type, read_chain, write_chain};
use crate::types::{ChainSpec, LaunchMode, ServiceKind, ServiceStatus, ServicesConfig};

/// Supervises the RPC backend and the connector.
///
/// Every operation takes `&mut self`, so at most one start, shutdown or
/// event-processing sequence runs at a time. Inside `start` and `shutdown`
/// the two services progress concurrently on their own slots.
#[derive(Debug)]
pub struct Orchestrator {
    config: ServicesConfig,
    options: OrchestratorOptions,
    rpc: ServiceSlot,
    connector: ServiceSlot,
    downloader: Box<dyn Downloader>,
    notifier: Arc<dyn StatusNotifier>,
}

impl Orchestrator {
    pub fn new(
        options: OrchestratorOptions,
        launchers: Launchers,
        downloader: Box<dyn Downloader>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            config: ServicesConfig::default(),
            options,
            rpc: ServiceSlot::new(ServiceKind::Rpc, launchers.rpc),
            connector: ServiceSlot::new(ServiceKind::Connector, launchers.connector),
            downloader,
            notifier,
        }
    }

    pub fn config(&self) -> &ServicesConfig {
        &self.config
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Status as of the last applied event.
    ///
    /// Events still queued on the channel are not looked at, so a process
    /// that has already exited can read as `Ready` here until
    /// [`refresh`](Self::refresh), [`next_event`](Self::next_event) or
    /// [`report_status`](Self::report_status) runs.
    pub fn status(&self, service: ServiceKind) -> ServiceStatus {
        self.slot(service).status()
    }

    /// Same caveat as [`status`](Self::status): call
    /// [`refresh`](Self::refresh) first for an up to date view.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            config: self.config.clone(),
            rpc: self.rpc.status(),
            connector: self.connector.status(),
            rpc_pid: self.rpc.pid(),
            connector_pid: self.connector.pid(),
        }
    }

    /// Whether any running instance can still produce events.
    pub fn has_event_sources(&self) -> bool {
        self.rpc.has_events() || self.connector.has_events()
    }

    fn slot(&self, service: ServiceKind) -> &ServiceSlot {
        match service {
            ServiceKind::Rpc => &self.rpc,
            ServiceKind::Connector => &self.connector,
        }
    }

    fn slot_mut(&mut self, service: ServiceKind) -> &mut ServiceSlot {
        match service {
            ServiceKind::Rpc => &mut self.rpc,
            ServiceKind::Connector => &mut self.connector,
        }
    }

    /// Resolve the launch configuration from `settings`.
    ///
    /// An unknown `rpcType` disables the RPC backend before the error is
    /// returned. Remote mode pins the chain to mainnet and writes it back.
    pub fn apply_configuration(
        &mut self,
        settings: &mut dyn SettingsSource,
    ) -> Result<ServicesConfig> {
        let rpc_mode = match parse_rpc_type(settings.get(RPC_TYPE).as_ref()) {
            Ok(mode) => mode,
            Err(err) => {
                self.config.rpc_mode = LaunchMode::Disabled;
                warn!(error = %err, "rpc backend disabled");
                self.notifier.error(&err.to_string());
                return Err(err);
            }
        };

        if rpc_mode == LaunchMode::RemoteUrl {
            write_chain(settings, &ChainSpec::mainnet());
        }
        self.config.rpc_mode = rpc_mode;

        let chain = match read_chain(settings, &self.config.chain) {
            Ok(chain) => chain,
            Err(err) => {
                self.notifier.error(&err.to_string());
                return Err(err);
            }
        };
        self.config.chain = chain;

        info!(
            rpc_mode = ?self.config.rpc_mode,
            chain = %self.config.chain.name,
            chain_id = self.config.chain.id,
            "configuration applied"
        );
        Ok(self.config.clone())
    }

    /// Select the RPC launch mode directly.
    ///
    /// `LocalExisting` has no `rpcType` spelling and is only reachable this
    /// way. Takes effect on the next `start`.
    pub fn set_rpc_mode(&mut self, mode: LaunchMode) {
        debug!(?mode, "rpc launch mode set");
        self.config.rpc_mode = mode;
    }

    /// Start both services and wait for both outcomes.
    ///
    /// A failure on one side never cancels the other. The RPC error is
    /// returned first when both fail.
    pub async fn start(&mut self) -> Result<(LaunchedService, LaunchedService)> {
        let ctx = StartContext {
            options: &self.options,
            notifier: self.notifier.as_ref(),
            chain: &self.config.chain,
        };

        let (rpc, connector) = tokio::join!(
            start_rpc(
                &mut self.rpc,
                self.config.rpc_mode,
                self.downloader.as_mut(),
                &ctx
            ),
            start_connector(&mut self.connector, self.config.connector_mode, &ctx),
        );

        Ok((rpc?, connector?))
    }

    /// Stop every service that holds a handle.
    pub async fn shutdown(&mut self) -> Result<()> {
        let notifier = self.notifier.as_ref();
        let (rpc, connector) = tokio::join!(
            stop_service(&mut self.rpc, notifier),
            stop_service(&mut self.connector, notifier),
        );
        rpc?;
        connector?;
        debug!("shutdown complete");
        Ok(())
    }

    /// Shut down, re-read settings and start again.
    pub async fn reconfigure(
        &mut self,
        settings: &mut dyn SettingsSource,
    ) -> Result<(LaunchedService, LaunchedService)> {
        info!("reconfiguring services");
        self.shutdown().await?;
        self.apply_configuration(settings)?;
        self.start().await
    }

    /// Store a new chain in `settings` and restart both services on it.
    pub async fn switch_chain(
        &mut self,
        settings: &mut dyn SettingsSource,
        chain: ChainSpec,
    ) -> Result<(LaunchedService, LaunchedService)> {
        info!(chain = %chain.name, chain_id = chain.id, "switching chain");
        write_chain(settings, &chain);
        self.reconfigure(settings).await
    }

    /// Push the current state to the notifier.
    ///
    /// Events that are already queued are applied first so the report does
    /// not lag behind an exit that has happened.
    pub fn report_status(&mut self) {
        self.refresh();

        let notifier = self.notifier.as_ref();
        notifier.status(ServiceKind::Connector, self.connector.status().readiness());
        notifier.status(ServiceKind::Rpc, self.rpc.status().readiness());

        let mode = self.config.rpc_mode;
        notifier.chain(mode.label(), &self.config.chain.name, self.config.chain.id);

        match mode {
            LaunchMode::RemoteUrl => notifier.rpc_url(&self.options.remote_rpc_url),
            LaunchMode::LocalRun => notifier.rpc_url(&self.options.local_rpc_url()),
            LaunchMode::Disabled | LaunchMode::LocalExisting => {}
        }
    }

    /// Apply every event that is already queued, without waiting.
    pub fn refresh(&mut self) {
        let notifier = self.notifier.as_ref();
        for slot in [&mut self.rpc, &mut self.connector] {
            for event in slot.drain_events() {
                apply_event(slot, &event, notifier);
            }
        }
    }

    /// Wait for the next process event from either service and apply it.
    ///
    /// Returns `None` once no running instance is left to listen to.
    pub async fn next_event(&mut self) -> Option<ServiceEvent> {
        loop {
            if !self.has_event_sources() {
                return None;
            }

            let (service, event) = tokio::select! {
                event = recv_from(self.rpc.events_mut()) => (ServiceKind::Rpc, event),
                event = recv_from(self.connector.events_mut()) => (ServiceKind::Connector, event),
            };

            let notifier = Arc::clone(&self.notifier);
            let slot = self.slot_mut(service);
            match event {
                Some(event) => {
                    apply_event(slot, &event, notifier.as_ref());
                    return Some(ServiceEvent { service, event });
                }
                None => {
                    debug!(%service, "event channel closed");
                    slot.detach_events();
                }
            }
        }
    }
}

async fn recv_from(rx: Option<&mut mpsc::Receiver<ProcessEvent>>) -> Option<ProcessEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}
