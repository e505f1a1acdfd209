use std::sync::Arc;
use std::time::Duration;

use chainsvc::engine::{Orchestrator, OrchestratorOptions};
use chainsvc::exec::Launchers;
use chainsvc::settings::{MemorySettings, RPC_TYPE};

use crate::{FakeDownloader, FakeLauncher, RecordingNotifier};

/// Banner line the default fake connector prints.
pub const BANNER_LINE: &str = "INFO Connector started on 127.0.0.1:1920";

/// An orchestrator wired to fakes, plus inspection clones of each fake.
#[derive(Debug)]
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub rpc: FakeLauncher,
    pub connector: FakeLauncher,
    pub downloader: FakeDownloader,
    pub notifier: RecordingNotifier,
    pub settings: MemorySettings,
}

/// Builder for [`Harness`] to simplify test setup.
///
/// Defaults: `rpcType = "local"`, an RPC launcher reporting pid 100, a
/// connector reporting pid 200 that prints its banner right away, and a
/// downloader that always succeeds.
#[derive(Debug)]
pub struct HarnessBuilder {
    options: OrchestratorOptions,
    rpc: FakeLauncher,
    connector: FakeLauncher,
    downloader: FakeDownloader,
    settings: MemorySettings,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            options: OrchestratorOptions::default(),
            rpc: FakeLauncher::new(Some(100)),
            connector: FakeLauncher::new(Some(200)).with_output(&["booting", BANNER_LINE]),
            downloader: FakeDownloader::ok(),
            settings: MemorySettings::new().with(RPC_TYPE, "local"),
        }
    }

    pub fn rpc_type(mut self, value: &str) -> Self {
        self.settings = self.settings.with(RPC_TYPE, value);
        self
    }

    pub fn settings(mut self, settings: MemorySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn rpc_launcher(mut self, launcher: FakeLauncher) -> Self {
        self.rpc = launcher;
        self
    }

    pub fn connector_launcher(mut self, launcher: FakeLauncher) -> Self {
        self.connector = launcher;
        self
    }

    pub fn downloader(mut self, downloader: FakeDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.options.ready_timeout = timeout;
        self
    }

    pub fn options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Build without applying the settings.
    pub fn build(self) -> Harness {
        let notifier = RecordingNotifier::new();
        let orchestrator = Orchestrator::new(
            self.options,
            Launchers::new(self.rpc.clone(), self.connector.clone()),
            Box::new(self.downloader.clone()),
            Arc::new(notifier.clone()),
        );
        Harness {
            orchestrator,
            rpc: self.rpc,
            connector: self.connector,
            downloader: self.downloader,
            notifier,
            settings: self.settings,
        }
    }

    /// Build and apply the settings, which must be valid.
    pub fn build_configured(self) -> Harness {
        let mut harness = self.build();
        harness
            .orchestrator
            .apply_configuration(&mut harness.settings)
            .expect("harness settings should be valid");
        harness.notifier.clear();
        harness
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
