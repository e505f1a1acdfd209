use std::sync::{Arc, Mutex};
use std::time::Duration;

use chainsvc::errors::{ChainsvcError, Result};
use chainsvc::exec::{BoxFuture, LaunchRequest, Launcher, ProcessEvent, ServiceHandle};
use tokio::sync::mpsc;

/// A fake launcher that:
/// - records every launch request
/// - pushes a scripted list of events right after each launch
/// - hands out handles whose shutdown is counted (and can be made to fail)
///
/// Clones share state, so a test keeps one clone for inspection and gives
/// the other to the orchestrator.
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    pid: Option<u32>,
    script: Vec<ProcessEvent>,
    fail_launch: Option<String>,
    fail_shutdown: Option<String>,
    shutdown_delay: Duration,
    launches: Vec<LaunchRequest>,
    shutdowns: usize,
    live: Option<mpsc::Sender<ProcessEvent>>,
}

impl FakeLauncher {
    /// Launches succeed with `pid` and emit nothing.
    pub fn new(pid: Option<u32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                pid,
                script: Vec::new(),
                fail_launch: None,
                fail_shutdown: None,
                shutdown_delay: Duration::ZERO,
                launches: Vec::new(),
                shutdowns: 0,
                live: None,
            })),
        }
    }

    /// Events sent on the channel of every new instance.
    pub fn with_script(self, events: Vec<ProcessEvent>) -> Self {
        self.state.lock().unwrap().script = events;
        self
    }

    /// Emit one output line per entry.
    pub fn with_output(self, lines: &[&str]) -> Self {
        let events = lines
            .iter()
            .map(|l| ProcessEvent::Output(l.to_string()))
            .collect();
        self.with_script(events)
    }

    pub fn failing_launch(self, reason: &str) -> Self {
        self.state.lock().unwrap().fail_launch = Some(reason.to_string());
        self
    }

    pub fn failing_shutdown(self, reason: &str) -> Self {
        self.state.lock().unwrap().fail_shutdown = Some(reason.to_string());
        self
    }

    pub fn with_shutdown_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().shutdown_delay = delay;
        self
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().launches.len()
    }

    pub fn shutdown_count(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    pub fn last_request(&self) -> Option<LaunchRequest> {
        self.state.lock().unwrap().launches.last().cloned()
    }

    /// Whether the latest instance still has an open event channel.
    pub fn is_live(&self) -> bool {
        self.state.lock().unwrap().live.is_some()
    }

    /// Push an event from the latest instance.
    ///
    /// `Exited` also closes the channel, the way a real process does.
    pub async fn emit(&self, event: ProcessEvent) -> bool {
        let tx = {
            let mut state = self.state.lock().unwrap();
            let tx = state.live.clone();
            if matches!(event, ProcessEvent::Exited { .. }) {
                state.live = None;
            }
            tx
        };
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

impl Launcher for FakeLauncher {
    fn launch(
        &mut self,
        request: &LaunchRequest,
        events: mpsc::Sender<ProcessEvent>,
    ) -> BoxFuture<'_, Result<Box<dyn ServiceHandle>>> {
        let request = request.clone();
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            let (pid, script) = {
                let mut guard = state.lock().unwrap();
                guard.launches.push(request.clone());
                if let Some(reason) = guard.fail_launch.clone() {
                    return Err(ChainsvcError::LaunchFailure {
                        service: request.service,
                        reason,
                    });
                }
                guard.live = Some(events.clone());
                (guard.pid, guard.script.clone())
            };

            for event in script {
                let closes = matches!(event, ProcessEvent::Exited { .. });
                let _ = events.try_send(event);
                if closes {
                    state.lock().unwrap().live = None;
                    break;
                }
            }

            Ok(Box::new(FakeHandle {
                pid,
                state,
                service: request.service,
            }) as Box<dyn ServiceHandle>)
        })
    }
}

#[derive(Debug)]
struct FakeHandle {
    pid: Option<u32>,
    state: Arc<Mutex<State>>,
    service: chainsvc::types::ServiceKind,
}

impl ServiceHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>> {
        let state = Arc::clone(&self.state);
        let service = self.service;

        Box::pin(async move {
            let (delay, failure) = {
                let guard = state.lock().unwrap();
                (guard.shutdown_delay, guard.fail_shutdown.clone())
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut guard = state.lock().unwrap();
            guard.shutdowns += 1;
            guard.live = None;
            match failure {
                Some(reason) => Err(ChainsvcError::ShutdownFailure { service, reason }),
                None => Ok(()),
            }
        })
    }
}
