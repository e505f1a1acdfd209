// src/exec/local.rs

//! Local process launcher.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::errors::{ChainsvcError, Result};
use crate::exec::args::expand_args;
use crate::exec::{
    BoxFuture, LaunchRequest, Launcher, ProcessEvent, ReadinessDetector, ServiceHandle,
};
use crate::types::ServiceKind;

/// Tracing target used for every line a child process prints.
pub const OUTPUT_TARGET: &str = "chainsvc::output";

/// Which output stream carries the readiness banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStream {
    Stdout,
    #[default]
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// How to run one service binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    /// Argument template, see [`expand_args`].
    pub args: Vec<String>,
    /// Stream forwarded as [`ProcessEvent::Output`]; the other one is only
    /// logged.
    pub forward_stream: OutputStream,
    /// Banner expected on the forwarded stream. Until a line matches it,
    /// forwarding waits for channel capacity instead of dropping lines.
    pub ready_pattern: Option<ReadinessDetector>,
    /// How long to wait for the process to die once it was killed.
    pub shutdown_timeout: Duration,
}

/// Launcher that spawns `program` as a child process.
#[derive(Debug, Clone)]
pub struct LocalProcessLauncher {
    spec: ProcessSpec,
}

impl LocalProcessLauncher {
    pub fn new(spec: ProcessSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }
}

impl Launcher for LocalProcessLauncher {
    fn launch(
        &mut self,
        request: &LaunchRequest,
        events: mpsc::Sender<ProcessEvent>,
    ) -> BoxFuture<'_, Result<Box<dyn ServiceHandle>>> {
        let spec = self.spec.clone();
        let request = request.clone();

        Box::pin(async move {
            let handle = spawn_process(&spec, &request, events)?;
            Ok(Box::new(handle) as Box<dyn ServiceHandle>)
        })
    }
}

/// Handle to a child process started by [`LocalProcessLauncher`].
///
/// Dropping the handle kills the child.
pub struct LocalProcessHandle {
    service: ServiceKind,
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<oneshot::Sender<Result<()>>>>,
}

impl fmt::Debug for LocalProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProcessHandle")
            .field("service", &self.service)
            .field("pid", &self.pid)
            .field("stopped", &self.stop_tx.is_none())
            .finish()
    }
}

impl ServiceHandle for LocalProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn shutdown(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let Some(stop) = self.stop_tx.take() else {
                debug!(service = %self.service, "shutdown already requested");
                return Ok(());
            };

            let (ack_tx, ack_rx) = oneshot::channel();
            if stop.send(ack_tx).is_err() {
                debug!(service = %self.service, "process already exited before shutdown");
                return Ok(());
            }

            // A dropped ack means the supervisor saw the exit first.
            ack_rx.await.unwrap_or(Ok(()))
        })
    }
}

fn spawn_process(
    spec: &ProcessSpec,
    request: &LaunchRequest,
    events: mpsc::Sender<ProcessEvent>,
) -> Result<LocalProcessHandle> {
    let service = request.service;
    let args = expand_args(&spec.args, request);

    info!(
        service = %service,
        program = ?spec.program,
        ?args,
        "starting service process"
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| ChainsvcError::LaunchFailure {
        service,
        reason: format!("spawning {:?}: {e}", spec.program),
    })?;

    let pid = child.id();

    let (forward_stdout, forward_stderr) = match spec.forward_stream {
        OutputStream::Stdout => (Some(events.clone()), None),
        OutputStream::Stderr => (None, Some(events.clone())),
    };
    let ready = spec.ready_pattern.clone();
    if let Some(stdout) = child.stdout.take() {
        let forward = forward_stdout.map(|tx| Forward::new(tx, ready.clone()));
        spawn_output_reader(stdout, service, OutputStream::Stdout, forward);
    }
    if let Some(stderr) = child.stderr.take() {
        let forward = forward_stderr.map(|tx| Forward::new(tx, ready));
        spawn_output_reader(stderr, service, OutputStream::Stderr, forward);
    }

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(supervise(
        child,
        service,
        events,
        stop_rx,
        spec.shutdown_timeout,
    ));

    Ok(LocalProcessHandle {
        service,
        pid,
        stop_tx: Some(stop_tx),
    })
}

/// Forwarding side of one output reader.
///
/// While `pending_banner` is set the caller is waiting for readiness and
/// draining the channel, so lines are sent with backpressure and none can be
/// lost. Once the banner went through, lines are forwarded with `try_send`:
/// when nobody drains the channel they are only logged, and the child never
/// stalls on a full pipe.
struct Forward {
    tx: mpsc::Sender<ProcessEvent>,
    pending_banner: Option<ReadinessDetector>,
}

impl Forward {
    fn new(tx: mpsc::Sender<ProcessEvent>, pending_banner: Option<ReadinessDetector>) -> Self {
        Self { tx, pending_banner }
    }

    /// Returns `false` once the receiver is gone.
    async fn line(&mut self, service: ServiceKind, line: &str) -> bool {
        let event = ProcessEvent::Output(line.to_string());

        let Some(banner) = &self.pending_banner else {
            return match self.tx.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(service = %service, "output channel full; line not forwarded");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            };
        };

        if banner.matches(line) {
            debug!(service = %service, "readiness banner forwarded");
            self.pending_banner = None;
        }
        self.tx.send(event).await.is_ok()
    }
}

/// Log every line of `reader` and optionally forward it as `Output`.
fn spawn_output_reader<R>(
    reader: R,
    service: ServiceKind,
    stream: OutputStream,
    mut forward: Option<Forward>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    debug!(target: OUTPUT_TARGET, service = %service, stream = %stream, "{}", line);

                    if let Some(fwd) = forward.as_mut() {
                        if !fwd.line(service, line).await {
                            trace!(service = %service, stream = %stream, "output receiver gone; logging only");
                            forward = None;
                        }
                    }
                }
                Err(e) => {
                    warn!(service = %service, stream = %stream, error = %e, "failed reading process output");
                    if let Some(fwd) = &forward {
                        let _ = fwd
                            .tx
                            .send(ProcessEvent::Fault(format!("reading {stream}: {e}")))
                            .await;
                    }
                    break;
                }
            }
        }

        debug!(service = %service, stream = %stream, "output reader ended");
    });
}

/// Wait for the child to exit on its own, or for a stop request.
///
/// A requested stop does **not** emit `Exited`: nobody needs to react to an
/// exit they asked for.
async fn supervise(
    mut child: Child,
    service: ServiceKind,
    events: mpsc::Sender<ProcessEvent>,
    mut stop_rx: oneshot::Receiver<oneshot::Sender<Result<()>>>,
    shutdown_timeout: Duration,
) {
    tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    error!(service = %service, error = %e, "waiting for service process failed");
                    let _ = events
                        .send(ProcessEvent::Fault(format!("waiting for process: {e}")))
                        .await;
                    None
                }
            };

            info!(service = %service, exit_code = ?code, "service process exited");
            let _ = events.send(ProcessEvent::Exited { code }).await;
        }

        stop = &mut stop_rx => {
            match stop {
                Ok(ack) => {
                    let result = terminate(&mut child, service, shutdown_timeout).await;
                    let _ = ack.send(result);
                }
                Err(_) => {
                    debug!(service = %service, "handle dropped; killing process");
                    // kill_on_drop(true) takes care of the child.
                }
            }
        }
    }
}

async fn terminate(child: &mut Child, service: ServiceKind, timeout: Duration) -> Result<()> {
    info!(service = %service, pid = ?child.id(), "stopping service process");

    match tokio::time::timeout(timeout, child.kill()).await {
        Ok(Ok(())) => {
            info!(service = %service, "service process stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(ChainsvcError::ShutdownFailure {
            service,
            reason: format!("killing process: {e}"),
        }),
        Err(_) => Err(ChainsvcError::ShutdownFailure {
            service,
            reason: format!("process did not exit within {timeout:?}"),
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tokio::time::timeout;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::types::ChainSpec;

    fn sh(script: &str, forward_stream: OutputStream) -> LocalProcessLauncher {
        LocalProcessLauncher::new(ProcessSpec {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            forward_stream,
            ready_pattern: None,
            shutdown_timeout: Duration::from_secs(5),
        })
    }

    fn request() -> LaunchRequest {
        LaunchRequest {
            service: ServiceKind::Connector,
            chain: ChainSpec::morden(),
            rpc_port: 8545,
            log_dir: None,
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<ProcessEvent>) -> ProcessEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for process event")
            .expect("event channel closed")
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn forwards_lines_then_reports_exit() {
        let mut launcher = sh("echo one >&2; echo two >&2; exit 3", OutputStream::Stderr);
        let (tx, mut rx) = mpsc::channel(16);

        let handle = launcher.launch(&request(), tx).await.unwrap();
        assert!(handle.pid().is_some());

        let mut outputs = Vec::new();
        loop {
            match next_event(&mut rx).await {
                ProcessEvent::Output(line) => outputs.push(line),
                ProcessEvent::Exited { code } => {
                    assert_eq!(code, Some(3));
                    break;
                }
                ProcessEvent::Fault(f) => panic!("unexpected fault: {f}"),
            }
        }
        // Exit may overtake the last lines; whatever arrived came in order.
        assert!(outputs.iter().all(|l| l == "one" || l == "two"));
    }

    #[tokio::test]
    async fn only_the_selected_stream_is_forwarded() {
        let mut launcher = sh("echo out; echo err >&2; sleep 0.2", OutputStream::Stdout);
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = launcher.launch(&request(), tx).await.unwrap();

        assert_eq!(next_event(&mut rx).await, ProcessEvent::Output("out".into()));
        assert_eq!(next_event(&mut rx).await, ProcessEvent::Exited { code: Some(0) });
    }

    #[tokio::test]
    async fn banner_after_a_burst_of_output_is_never_dropped() {
        let mut launcher = LocalProcessLauncher::new(ProcessSpec {
            ready_pattern: Some(ReadinessDetector::default()),
            ..sh(
                "i=0; while [ $i -lt 2000 ]; do echo noise $i >&2; i=$((i+1)); done; \
                 echo 'Connector started on 127.0.0.1:1920' >&2; exec sleep 30",
                OutputStream::Stderr,
            )
            .spec()
            .clone()
        });
        // Far smaller than the burst, and drained only after the child is done
        // printing it.
        let (tx, mut rx) = mpsc::channel(8);
        let mut handle = launcher.launch(&request(), tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut lines = 0;
        loop {
            match next_event(&mut rx).await {
                ProcessEvent::Output(line) if line.starts_with("Connector started on") => break,
                ProcessEvent::Output(_) => lines += 1,
                other => panic!("unexpected event before banner: {other:?}"),
            }
        }
        assert_eq!(lines, 2000);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_kills_without_exit_event() {
        let mut launcher = sh("exec sleep 30", OutputStream::Stderr);
        let (tx, mut rx) = mpsc::channel(16);
        let mut handle = launcher.launch(&request(), tx).await.unwrap();

        timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap()
            .unwrap();

        // Second shutdown is a no-op.
        handle.shutdown().await.unwrap();
        drop(handle);

        // The supervisor never reports an exit it was asked for; the channel
        // just closes once every sender is gone.
        let rest = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(rest, None);
    }

    #[tokio::test]
    async fn shutdown_after_exit_succeeds() {
        let mut launcher = sh("exit 0", OutputStream::Stderr);
        let (tx, mut rx) = mpsc::channel(16);
        let mut handle = launcher.launch(&request(), tx).await.unwrap();

        assert_eq!(next_event(&mut rx).await, ProcessEvent::Exited { code: Some(0) });
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_failure() {
        let mut launcher = LocalProcessLauncher::new(ProcessSpec {
            program: PathBuf::from("/nonexistent/chainsvc-test-binary"),
            args: vec![],
            forward_stream: OutputStream::Stderr,
            ready_pattern: None,
            shutdown_timeout: Duration::from_secs(1),
        });
        let (tx, _rx) = mpsc::channel(16);

        match launcher.launch(&request(), tx).await {
            Err(ChainsvcError::LaunchFailure { service, reason }) => {
                assert_eq!(service, ServiceKind::Connector);
                assert!(reason.contains("chainsvc-test-binary"), "{reason}");
            }
            other => panic!("expected LaunchFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_line_is_logged_even_without_a_match() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(capture.clone())
            .finish();
        // current_thread runtime: spawned readers run on this thread.
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut launcher = sh(
            "echo 'warming up' >&2; echo 'Connector started on 127.0.0.1:1920' >&2",
            OutputStream::Stderr,
        );
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = launcher.launch(&request(), tx).await.unwrap();

        while let Some(event) = timeout(Duration::from_secs(5), rx.recv()).await.unwrap() {
            if matches!(event, ProcessEvent::Exited { .. }) {
                break;
            }
        }
        // Give the readers a chance to hit EOF.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let logged = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("warming up"), "{logged}");
        assert!(logged.contains("Connector started on 127.0.0.1:1920"), "{logged}");
    }
}
