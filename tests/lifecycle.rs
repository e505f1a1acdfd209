// tests/lifecycle.rs

mod common;
use crate::common::{HarnessBuilder, init_tracing, with_timeout};

use std::error::Error;

use chainsvc::engine::ServiceEvent;
use chainsvc::exec::ProcessEvent;
use chainsvc::notify::Notification;
use chainsvc::settings::{RPC_TYPE, SettingValue, SettingsSource};
use chainsvc::types::{ChainSpec, LaunchMode, Readiness, ServiceKind, ServiceStatus};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn exit_while_ready_resets_without_shutdown() -> TestResult {
    init_tracing();
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;
    h.notifier.clear();

    assert!(h.connector.emit(ProcessEvent::Exited { code: Some(1) }).await);
    let event = with_timeout(h.orchestrator.next_event()).await;

    assert_eq!(
        event,
        Some(ServiceEvent {
            service: ServiceKind::Connector,
            event: ProcessEvent::Exited { code: Some(1) },
        })
    );
    assert_eq!(
        h.orchestrator.status(ServiceKind::Connector),
        ServiceStatus::NotStarted
    );
    assert_eq!(
        h.notifier.statuses(ServiceKind::Connector),
        vec![Readiness::NotReady]
    );
    assert_eq!(h.notifier.errors().len(), 1);
    assert_eq!(h.connector.shutdown_count(), 0);

    // The service can be started again.
    h.orchestrator.shutdown().await?;
    with_timeout(h.orchestrator.start()).await?;
    assert_eq!(h.connector.launch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn output_and_faults_do_not_change_state() -> TestResult {
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;

    h.rpc.emit(ProcessEvent::Output("imported block".into())).await;
    h.rpc.emit(ProcessEvent::Fault("stderr closed".into())).await;

    for _ in 0..2 {
        let event = with_timeout(h.orchestrator.next_event()).await.unwrap();
        assert_eq!(event.service, ServiceKind::Rpc);
    }
    assert_eq!(h.orchestrator.status(ServiceKind::Rpc), ServiceStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn refresh_applies_queued_exit_to_accessors() -> TestResult {
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;

    h.rpc.emit(ProcessEvent::Exited { code: Some(2) }).await;

    // Accessors only show what has been applied so far.
    assert_eq!(h.orchestrator.status(ServiceKind::Rpc), ServiceStatus::Ready);
    assert_eq!(h.orchestrator.snapshot().rpc_pid, Some(100));

    h.orchestrator.refresh();

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.rpc, ServiceStatus::NotStarted);
    assert_eq!(snapshot.rpc_pid, None);
    assert_eq!(snapshot.connector, ServiceStatus::Ready);
    assert_eq!(h.orchestrator.status(ServiceKind::Rpc), ServiceStatus::NotStarted);
    Ok(())
}

#[tokio::test]
async fn report_status_applies_queued_exit_first() -> TestResult {
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;

    h.rpc.emit(ProcessEvent::Exited { code: None }).await;
    h.notifier.clear();
    h.orchestrator.report_status();

    assert_eq!(h.orchestrator.status(ServiceKind::Rpc), ServiceStatus::NotStarted);
    assert_eq!(
        h.notifier.statuses(ServiceKind::Rpc).last(),
        Some(&Readiness::NotReady)
    );
    Ok(())
}

#[tokio::test]
async fn report_status_order_for_local_run() -> TestResult {
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;
    h.notifier.clear();

    h.orchestrator.report_status();

    assert_eq!(
        h.notifier.notifications(),
        vec![
            Notification::Status {
                service: ServiceKind::Connector,
                readiness: Readiness::Ready,
            },
            Notification::Status {
                service: ServiceKind::Rpc,
                readiness: Readiness::Ready,
            },
            Notification::Chain {
                rpc_type: "local".into(),
                name: "morden".into(),
                id: 62,
            },
            Notification::RpcUrl("http://localhost:8545".into()),
        ]
    );
    Ok(())
}

#[test]
fn report_status_before_start() {
    let mut h = HarnessBuilder::new().rpc_type("remote").build_configured();

    h.orchestrator.report_status();

    let seen = h.notifier.notifications();
    assert_eq!(seen.len(), 4);
    assert_eq!(h.notifier.statuses(ServiceKind::Rpc), vec![Readiness::NotReady]);
    assert!(seen.contains(&Notification::Chain {
        rpc_type: "remote".into(),
        name: "mainnet".into(),
        id: 61,
    }));
    assert_eq!(h.notifier.rpc_urls().len(), 1);
}

#[test]
fn report_status_never_has_rpc_url_when_disabled() {
    let mut h = HarnessBuilder::new().rpc_type("none").build_configured();
    h.orchestrator.report_status();
    assert!(h.notifier.rpc_urls().is_empty());

    // Also after a failed configuration.
    h.settings.set(RPC_TYPE, SettingValue::Text("bogus".into()));
    assert!(h.orchestrator.apply_configuration(&mut h.settings).is_err());
    h.notifier.clear();
    h.orchestrator.report_status();
    assert!(h.notifier.rpc_urls().is_empty());
    assert!(h.notifier.notifications().contains(&Notification::Chain {
        rpc_type: "none".into(),
        name: "morden".into(),
        id: 62,
    }));
}

#[test]
fn report_status_has_no_rpc_url_for_existing_node() {
    let mut h = HarnessBuilder::new().build_configured();
    h.orchestrator.set_rpc_mode(LaunchMode::LocalExisting);
    h.orchestrator.report_status();
    assert!(h.notifier.rpc_urls().is_empty());
}

#[tokio::test]
async fn next_event_ends_without_sources() -> TestResult {
    let mut h = HarnessBuilder::new().rpc_type("remote").build_configured();
    assert_eq!(h.orchestrator.next_event().await, None);

    with_timeout(h.orchestrator.start()).await?;
    assert!(h.orchestrator.has_event_sources());

    h.connector.emit(ProcessEvent::Exited { code: Some(0) }).await;
    with_timeout(h.orchestrator.next_event()).await;
    // Remote rpc has no channel; the connector's is gone.
    assert_eq!(with_timeout(h.orchestrator.next_event()).await, None);
    Ok(())
}

#[tokio::test]
async fn reconfigure_restarts_with_new_settings() -> TestResult {
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;

    h.settings.set(RPC_TYPE, SettingValue::Text("remote".into()));
    let (rpc, _connector) = with_timeout(h.orchestrator.reconfigure(&mut h.settings)).await?;

    assert_eq!(rpc.mode, LaunchMode::RemoteUrl);
    assert_eq!(h.rpc.launch_count(), 1);
    assert_eq!(h.rpc.shutdown_count(), 1);
    assert_eq!(h.connector.launch_count(), 2);
    assert_eq!(h.connector.shutdown_count(), 1);
    assert_eq!(h.orchestrator.config().chain, ChainSpec::mainnet());
    assert_eq!(h.connector.last_request().unwrap().chain, ChainSpec::mainnet());
    Ok(())
}

#[tokio::test]
async fn switch_chain_relaunches_on_new_chain() -> TestResult {
    let mut h = HarnessBuilder::new().build_configured();
    with_timeout(h.orchestrator.start()).await?;

    let kotti = ChainSpec::new("kotti", 6);
    with_timeout(h.orchestrator.switch_chain(&mut h.settings, kotti.clone())).await?;

    assert_eq!(h.orchestrator.config().chain, kotti);
    assert_eq!(h.rpc.last_request().unwrap().chain, kotti);
    assert_eq!(h.connector.last_request().unwrap().chain, kotti);

    let snapshot = h.orchestrator.snapshot();
    assert_eq!(snapshot.rpc, ServiceStatus::Ready);
    assert_eq!(snapshot.connector, ServiceStatus::Ready);
    assert_eq!(snapshot.rpc_pid, Some(100));
    Ok(())
}
