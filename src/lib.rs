// src/lib.rs

pub mod cli;
pub mod config;
pub mod download;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod notify;
pub mod settings;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config, default_config_path, load_and_validate};
use crate::engine::{Orchestrator, ServiceEvent};
use crate::exec::ProcessEvent;
use crate::notify::{ChannelNotifier, Notification, StatusNotifier};
use crate::settings::{CHAIN, CHAIN_ID, MemorySettings, RPC_TYPE, SettingValue, SettingsSource};
use crate::types::ServicesConfig;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and settings overrides
/// - the orchestrator and its launchers
/// - a printer task writing notifications to stdout
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;

    let mut settings = cfg.initial_settings();
    apply_overrides(&mut settings, &args);

    let (notifier, notifications) = ChannelNotifier::channel();
    let printer = tokio::spawn(print_notifications(notifications));
    let notifier: Arc<dyn StatusNotifier> = Arc::new(notifier);

    let mut orchestrator = Orchestrator::new(
        cfg.orchestrator_options(),
        cfg.launchers(),
        Box::new(cfg.downloader()),
        notifier,
    );

    let outcome = drive(&mut orchestrator, &mut settings, &cfg, &args).await;

    // Closing the last notifier lets the printer drain and finish.
    drop(orchestrator);
    if let Err(e) = printer.await {
        warn!(error = %e, "notification printer failed");
    }

    outcome
}

async fn drive(
    orchestrator: &mut Orchestrator,
    settings: &mut MemorySettings,
    cfg: &ConfigFile,
    args: &CliArgs,
) -> Result<()> {
    let services = orchestrator.apply_configuration(settings)?;

    if args.dry_run {
        print_dry_run(cfg, &services);
        return Ok(());
    }

    if let Err(err) = orchestrator.start().await {
        if let Err(stop_err) = orchestrator.shutdown().await {
            warn!(error = %stop_err, "cleanup after failed start also failed");
        }
        return Err(err.into());
    }

    orchestrator.report_status();

    if !args.once {
        supervise(orchestrator).await;
    }

    orchestrator.shutdown().await?;
    info!("all services stopped");
    Ok(())
}

enum Step {
    Stop,
    Event(Option<ServiceEvent>),
}

/// Apply process events until Ctrl-C.
async fn supervise(orchestrator: &mut Orchestrator) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let step = tokio::select! {
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                Step::Stop
            }
            event = orchestrator.next_event() => Step::Event(event),
        };

        match step {
            Step::Stop => {
                info!("shutdown requested");
                return;
            }
            Step::Event(Some(ServiceEvent {
                service,
                event: ProcessEvent::Exited { code },
            })) => {
                debug!(%service, ?code, "service exit processed");
                orchestrator.report_status();
            }
            Step::Event(Some(_)) => {}
            Step::Event(None) => {
                info!("no supervised processes left; waiting for Ctrl+C");
                if let Err(e) = (&mut ctrl_c).await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                }
                return;
            }
        }
    }
}

/// Load the config named on the command line, `Chainsvc.toml` if present,
/// or the built-in defaults.
fn load_config(path: Option<&Path>) -> errors::Result<ConfigFile> {
    match path {
        Some(path) => load_and_validate(path),
        None => {
            let path = default_config_path();
            if path.is_file() {
                load_and_validate(&path)
            } else {
                debug!("no config file; using built-in defaults");
                default_config()
            }
        }
    }
}

/// Apply `--rpc-type`, `--chain` and `--chain-id` on top of `[settings]`.
fn apply_overrides(settings: &mut MemorySettings, args: &CliArgs) {
    if let Some(rpc_type) = &args.rpc_type {
        settings.set(RPC_TYPE, SettingValue::Text(rpc_type.clone()));
    }
    if let Some(chain) = &args.chain {
        settings.set(CHAIN, SettingValue::Text(chain.clone()));
    }
    if let Some(id) = args.chain_id {
        let value = match i64::try_from(id) {
            Ok(n) => SettingValue::Integer(n),
            Err(_) => SettingValue::Text(id.to_string()),
        };
        settings.set(CHAIN_ID, value);
    }
}

async fn print_notifications(mut rx: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = rx.recv().await {
        println!("{notification}");
    }
}

/// Print the resolved configuration without launching anything.
fn print_dry_run(cfg: &ConfigFile, services: &ServicesConfig) {
    println!("chainsvc dry-run");
    println!(
        "  chain = {} ({})",
        services.chain.name, services.chain.id
    );
    println!();

    println!("rpc:");
    println!("    mode: {:?}", services.rpc_mode);
    println!("    binary: {}", cfg.rpc_binary_path().display());
    println!("    args: {:?}", cfg.rpc.args);
    println!("    local url: http://localhost:{}", cfg.rpc.port);
    println!("    remote url: {}", cfg.rpc.remote_url);

    println!("connector:");
    println!("    mode: {:?}", services.connector_mode);
    println!("    binary: {}", cfg.connector_binary_path().display());
    println!("    args: {:?}", cfg.connector.args);
    println!("    ready pattern: {}", cfg.connector.readiness.as_str());
    println!("    ready timeout: {:?}", cfg.connector.ready_timeout);
    println!("    ready stream: {}", cfg.connector.ready_stream);

    println!("paths:");
    println!("    bin dir: {}", cfg.bin_dir.display());
    println!("    log dir: {}", cfg.log_dir.display());

    debug!("dry-run complete (no launch)");
}
