//! Monitor daemon.
//!
//! Polls the configured Bitaxe, logs every status update and raises
//! desktop notifications for temperature alerts. On Unix, `SIGUSR1` asks
//! for an immediate update check and `SIGUSR2` installs a pending update.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use axebar::config::{EnvOverride, FileAddressStore, MonitorConfig};
use axebar::device::DeviceClient;
use axebar::notify::TerminalNotifier;
use axebar::scheduler::{Activity, Monitor, MonitorExit};
use axebar::sink::{AlertSink, LogSink, ProcessRelauncher, Sinks};
use axebar::tracing::{self, prelude::*};
use axebar::update::{Homebrew, UpdateChecker, UpdateCommand, UpdateStatus};

/// Start with the background poll period when set to `1`.
const BACKGROUND_ENV: &str = "AXEBAR_BACKGROUND";

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let config = MonitorConfig::from_env().context("invalid configuration")?;
    let address_store = FileAddressStore::from_env_or_default()?;
    info!(address_file = %address_store.path().display(), "Starting axebar");

    let client = DeviceClient::new(config.request_timeout)?;
    let cancellation = CancellationToken::new();

    let initial_activity = match std::env::var(BACKGROUND_ENV).as_deref() {
        Ok("1") => Activity::Background,
        _ => Activity::Foreground,
    };
    // Nothing changes activity in the daemon; the sender keeps the
    // channel open.
    let (_activity_tx, activity_rx) = watch::channel(initial_activity);

    let (update_tx, update_rx) = watch::channel(UpdateStatus::Current);
    let (command_tx, command_rx) = mpsc::channel(8);
    let checker = UpdateChecker::new(
        Arc::new(Homebrew::discover()),
        &config,
        update_tx,
        command_rx,
    );
    let checker_handle = tokio::spawn(checker.run(cancellation.clone()));

    spawn_signal_handlers(command_tx, cancellation.clone())?;

    let alerts: Box<dyn AlertSink> = match TerminalNotifier::discover() {
        Some(notifier) => {
            info!(program = %notifier.program().display(), "Using terminal-notifier for alerts");
            Box::new(notifier)
        }
        None => {
            warn!("terminal-notifier not found, alerts go to the log only");
            Box::new(LogSink)
        }
    };

    let sinks = Sinks {
        presentation: Box::new(LogSink),
        alerts,
        relauncher: Box::new(ProcessRelauncher),
    };

    let monitor = Monitor::new(
        config,
        Arc::new(client),
        Arc::new(EnvOverride::new(address_store)),
        sinks,
        activity_rx,
        update_rx,
    );

    let exit = monitor.run(cancellation.clone()).await?;

    cancellation.cancel();
    checker_handle.await?;

    match exit {
        MonitorExit::Cancelled => info!("Shut down"),
        MonitorExit::Relaunched => info!("Exiting in favor of the updated process"),
    }

    Ok(())
}

fn spawn_signal_handlers(
    commands: mpsc::Sender<UpdateCommand>,
    cancellation: CancellationToken,
) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut check = signal(SignalKind::user_defined1())?;
        let mut upgrade = signal(SignalKind::user_defined2())?;
        let cancellation = cancellation.clone();

        tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    _ = cancellation.cancelled() => break,
                    Some(()) = check.recv() => UpdateCommand::CheckNow,
                    Some(()) = upgrade.recv() => UpdateCommand::Upgrade,
                    else => break,
                };

                debug!(?command, "Signal received");
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    drop(commands);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                cancellation.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    Ok(())
}
