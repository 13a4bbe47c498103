use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{PackageManager, UpdateCommand, UpdateStatus};
use crate::config::MonitorConfig;
use crate::error::Error;
use crate::tracing::prelude::*;

/// Periodically asks the package manager whether an update is pending.
///
/// Checks run on `update_check_interval` (first one immediately) and on
/// every [`UpdateCommand::CheckNow`]. A positive answer is held until a
/// later check comes back negative. A negative answer that follows a
/// user-requested upgrade publishes [`UpdateStatus::Installed`] once.
pub struct UpdateChecker {
    manager: Arc<dyn PackageManager>,
    package: String,
    interval: Duration,
    check_timeout: Duration,
    upgrade_timeout: Duration,
    status_tx: watch::Sender<UpdateStatus>,
    command_rx: mpsc::Receiver<UpdateCommand>,
    upgrade_requested: bool,
}

impl UpdateChecker {
    pub fn new(
        manager: Arc<dyn PackageManager>,
        config: &MonitorConfig,
        status_tx: watch::Sender<UpdateStatus>,
        command_rx: mpsc::Receiver<UpdateCommand>,
    ) -> Self {
        Self {
            manager,
            package: config.update_package.clone(),
            interval: config.update_check_interval,
            check_timeout: config.update_check_timeout,
            upgrade_timeout: config.upgrade_timeout,
            status_tx,
            command_rx,
            upgrade_requested: false,
        }
    }

    pub async fn run(mut self, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    self.check().await;
                }
                Some(command) = self.command_rx.recv() => {
                    match command {
                        UpdateCommand::CheckNow => self.check().await,
                        UpdateCommand::Upgrade => self.upgrade().await,
                    }
                }
            }
        }

        trace!("Update checker stopped.");
    }

    fn status(&self) -> UpdateStatus {
        self.status_tx.borrow().clone()
    }

    async fn check(&mut self) {
        let result =
            match tokio::time::timeout(self.check_timeout, self.manager.outdated(&self.package))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.check_timeout)),
            };

        let next = match result {
            Ok(Some(version)) => UpdateStatus::Available { version },
            Ok(None) => match self.status() {
                UpdateStatus::Available { .. } if self.upgrade_requested => {
                    self.upgrade_requested = false;
                    UpdateStatus::Installed
                }
                // Held until the process relaunches.
                UpdateStatus::Installed => UpdateStatus::Installed,
                _ => UpdateStatus::Current,
            },
            Err(e) => {
                warn!(package = %self.package, error = %e, "Update check failed");
                return;
            }
        };

        self.publish(next);
    }

    async fn upgrade(&mut self) {
        if !matches!(self.status(), UpdateStatus::Available { .. }) {
            debug!(package = %self.package, "Upgrade requested with no update pending");
            return;
        }

        info!(package = %self.package, "Installing update");
        let result =
            match tokio::time::timeout(self.upgrade_timeout, self.manager.upgrade(&self.package))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(self.upgrade_timeout)),
            };

        match result {
            Ok(()) => {
                self.upgrade_requested = true;
                self.check().await;
            }
            Err(e) => {
                warn!(package = %self.package, error = %e, "Upgrade failed");
            }
        }
    }

    fn publish(&self, next: UpdateStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if changed {
            info!(package = %self.package, status = ?next, "Update status changed");
        }
    }
}
