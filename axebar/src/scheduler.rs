//! The poll scheduler drives everything else.
//!
//! One task owns the connection state, the hashrate history and the alert
//! gate. On every tick it either reports a pending update, reports that no
//! device is configured, or issues a status request. The request runs on
//! its own task and its outcome comes back over a channel, so completions
//! are applied from the same loop as ticks and nothing needs a lock.
//!
//! At most one request is outstanding. A tick that finds one still in
//! flight is skipped. Each request carries a token; a completion whose
//! token is no longer the latest (because an update override superseded
//! it) is dropped instead of overwriting newer state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{AddressSource, MonitorConfig};
use crate::device::{DeviceAddress, MetricsSnapshot, PollOutcome, StatusSource};
use crate::error::Result;
use crate::sink::{Alert, Sinks, StatusUpdate};
use crate::status::{ConnectionState, DisplayStrings};
use crate::tracing::prelude::*;
use crate::types::{AlertCategory, AlertGate, HistoryBuffer};
use crate::update::UpdateStatus;

/// Whether the host application is in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Foreground,
    Background,
}

/// Why [`Monitor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    Cancelled,
    /// An update was installed and the relauncher has started the new
    /// process.
    Relaunched,
}

#[derive(Debug)]
struct PollCompletion {
    token: u64,
    outcome: PollOutcome,
}

pub struct Monitor {
    config: MonitorConfig,
    source: Arc<dyn StatusSource>,
    address: Arc<dyn AddressSource>,
    sinks: Sinks,
    activity_rx: watch::Receiver<Activity>,
    update_rx: watch::Receiver<UpdateStatus>,
    completion_tx: mpsc::Sender<PollCompletion>,
    completion_rx: mpsc::Receiver<PollCompletion>,
    state: ConnectionState,
    history: HistoryBuffer,
    alert_gate: AlertGate,
    activity: Activity,
    /// Token of the most recently issued request; only its result counts.
    latest_token: u64,
    /// Token of the request still outstanding, if any.
    in_flight: Option<u64>,
    last_tick: Option<Instant>,
    relaunch_at: Option<Instant>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn StatusSource>,
        address: Arc<dyn AddressSource>,
        sinks: Sinks,
        activity_rx: watch::Receiver<Activity>,
        update_rx: watch::Receiver<UpdateStatus>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(4);
        let activity = *activity_rx.borrow();

        Self {
            history: HistoryBuffer::new(config.history_capacity),
            alert_gate: AlertGate::new(config.alert_cooldown),
            config,
            source,
            address,
            sinks,
            activity_rx,
            update_rx,
            completion_tx,
            completion_rx,
            state: ConnectionState::Connecting,
            activity,
            latest_token: 0,
            in_flight: None,
            last_tick: None,
            relaunch_at: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Tick period for the current activity.
    pub fn period(&self) -> Duration {
        match self.activity {
            Activity::Foreground => self.config.poll_interval,
            Activity::Background => self
                .config
                .poll_interval
                .saturating_mul(self.config.background_multiplier),
        }
    }

    /// Run until cancelled or until an installed update relaunches the
    /// process. The first tick happens immediately.
    pub async fn run(mut self, cancellation: CancellationToken) -> Result<MonitorExit> {
        self.activity = *self.activity_rx.borrow_and_update();
        let mut interval = new_interval(Instant::now(), self.period());

        info!(
            activity = ?self.activity,
            period_secs = self.period().as_secs_f64(),
            "Monitor started"
        );

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }

                _ = interval.tick() => {
                    self.last_tick = Some(Instant::now());
                    self.tick();
                }

                Some(completion) = self.completion_rx.recv() => {
                    self.complete(completion);
                }

                Ok(()) = self.activity_rx.changed() => {
                    let activity = *self.activity_rx.borrow_and_update();
                    if let Some(rescheduled) = self.set_activity(activity) {
                        interval = rescheduled;
                    }
                }

                Ok(()) = self.update_rx.changed() => {
                    let status = self.update_rx.borrow_and_update().clone();
                    self.on_update_status(status);
                }

                _ = time::sleep_until(self.relaunch_at.unwrap_or_else(Instant::now)),
                    if self.relaunch_at.is_some() =>
                {
                    info!("Relaunching after update");
                    self.sinks.relauncher.relaunch()?;
                    return Ok(MonitorExit::Relaunched);
                }
            }
        }

        trace!("Monitor stopped.");
        Ok(MonitorExit::Cancelled)
    }

    /// Switch activity. Returns the replacement timer when the period
    /// changed. Its first tick lands one new period after the last tick,
    /// or right away if that moment has already passed; later ticks are
    /// spaced from that first one.
    fn set_activity(&mut self, activity: Activity) -> Option<Interval> {
        if activity == self.activity {
            return None;
        }

        self.activity = activity;
        let period = self.period();
        let now = Instant::now();
        let start = match self.last_tick.and_then(|last| last.checked_add(period)) {
            Some(next) if next > now => next,
            _ => now,
        };

        info!(
            activity = ?activity,
            period_secs = period.as_secs_f64(),
            "Poll interval changed"
        );

        Some(new_interval(start, period))
    }

    fn on_update_status(&mut self, status: UpdateStatus) {
        if status == UpdateStatus::Installed && self.relaunch_at.is_none() {
            self.supersede_in_flight();
            self.transition(ConnectionState::Updated);
            self.relaunch_at = Some(Instant::now() + self.config.update_confirmation);
        }
    }

    fn tick(&mut self) {
        let update = self.update_rx.borrow().clone();
        match update {
            UpdateStatus::Available { version } => {
                // The update takes priority over device status; no request
                // is issued this tick.
                self.supersede_in_flight();
                self.transition(ConnectionState::UpdateAvailable { version });
                return;
            }
            UpdateStatus::Installed => {
                trace!("Relaunch pending, not polling");
                return;
            }
            UpdateStatus::Current => {}
        }

        if let Some(token) = self.in_flight {
            debug!(token, "Previous poll still outstanding, skipping tick");
            return;
        }

        // Read fresh every tick so address edits apply without restart.
        let Some(address) = self.address.address().as_deref().and_then(DeviceAddress::parse) else {
            self.transition(ConnectionState::Unconfigured);
            return;
        };

        if !self.state.is_poll_result() {
            self.transition(ConnectionState::Connecting);
        }

        self.latest_token += 1;
        let token = self.latest_token;
        self.in_flight = Some(token);

        trace!(token, %address, "Issuing poll");

        let source = Arc::clone(&self.source);
        let completion_tx = self.completion_tx.clone();
        let timeout = self.config.request_timeout;

        tokio::spawn(async move {
            let outcome = match time::timeout(timeout, source.fetch_status(&address)).await {
                Ok(outcome) => outcome,
                Err(_) => PollOutcome::Timeout,
            };
            if completion_tx
                .send(PollCompletion { token, outcome })
                .await
                .is_err()
            {
                trace!(token, "Monitor gone before poll completed");
            }
        });
    }

    fn complete(&mut self, completion: PollCompletion) {
        let PollCompletion { token, outcome } = completion;

        if self.in_flight == Some(token) {
            self.in_flight = None;
        }

        if token != self.latest_token {
            debug!(token, latest = self.latest_token, "Discarding stale poll result");
            return;
        }

        self.apply_outcome(outcome);
    }

    /// Make the outstanding request's result stale. The request keeps its
    /// in-flight slot until it completes.
    fn supersede_in_flight(&mut self) {
        if self.in_flight == Some(self.latest_token) {
            debug!(token = self.latest_token, "Outstanding poll superseded");
            self.latest_token += 1;
        }
    }

    fn apply_outcome(&mut self, outcome: PollOutcome) {
        let state = ConnectionState::from_outcome(outcome);

        if let Some(metrics) = state.metrics() {
            if let Some(hashrate) = metrics.hashrate {
                self.history.append(hashrate);
            }
            self.evaluate_alerts(metrics);
        } else if state.is_error() {
            debug!(state = %state, "Poll failed, retrying next tick");
        }

        self.transition(state);
    }

    fn evaluate_alerts(&mut self, metrics: &MetricsSnapshot) {
        let now = Instant::now();
        let thresholds = self.config.thresholds;
        let readings = [
            (
                AlertCategory::AsicTemperature,
                metrics.asic_temp_c,
                thresholds.asic_temp_c,
            ),
            (
                AlertCategory::VrTemperature,
                metrics.vr_temp_c,
                thresholds.vr_temp_c,
            ),
        ];

        for (category, temp, threshold) in readings {
            let Some(temp) = temp else {
                continue;
            };
            if temp < threshold {
                continue;
            }

            if self.alert_gate.should_alert(category, now) {
                let alert = Alert::temperature(category, temp);
                info!(%category, temp_c = temp, threshold_c = threshold, "Temperature alert");
                self.sinks.alerts.alert(&alert);
            } else {
                debug!(
                    %category,
                    temp_c = temp,
                    cooldown_secs = self.alert_gate.cooldown().as_secs(),
                    "Temperature alert suppressed by cooldown"
                );
            }
        }
    }

    /// Make `state` current and hand it to the presentation sink.
    fn transition(&mut self, state: ConnectionState) {
        if state.to_string() != self.state.to_string() {
            info!(previous = %self.state, new = %state, "Connection state changed");
        }
        self.state = state;

        let update = StatusUpdate {
            display: DisplayStrings::from_state(
                &self.state,
                &self.config.thresholds,
                self.config.hashrate_divisor,
            ),
            state: self.state.clone(),
            history: self.history.snapshot(),
        };
        self.sinks.presentation.present(&update);
    }
}

fn new_interval(start: Instant, period: Duration) -> Interval {
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
