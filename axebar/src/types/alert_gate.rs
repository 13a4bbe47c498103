//! Per-category cooldown for user-visible alerts.
//!
//! A threshold breach is re-evaluated on every poll, so without a gate a
//! device sitting above its limit would raise an alert every few seconds.
//! The gate lets the first breach through and then stays closed for that
//! category until the cooldown has elapsed.
//!
//! ```text
//!                  should_alert(now)                  now - last >= cooldown
//!  Never fired ───────────────────► Fired(last) ───────────────────────────► Fired(now)
//!                    (true)              │                 (true)
//!                                        │ now - last < cooldown
//!                                        └──────────► Fired(last)  (false)
//! ```
//!
//! Categories are independent: an ASIC-temperature alert never delays a
//! VR-temperature alert.

use std::collections::HashMap;
use std::time::Duration;

use strum::{Display, EnumIter};
use tokio::time::Instant;

/// Kind of alert, each with its own cooldown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AlertCategory {
    #[strum(to_string = "ASIC temperature")]
    AsicTemperature,

    #[strum(to_string = "VR temperature")]
    VrTemperature,
}

/// Time-based debounce deciding whether an alert may fire.
///
/// Not synchronized. Owned by the scheduler and only touched from its
/// loop.
#[derive(Debug)]
pub struct AlertGate {
    cooldown: Duration,
    last_fired: HashMap<AlertCategory, Instant>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: HashMap::new(),
        }
    }

    /// Returns `true`, and records `now`, if `category` has not fired
    /// within the cooldown. Otherwise returns `false` and changes nothing.
    pub fn should_alert(&mut self, category: AlertCategory, now: Instant) -> bool {
        let open = match self.last_fired.get(&category) {
            Some(&last) => now.saturating_duration_since(last) >= self.cooldown,
            None => true,
        };

        if open {
            self.last_fired.insert(category, now);
        }

        open
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use tokio::time;

    use super::*;

    // start_paused keeps Instant::now() deterministic; time::advance()
    // moves the clock.

    #[tokio::test(start_paused = true)]
    async fn first_alert_is_allowed() {
        let mut gate = AlertGate::new(Duration::from_secs(300));

        for category in AlertCategory::iter() {
            assert!(gate.should_alert(category, Instant::now()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_within_cooldown() {
        let mut gate = AlertGate::new(Duration::from_secs(300));
        let category = AlertCategory::AsicTemperature;

        assert!(gate.should_alert(category, Instant::now()));

        time::advance(Duration::from_secs(299)).await;
        assert!(!gate.should_alert(category, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn allowed_again_at_cooldown() {
        let mut gate = AlertGate::new(Duration::from_secs(300));
        let category = AlertCategory::AsicTemperature;

        assert!(gate.should_alert(category, Instant::now()));

        time::advance(Duration::from_secs(300)).await;
        assert!(gate.should_alert(category, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn suppressed_call_does_not_extend_cooldown() {
        let mut gate = AlertGate::new(Duration::from_secs(300));
        let category = AlertCategory::VrTemperature;
        assert!(gate.should_alert(category, Instant::now()));

        // A rejected attempt halfway through must not restart the window.
        time::advance(Duration::from_secs(150)).await;
        assert!(!gate.should_alert(category, Instant::now()));

        time::advance(Duration::from_secs(150)).await;
        assert!(gate.should_alert(category, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_alert_restarts_cooldown() {
        let mut gate = AlertGate::new(Duration::from_secs(30));
        let category = AlertCategory::AsicTemperature;

        assert!(gate.should_alert(category, Instant::now()));
        time::advance(Duration::from_secs(30)).await;
        assert!(gate.should_alert(category, Instant::now()));

        time::advance(Duration::from_secs(29)).await;
        assert!(!gate.should_alert(category, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn categories_do_not_interfere() {
        let mut gate = AlertGate::new(Duration::from_secs(300));

        assert!(gate.should_alert(AlertCategory::AsicTemperature, Instant::now()));
        assert!(gate.should_alert(AlertCategory::VrTemperature, Instant::now()));

        time::advance(Duration::from_secs(10)).await;
        assert!(!gate.should_alert(AlertCategory::AsicTemperature, Instant::now()));
        assert!(!gate.should_alert(AlertCategory::VrTemperature, Instant::now()));
    }

    #[test]
    fn explicit_timestamps_follow_cooldown() {
        let mut gate = AlertGate::new(Duration::from_secs(300));
        let t1 = Instant::now();

        assert!(gate.should_alert(AlertCategory::AsicTemperature, t1));
        assert!(!gate.should_alert(
            AlertCategory::AsicTemperature,
            t1 + Duration::from_secs(120)
        ));
        assert!(gate.should_alert(
            AlertCategory::AsicTemperature,
            t1 + Duration::from_secs(300)
        ));
    }

    #[test]
    fn out_of_order_timestamp_is_within_cooldown() {
        let mut gate = AlertGate::new(Duration::from_secs(300));
        let t1 = Instant::now() + Duration::from_secs(60);

        assert!(gate.should_alert(AlertCategory::VrTemperature, t1));
        assert!(!gate.should_alert(
            AlertCategory::VrTemperature,
            t1 - Duration::from_secs(30)
        ));
    }
}
