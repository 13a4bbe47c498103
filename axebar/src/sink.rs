//! Consumers of the monitor's output.
//!
//! The monitor makes no assumption about rendering or notification
//! delivery. It hands a [`StatusUpdate`] to a [`PresentationSink`] after
//! every completed tick and an [`Alert`] to an [`AlertSink`] when a
//! temperature alert clears the cooldown.

use std::ffi::OsString;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::status::{ConnectionState, DisplayStrings};
use crate::tracing::prelude::*;
use crate::types::AlertCategory;

/// Everything the presentation layer needs for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub state: ConnectionState,
    pub display: DisplayStrings,
    /// Hashrate samples, oldest first, in the device's raw unit.
    pub history: Vec<f64>,
}

/// A user-visible alert request.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub category: AlertCategory,
    pub title: String,
    pub message: String,
}

impl Alert {
    /// Alert for a temperature at or above its threshold.
    pub fn temperature(category: AlertCategory, temp_c: f64) -> Self {
        let title = match category {
            AlertCategory::AsicTemperature => "🔥 High ASIC Temperature",
            AlertCategory::VrTemperature => "🔥 High VR Temperature",
        };

        Self {
            category,
            title: title.to_string(),
            message: format!("{}°C", temp_c.trunc() as i64),
        }
    }
}

pub trait PresentationSink: Send {
    fn present(&mut self, update: &StatusUpdate);
}

pub trait AlertSink: Send {
    fn alert(&mut self, alert: &Alert);
}

/// Restarts the process after an upgrade has been installed.
pub trait Relaunch: Send {
    fn relaunch(&self) -> Result<()>;
}

/// The monitor's outputs, bundled.
pub struct Sinks {
    pub presentation: Box<dyn PresentationSink>,
    pub alerts: Box<dyn AlertSink>,
    pub relauncher: Box<dyn Relaunch>,
}

/// Writes updates and alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn present(&mut self, update: &StatusUpdate) {
        info!(
            state = %update.state,
            detail = %update.display.detail,
            samples = update.history.len(),
            "{}",
            update.display.status_line
        );
    }
}

impl AlertSink for LogSink {
    fn alert(&mut self, alert: &Alert) {
        warn!(category = %alert.category, message = %alert.message, "{}", alert.title);
    }
}

/// Forwards updates to a channel. A closed receiver is ignored.
impl PresentationSink for mpsc::UnboundedSender<StatusUpdate> {
    fn present(&mut self, update: &StatusUpdate) {
        if self.send(update.clone()).is_err() {
            trace!("Status update receiver dropped");
        }
    }
}

impl AlertSink for mpsc::UnboundedSender<Alert> {
    fn alert(&mut self, alert: &Alert) {
        if self.send(alert.clone()).is_err() {
            trace!("Alert receiver dropped");
        }
    }
}

/// Re-executes the current binary with the same arguments.
///
/// Tries the name the process was started under first. For a Homebrew
/// install that is the stable `bin/` link, whereas `current_exe()` points
/// into the versioned keg the upgrade may already have removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRelauncher;

impl Relaunch for ProcessRelauncher {
    fn relaunch(&self) -> Result<()> {
        let programs = relaunch_programs(
            std::env::args_os().next(),
            std::env::current_exe().ok(),
        );
        let args: Vec<OsString> = std::env::args_os().skip(1).collect();
        spawn_first(&programs, &args)
    }
}

/// `argv[0]`, then the resolved executable if it differs.
fn relaunch_programs(argv0: Option<OsString>, current_exe: Option<PathBuf>) -> Vec<PathBuf> {
    let mut programs: Vec<PathBuf> = argv0
        .filter(|name| !name.is_empty())
        .map(PathBuf::from)
        .into_iter()
        .collect();

    if let Some(exe) = current_exe {
        if !programs.contains(&exe) {
            programs.push(exe);
        }
    }

    programs
}

/// Spawn the first of `programs` that starts.
fn spawn_first(programs: &[PathBuf], args: &[OsString]) -> Result<()> {
    let mut last_error = None;

    for program in programs {
        match std::process::Command::new(program).args(args).spawn() {
            Ok(child) => {
                info!(program = %program.display(), pid = child.id(), "Relaunched");
                return Ok(());
            }
            Err(e) => {
                warn!(program = %program.display(), error = %e, "Relaunch attempt failed");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Err(Error::Other("no program to relaunch".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_alert_text() {
        let asic = Alert::temperature(AlertCategory::AsicTemperature, 67.8);
        assert_eq!(asic.title, "🔥 High ASIC Temperature");
        assert_eq!(asic.message, "67°C");

        let vr = Alert::temperature(AlertCategory::VrTemperature, 86.0);
        assert_eq!(vr.title, "🔥 High VR Temperature");
        assert_eq!(vr.message, "86°C");
    }

    #[test]
    fn relaunch_prefers_invoked_name() {
        let programs = relaunch_programs(
            Some("/opt/homebrew/bin/axebard".into()),
            Some("/opt/homebrew/Cellar/axebar/0.1.0/bin/axebard".into()),
        );
        assert_eq!(
            programs,
            [
                PathBuf::from("/opt/homebrew/bin/axebard"),
                PathBuf::from("/opt/homebrew/Cellar/axebar/0.1.0/bin/axebard"),
            ]
        );
    }

    #[test]
    fn relaunch_programs_skip_duplicates_and_blanks() {
        let exe = PathBuf::from("/usr/local/bin/axebard");
        assert_eq!(
            relaunch_programs(Some(exe.clone().into()), Some(exe.clone())),
            [exe.clone()]
        );
        assert_eq!(
            relaunch_programs(Some(OsString::new()), Some(exe.clone())),
            [exe.clone()]
        );
        assert!(relaunch_programs(None, None).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn removed_program_falls_back_to_next() {
        let programs = [
            PathBuf::from("/nonexistent/Cellar/axebar/0.1.0/bin/axebard"),
            PathBuf::from("true"),
        ];
        assert!(spawn_first(&programs, &[]).is_ok());
    }

    #[test]
    fn no_startable_program_is_an_error() {
        let programs = [PathBuf::from("/nonexistent/axebard")];
        assert!(matches!(spawn_first(&programs, &[]), Err(Error::Io(_))));
        assert!(matches!(spawn_first(&[], &[]), Err(Error::Other(_))));
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (mut tx, rx) = mpsc::unbounded_channel::<Alert>();
        drop(rx);

        tx.alert(&Alert::temperature(AlertCategory::VrTemperature, 81.0));
    }
}
