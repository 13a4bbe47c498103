//! Desktop notifications through `terminal-notifier`.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::sink::{Alert, AlertSink};
use crate::tracing::prelude::*;

/// Usual install locations, Apple Silicon Homebrew first.
const NOTIFIER_PATHS: &[&str] = &[
    "/opt/homebrew/bin/terminal-notifier",
    "/usr/local/bin/terminal-notifier",
    "/usr/bin/terminal-notifier",
];

const LOGO_FILE: &str = "bitaxe-logo-square.png";

const SOUND: &str = "Sosumi";

/// Alert sink that shells out to `terminal-notifier`.
///
/// Delivery is fire-and-forget: the child is not awaited and a failure to
/// spawn is only logged.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    program: PathBuf,
    app_icon: Option<PathBuf>,
}

impl TerminalNotifier {
    pub fn new(program: impl Into<PathBuf>, app_icon: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            app_icon,
        }
    }

    /// Find an installed `terminal-notifier`, or `None` if there is none.
    pub fn discover() -> Option<Self> {
        let program = NOTIFIER_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.is_file())?;

        Some(Self::new(program, find_logo()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn arguments(&self, alert: &Alert) -> Vec<String> {
        let mut args = vec![
            "-title".to_string(),
            alert.title.clone(),
            "-message".to_string(),
            alert.message.clone(),
            "-sound".to_string(),
            SOUND.to_string(),
            "-sender".to_string(),
            "⛏️".to_string(),
        ];

        if let Some(icon) = &self.app_icon {
            args.push("-appIcon".to_string());
            args.push(icon.display().to_string());
        }

        args
    }
}

impl AlertSink for TerminalNotifier {
    fn alert(&mut self, alert: &Alert) {
        match Command::new(&self.program).args(self.arguments(alert)).spawn() {
            Ok(_) => debug!(category = %alert.category, "Notification sent"),
            Err(e) => warn!(
                program = %self.program.display(),
                error = %e,
                "Failed to run notifier"
            ),
        }
    }
}

/// Logo next to the executable, falling back to the working directory.
fn find_logo() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(LOGO_FILE)));
    let in_cwd = std::env::current_dir().ok().map(|dir| dir.join(LOGO_FILE));

    [beside_exe, in_cwd]
        .into_iter()
        .flatten()
        .find(|path| path.is_file())
}
