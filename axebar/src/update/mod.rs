//! Detecting and installing new releases of the monitor itself.
//!
//! The [`UpdateChecker`] asks a [`PackageManager`] whether the installed
//! package is outdated and publishes the answer as an [`UpdateStatus`] on
//! a watch channel. The scheduler reads that status on every tick and
//! stops polling the device while an update is pending.

mod checker;
mod homebrew;

use async_trait::async_trait;

use crate::error::Result;

pub use checker::UpdateChecker;
pub use homebrew::Homebrew;

/// Latest known update situation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateStatus {
    /// Installed release is current (or nothing has been checked yet).
    #[default]
    Current,

    /// A newer release is available.
    Available { version: String },

    /// A user-initiated upgrade completed; the process should relaunch.
    Installed,
}

/// Requests to the update checker from the user-facing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCommand {
    /// Check now, e.g. because the status popover was opened.
    CheckNow,

    /// Install the pending update, then check again.
    Upgrade,
}

/// External package manager, treated as an oracle.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// `Some(version)` if `package` is outdated, naming the newer version.
    async fn outdated(&self, package: &str) -> Result<Option<String>>;

    /// Install the newest release of `package`.
    async fn upgrade(&self, package: &str) -> Result<()>;
}
