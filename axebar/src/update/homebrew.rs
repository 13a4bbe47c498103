use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use super::PackageManager;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

const BREW_PATHS: &[&str] = &[
    "/opt/homebrew/bin/brew",
    "/usr/local/bin/brew",
    "/home/linuxbrew/.linuxbrew/bin/brew",
];

/// Version reported when brew lists a package as outdated without saying
/// what it would upgrade to.
const UNKNOWN_VERSION: &str = "newer release";

/// `brew outdated --verbose` line: `name (installed) < latest`.
static OUTDATED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\S+) \((?P<installed>[^)]*)\) (?:<|!=) (?P<latest>\S+)")
        .expect("outdated-line pattern is valid")
});

/// Homebrew as the update oracle.
///
/// Invocations are not time-bounded here; the caller wraps them in a
/// timeout, and dropping the future kills the child.
#[derive(Debug, Clone)]
pub struct Homebrew {
    program: PathBuf,
}

impl Homebrew {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use the first `brew` found in the usual prefixes, else `brew` from
    /// `PATH`.
    pub fn discover() -> Self {
        let program = BREW_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.is_file())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("brew"));
        Self::new(program)
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);

        debug!(program = %self.program.display(), ?args, "Running package manager");
        Ok(command.output().await?)
    }
}

#[async_trait]
impl PackageManager for Homebrew {
    async fn outdated(&self, package: &str) -> Result<Option<String>> {
        let output = self.run(&["outdated", "--verbose", package]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // brew exits non-zero when something is outdated, so only treat
        // the status as a failure when nothing was printed.
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Other(format!(
                "brew outdated failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_outdated(&stdout, package))
    }

    async fn upgrade(&self, package: &str) -> Result<()> {
        let output = self.run(&["upgrade", package]).await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Other(format!(
                "brew upgrade failed ({}): {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// Newer version of `package` listed in `brew outdated` output, if any.
///
/// Tap-qualified names (`user/tap/package`) match on their last segment.
fn parse_outdated(stdout: &str, package: &str) -> Option<String> {
    let matches_package = |name: &str| name == package || name.rsplit('/').next() == Some(package);

    stdout.lines().map(str::trim).find_map(|line| {
        if let Some(caps) = OUTDATED_LINE.captures(line) {
            return matches_package(&caps["name"]).then(|| caps["latest"].to_string());
        }
        matches_package(line).then(|| UNKNOWN_VERSION.to_string())
    })
}
