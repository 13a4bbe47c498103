//! Logging setup.
//!
//! Modules pull the macros in through [`prelude`]. Binaries call
//! [`init_journald_or_stdout`] once, first thing in `main`.

use time::macros::format_description;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod prelude {
    pub use tracing::{debug, error, info, trace, warn};
}

/// Project-specific filter directives, checked before `RUST_LOG`.
const LOG_ENV: &str = "AXEBAR_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Install the global subscriber.
///
/// Logs go to the systemd journal when the process was started by systemd
/// (`JOURNAL_STREAM` is set and the journal socket is reachable), otherwise
/// to stdout with a local wall-clock timestamp.
pub fn init_journald_or_stdout() {
    let filter = build_env_filter();

    if std::env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("journald unavailable, logging to stdout: {e}");
            }
        }
    }

    let timer = fmt::time::LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(timer).with_target(false))
        .init();
}

fn build_env_filter() -> EnvFilter {
    if let Some(filter) = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
