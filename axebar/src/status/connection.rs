use std::fmt;

use crate::device::{MetricsSnapshot, PollOutcome, model_name};

/// What the monitor currently knows about the device.
///
/// Exactly one state is current. Device-derived states are recomputed
/// from each poll outcome; `UpdateAvailable` and `Updated` are asserted by
/// the update checker and take precedence over device status.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No usable device address is configured.
    Unconfigured,

    /// A poll is outstanding and no result has been seen since the last
    /// configuration or override change.
    Connecting,

    /// Hashrate and both temperatures are present.
    Connected {
        metrics: MetricsSnapshot,
        model: Option<&'static str>,
    },

    /// The device answered, but at least one of hashrate, ASIC temperature
    /// or VR temperature is missing. Whatever is present is still shown.
    PartialData {
        metrics: MetricsSnapshot,
        model: Option<&'static str>,
    },

    NetworkError,

    Timeout,

    /// The device answered with an error status (`Some`) or an unusable
    /// body (`None`).
    ServerError { status: Option<u16> },

    /// A newer release is pending. Device polling is suspended.
    UpdateAvailable { version: String },

    /// A user-initiated upgrade just finished; the process relaunches
    /// shortly.
    Updated,
}

impl ConnectionState {
    /// State for a completed poll.
    pub fn from_outcome(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Success(metrics) => {
                let model = model_name(metrics.board_version.as_deref());
                if metrics.is_complete() {
                    ConnectionState::Connected { metrics, model }
                } else {
                    ConnectionState::PartialData { metrics, model }
                }
            }
            PollOutcome::Timeout => ConnectionState::Timeout,
            PollOutcome::NetworkError => ConnectionState::NetworkError,
            PollOutcome::HttpError(status) => ConnectionState::ServerError {
                status: Some(status),
            },
            PollOutcome::Malformed => ConnectionState::ServerError { status: None },
        }
    }

    /// Metrics carried by this state, if any.
    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        match self {
            ConnectionState::Connected { metrics, .. }
            | ConnectionState::PartialData { metrics, .. } => Some(metrics),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&'static str> {
        match self {
            ConnectionState::Connected { model, .. }
            | ConnectionState::PartialData { model, .. } => *model,
            _ => None,
        }
    }

    /// The state reflects a completed poll (success or failure).
    pub fn is_poll_result(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected { .. }
                | ConnectionState::PartialData { .. }
                | ConnectionState::NetworkError
                | ConnectionState::Timeout
                | ConnectionState::ServerError { .. }
        )
    }

    /// Transient failure that the next tick retries.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ConnectionState::NetworkError
                | ConnectionState::Timeout
                | ConnectionState::ServerError { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unconfigured => f.write_str("unconfigured"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected { .. } => f.write_str("connected"),
            ConnectionState::PartialData { .. } => f.write_str("partial data"),
            ConnectionState::NetworkError => f.write_str("network error"),
            ConnectionState::Timeout => f.write_str("timeout"),
            ConnectionState::ServerError { status: Some(status) } => {
                write!(f, "server error ({status})")
            }
            ConnectionState::ServerError { status: None } => {
                f.write_str("server error (malformed body)")
            }
            ConnectionState::UpdateAvailable { version } => {
                write!(f, "update available ({version})")
            }
            ConnectionState::Updated => f.write_str("updated"),
        }
    }
}
