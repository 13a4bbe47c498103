//! Text handed to the presentation layer with every state.

use serde::Serialize;

use super::ConnectionState;
use crate::config::AlertThresholds;

/// Placeholder for a value the device did not report.
pub const MISSING: &str = "--";

/// Marker placed in front of a temperature at or above its threshold.
pub const HOT_MARKER: &str = "🔥";

const PREFIX: &str = "⛏️";

/// Color semantics of a state. Rendering is up to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Success,
    Warning,
    Failure,
}

impl Severity {
    pub fn of(state: &ConnectionState) -> Self {
        match state {
            ConnectionState::Connected { .. } | ConnectionState::Updated => Severity::Success,
            ConnectionState::Unconfigured
            | ConnectionState::Connecting
            | ConnectionState::PartialData { .. }
            | ConnectionState::UpdateAvailable { .. } => Severity::Warning,
            ConnectionState::NetworkError
            | ConnectionState::Timeout
            | ConnectionState::ServerError { .. } => Severity::Failure,
        }
    }
}

/// Display artifacts derived from one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayStrings {
    /// One-line summary, e.g. `⛏️ 1.399 TH/s | 🔥 T 67°C | VR 67°C`.
    pub status_line: String,
    /// Short description of the state.
    pub detail: String,
    /// Hashrate in display units with three decimals, without unit.
    pub hashrate: String,
    pub asic_temp: String,
    pub vr_temp: String,
    pub asic_hot: bool,
    pub vr_hot: bool,
    pub frequency: String,
    pub core_voltage: String,
    pub model: String,
    pub severity: Severity,
}

impl DisplayStrings {
    /// Render `state`. `hashrate_divisor` converts the device's raw
    /// hashrate into display units.
    pub fn from_state(
        state: &ConnectionState,
        thresholds: &AlertThresholds,
        hashrate_divisor: f64,
    ) -> Self {
        let metrics = state.metrics();
        let hashrate = metrics.and_then(|m| m.hashrate);
        let asic = metrics.and_then(|m| m.asic_temp_c);
        let vr = metrics.and_then(|m| m.vr_temp_c);

        let asic_hot = asic.is_some_and(|t| t >= thresholds.asic_temp_c);
        let vr_hot = vr.is_some_and(|t| t >= thresholds.vr_temp_c);

        let hashrate = hashrate
            .map(|h| format!("{:.3}", h / hashrate_divisor))
            .unwrap_or_else(|| MISSING.to_string());
        let asic_temp = format_temperature(asic);
        let vr_temp = format_temperature(vr);

        let status_line = match state {
            ConnectionState::Unconfigured => format!("{PREFIX} Configure IP..."),
            ConnectionState::Connecting => format!("{PREFIX} Connecting..."),
            ConnectionState::UpdateAvailable { .. } => format!("{PREFIX} Update available"),
            ConnectionState::Updated => format!("{PREFIX} Updated Successfully"),
            _ => format!(
                "{PREFIX} {hashrate} TH/s | {} | {}",
                with_marker("T", &asic_temp, asic_hot),
                with_marker("VR", &vr_temp, vr_hot),
            ),
        };

        Self {
            status_line,
            detail: detail(state),
            hashrate,
            asic_temp,
            vr_temp,
            asic_hot,
            vr_hot,
            frequency: format_unit(metrics.and_then(|m| m.frequency_mhz), "MHz"),
            core_voltage: format_unit(metrics.and_then(|m| m.core_voltage_mv), "mV"),
            model: state.model().unwrap_or(MISSING).to_string(),
            severity: Severity::of(state),
        }
    }
}

fn detail(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Unconfigured => "No device address configured".to_string(),
        ConnectionState::Connecting => "Connecting to device".to_string(),
        ConnectionState::Connected { model: Some(model), .. } => format!("Connected to Bitaxe {model}"),
        ConnectionState::Connected { model: None, .. } => "Connected".to_string(),
        ConnectionState::PartialData { .. } => "Device reported partial data".to_string(),
        ConnectionState::NetworkError => "Device unreachable".to_string(),
        ConnectionState::Timeout => "Request timed out".to_string(),
        ConnectionState::ServerError { status: Some(status) } => {
            format!("Device returned HTTP {status}")
        }
        ConnectionState::ServerError { status: None } => {
            "Device returned malformed data".to_string()
        }
        ConnectionState::UpdateAvailable { version } => format!("Update available: {version}"),
        ConnectionState::Updated => "Updated Successfully".to_string(),
    }
}

/// Whole degrees, truncated toward zero like the device UI.
fn format_temperature(temp: Option<f64>) -> String {
    match temp {
        Some(t) => format!("{}°C", t.trunc() as i64),
        None => format!("{MISSING}°C"),
    }
}

fn format_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{} {unit}", v.round() as i64),
        None => MISSING.to_string(),
    }
}

fn with_marker(label: &str, temp: &str, hot: bool) -> String {
    if hot {
        format!("{HOT_MARKER} {label} {temp}")
    } else {
        format!("{label} {temp}")
    }
}
