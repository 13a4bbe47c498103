//! Decoded device status.
//!
//! AxeOS serves `/api/system/info` as one flat JSON object. Only six keys
//! matter here, and firmware versions disagree about which of them are
//! present, so each one is decoded independently: a missing key, a `null`
//! or a value of the wrong JSON type leaves that field empty.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Metrics from one successful poll.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Hashrate in the device's native unit (GH/s on AxeOS).
    pub hashrate: Option<f64>,
    pub asic_temp_c: Option<f64>,
    /// Voltage-regulator temperature.
    pub vr_temp_c: Option<f64>,
    /// Board revision as reported, e.g. "601".
    pub board_version: Option<String>,
    pub frequency_mhz: Option<f64>,
    pub core_voltage_mv: Option<f64>,
}

impl MetricsSnapshot {
    /// Decode a status body.
    ///
    /// Fails only when the body is not a JSON object.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        match value {
            Value::Object(fields) => Ok(Self::from_fields(&fields)),
            other => Err(Error::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Pick the known keys out of an already-decoded object.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let number = |key: &str| fields.get(key).and_then(Value::as_f64);

        Self {
            hashrate: number("hashRate"),
            asic_temp_c: number("temp"),
            vr_temp_c: number("vrTemp"),
            board_version: fields
                .get("boardVersion")
                .and_then(Value::as_str)
                .map(str::to_string),
            frequency_mhz: number("frequency"),
            core_voltage_mv: number("coreVoltage"),
        }
    }

    /// Hashrate, ASIC temperature and VR temperature are all present.
    pub fn is_complete(&self) -> bool {
        self.hashrate.is_some() && self.asic_temp_c.is_some() && self.vr_temp_c.is_some()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn decodes_full_payload() {
        let body = br#"{
            "hashRate": 1399.2,
            "temp": 61.5,
            "vrTemp": 54,
            "boardVersion": "601",
            "frequency": 525,
            "coreVoltage": 1150,
            "ssid": "ignored"
        }"#;

        let metrics = MetricsSnapshot::from_json(body).unwrap();

        assert_eq!(metrics.hashrate, Some(1399.2));
        assert_eq!(metrics.asic_temp_c, Some(61.5));
        assert_eq!(metrics.vr_temp_c, Some(54.0));
        assert_eq!(metrics.board_version.as_deref(), Some("601"));
        assert_eq!(metrics.frequency_mhz, Some(525.0));
        assert_eq!(metrics.core_voltage_mv, Some(1150.0));
        assert!(metrics.is_complete());
    }

    #[test_case(r#"{}"# ; "empty object")]
    #[test_case(r#"{"hashRate": 1200}"# ; "hashrate only")]
    #[test_case(r#"{"temp": 60, "vrTemp": 50}"# ; "temperatures only")]
    #[test_case(r#"{"hashRate": null, "temp": null}"# ; "explicit nulls")]
    #[test_case(r#"{"boardVersion": "204", "frequency": 490}"# ; "optional fields only")]
    fn missing_fields_decode_as_absent(body: &str) {
        let metrics = MetricsSnapshot::from_json(body.as_bytes()).unwrap();
        assert!(!metrics.is_complete());
    }

    #[test]
    fn wrong_types_decode_as_absent() {
        let body = br#"{
            "hashRate": "fast",
            "temp": [60],
            "vrTemp": {"value": 50},
            "boardVersion": 601,
            "frequency": true,
            "coreVoltage": "1150"
        }"#;

        let metrics = MetricsSnapshot::from_json(body).unwrap();

        assert_eq!(metrics, MetricsSnapshot::default());
    }

    #[test_case(b"" ; "empty body")]
    #[test_case(b"<html>404</html>" ; "html")]
    #[test_case(b"{\"hashRate\": 12" ; "truncated")]
    fn unparseable_body_is_an_error(body: &[u8]) {
        assert!(MetricsSnapshot::from_json(body).is_err());
    }

    #[test_case(b"[1, 2, 3]" ; "array")]
    #[test_case(b"42" ; "number")]
    #[test_case(b"null" ; "null")]
    fn non_object_json_is_malformed(body: &[u8]) {
        let err = MetricsSnapshot::from_json(body).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
