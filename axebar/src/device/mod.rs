//! Talking to the device: request target, poll outcomes and decoding.
//!
//! A poll never fails in the `Result` sense. Every way a request can go
//! wrong is one of the [`PollOutcome`] variants, which the status layer
//! turns into a connection state.

pub mod client;
pub mod model;
pub mod types;

use std::fmt;

use async_trait::async_trait;
use reqwest::Url;

pub use client::DeviceClient;
pub use model::model_name;
pub use types::MetricsSnapshot;

/// Path of the AxeOS status endpoint.
pub const STATUS_PATH: &str = "/api/system/info";

/// A configured device, already validated as a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    host: String,
    status_url: Url,
}

impl DeviceAddress {
    /// Validate a user-supplied host or IP (optionally with port).
    ///
    /// Returns `None` for blank input or anything that cannot form
    /// `http://{address}/api/system/info`; callers treat that the same as
    /// no address at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let host = raw.trim();
        if host.is_empty() || host.contains(['/', '?', '#', '@']) || host.contains(char::is_whitespace)
        {
            return None;
        }

        let status_url = Url::parse(&format!("http://{host}{STATUS_PATH}")).ok()?;
        status_url.host_str()?;

        Some(Self {
            host: host.to_string(),
            status_url,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn status_url(&self) -> &Url {
        &self.status_url
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// How one poll ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 2xx with a JSON object body. Fields may still be missing.
    Success(MetricsSnapshot),

    /// No complete response within the request timeout.
    Timeout,

    /// Host unreachable, connection refused, or similar transport failure.
    NetworkError,

    /// The device answered with a non-success status.
    HttpError(u16),

    /// The device answered 2xx but the body is not a JSON object.
    Malformed,
}

/// Source of device status, one request per call.
///
/// [`DeviceClient`] is the HTTP implementation; tests substitute scripted
/// sources.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, address: &DeviceAddress) -> PollOutcome;
}
