//! HTTP client for the AxeOS status endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};

use super::{DeviceAddress, MetricsSnapshot, PollOutcome, StatusSource};
use crate::error::Result;
use crate::tracing::prelude::*;

/// Polls a device's status endpoint over plain HTTP.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
}

impl DeviceClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl StatusSource for DeviceClient {
    async fn fetch_status(&self, address: &DeviceAddress) -> PollOutcome {
        let response = match self.http.get(address.status_url().clone()).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(address, &e),
        };

        let status = response.status();
        if !status.is_success() {
            debug!(%address, status = status.as_u16(), "Device returned error status");
            return PollOutcome::HttpError(status.as_u16());
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return transport_failure(address, &e),
        };

        match MetricsSnapshot::from_json(&body) {
            Ok(metrics) => PollOutcome::Success(metrics),
            Err(e) => {
                debug!(%address, error = %e, "Device returned unusable body");
                PollOutcome::Malformed
            }
        }
    }
}

fn transport_failure(address: &DeviceAddress, error: &reqwest::Error) -> PollOutcome {
    if error.is_timeout() {
        debug!(%address, "Status request timed out");
        PollOutcome::Timeout
    } else {
        debug!(%address, error = %error, "Status request failed");
        PollOutcome::NetworkError
    }
}
