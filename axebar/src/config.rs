//! Monitor configuration and the device address source.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Overrides the file-backed device address.
pub const DEVICE_ENV: &str = "AXEBAR_DEVICE";

/// Overrides the location of the address file.
pub const ADDRESS_FILE_ENV: &str = "AXEBAR_ADDRESS_FILE";

/// Longest tick period accepted, background multiplier included.
pub const MAX_POLL_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Temperatures at or above which a reading is "hot" and may raise an alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub asic_temp_c: f64,
    pub vr_temp_c: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            asic_temp_c: 65.0,
            vr_temp_c: 80.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Tick period while the host application is in the foreground.
    pub poll_interval: Duration,

    /// Factor applied to `poll_interval` while in the background.
    pub background_multiplier: u32,

    /// Upper bound on one status request, connect through body.
    pub request_timeout: Duration,

    /// Number of hashrate samples kept for the trend line.
    pub history_capacity: usize,

    pub thresholds: AlertThresholds,

    /// Minimum time between two alerts of the same category.
    pub alert_cooldown: Duration,

    pub update_check_interval: Duration,

    /// Upper bound on one "is it outdated" query.
    pub update_check_timeout: Duration,

    /// Upper bound on installing an update. Hitting it kills the package
    /// manager, so it is far longer than `update_check_timeout`.
    pub upgrade_timeout: Duration,

    /// How long the "Updated Successfully" state is shown before relaunch.
    pub update_confirmation: Duration,

    /// Package name queried for updates.
    pub update_package: String,

    /// Raw `hashRate` is divided by this for display (GH/s to TH/s).
    pub hashrate_divisor: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            background_multiplier: 2,
            request_timeout: Duration::from_secs(10),
            history_capacity: 30,
            thresholds: AlertThresholds::default(),
            alert_cooldown: Duration::from_secs(300),
            update_check_interval: Duration::from_secs(4 * 60 * 60),
            update_check_timeout: Duration::from_secs(120),
            upgrade_timeout: Duration::from_secs(30 * 60),
            update_confirmation: Duration::from_secs(2),
            update_package: "axebar".to_string(),
            hashrate_divisor: 1000.0,
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by `AXEBAR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `AXEBAR_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "AXEBAR_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AXEBAR_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(temp) = parse_var(&lookup, "AXEBAR_ASIC_TEMP_C")? {
            config.thresholds.asic_temp_c = temp;
        }
        if let Some(temp) = parse_var(&lookup, "AXEBAR_VR_TEMP_C")? {
            config.thresholds.vr_temp_c = temp;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AXEBAR_ALERT_COOLDOWN_SECS")? {
            config.alert_cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AXEBAR_UPDATE_INTERVAL_SECS")? {
            config.update_check_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "AXEBAR_UPGRADE_TIMEOUT_SECS")? {
            config.upgrade_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_var(&lookup, "AXEBAR_HISTORY_CAPACITY")? {
            config.history_capacity = capacity;
        }
        if let Some(package) = lookup("AXEBAR_UPDATE_PACKAGE") {
            config.update_package = package;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the timers and buffers cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".into()));
        }
        if self.background_multiplier == 0 {
            return Err(Error::Config(
                "background multiplier must be non-zero".into(),
            ));
        }
        match self
            .poll_interval
            .checked_mul(self.background_multiplier)
        {
            Some(period) if period <= MAX_POLL_PERIOD => {}
            _ => {
                return Err(Error::Config(format!(
                    "background poll period must be at most {}s",
                    MAX_POLL_PERIOD.as_secs()
                )));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be non-zero".into()));
        }
        if self.update_check_interval.is_zero() {
            return Err(Error::Config(
                "update check interval must be non-zero".into(),
            ));
        }
        if self.update_check_timeout.is_zero() || self.upgrade_timeout.is_zero() {
            return Err(Error::Config("update timeouts must be non-zero".into()));
        }
        if self.history_capacity == 0 {
            return Err(Error::Config("history capacity must be non-zero".into()));
        }
        if !(self.hashrate_divisor.is_finite() && self.hashrate_divisor > 0.0) {
            return Err(Error::Config("hashrate divisor must be positive".into()));
        }
        if self.update_package.trim().is_empty() {
            return Err(Error::Config("update package name is empty".into()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
    }
}

/// Where the engine reads the configured device address from.
///
/// Called at the start of every poll, so edits take effect on the next
/// tick. `None` means unconfigured.
pub trait AddressSource: Send + Sync {
    fn address(&self) -> Option<String>;
}

/// Device address kept in memory and editable at runtime.
#[derive(Debug, Clone, Default)]
pub struct SharedAddress(Arc<RwLock<Option<String>>>);

impl SharedAddress {
    pub fn new(address: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(address)))
    }

    pub fn set(&self, address: Option<String>) {
        *self.0.write() = address;
    }
}

impl AddressSource for SharedAddress {
    fn address(&self) -> Option<String> {
        self.0.read().clone()
    }
}

/// Device address persisted as a one-line file.
#[derive(Debug, Clone)]
pub struct FileAddressStore {
    path: PathBuf,
}

impl FileAddressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `AXEBAR_ADDRESS_FILE`, or `device` in the platform config
    /// directory.
    pub fn from_env_or_default() -> Result<Self> {
        if let Some(path) = std::env::var_os(ADDRESS_FILE_ENV) {
            return Ok(Self::new(path));
        }

        let dirs = directories::ProjectDirs::from("com", "bitaxe", "axebar")
            .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
        Ok(Self::new(dirs.config_dir().join("device")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `address`, or forget it when `None`.
    pub fn set(&self, address: Option<&str>) -> Result<()> {
        match address.map(str::trim).filter(|a| !a.is_empty()) {
            Some(address) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, format!("{address}\n"))?;
            }
            None => match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

impl AddressSource for FileAddressStore {
    fn address(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let address = contents.trim();
                (!address.is_empty()).then(|| address.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read device address");
                None
            }
        }
    }
}

/// `AXEBAR_DEVICE` if set, otherwise the wrapped source.
#[derive(Debug, Clone)]
pub struct EnvOverride<S> {
    inner: S,
}

impl<S> EnvOverride<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: AddressSource> AddressSource for EnvOverride<S> {
    fn address(&self) -> Option<String> {
        std::env::var(DEVICE_ENV)
            .ok()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| self.inner.address())
    }
}
