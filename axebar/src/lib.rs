//! Status monitor for Bitaxe mining devices.
//!
//! The library is the polling-and-reconciliation engine: it polls the
//! device's HTTP status endpoint on a timer, classifies every outcome into
//! a [`status::ConnectionState`], keeps a short hashrate history, and
//! rate-limits temperature alerts. Rendering, notification delivery and
//! configuration storage sit behind the traits in [`sink`] and
//! [`config`].

pub mod config;
pub mod device;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod sink;
pub mod status;
pub mod tracing;
pub mod types;
pub mod update;
