//! Connection state and its display form.

mod connection;
mod display;

pub use connection::ConnectionState;
pub use display::{DisplayStrings, HOT_MARKER, MISSING, Severity};
