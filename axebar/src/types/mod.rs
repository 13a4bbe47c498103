//! Small stateful building blocks used by the scheduler.

mod alert_gate;
mod history;

pub use alert_gate::{AlertCategory, AlertGate};
pub use history::HistoryBuffer;
