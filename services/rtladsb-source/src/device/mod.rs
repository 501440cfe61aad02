//! Device sessions and their state

mod session;
mod state;

pub use session::{DeviceSession, SessionCommand, SessionEvent};
pub use state::{DeviceStats, SessionState, StopReason};
