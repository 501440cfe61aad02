//! Per-device counters and session lifecycle state

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for a single device
#[derive(Debug, Default)]
pub struct DeviceStats {
    pub lines_read: AtomicU64,
    pub messages_decoded: AtomicU64,
    pub messages_sent: AtomicU64,
    pub crc_errors: AtomicU64,
    pub malformed_lines: AtomicU64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.messages_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crc_error(&self) {
        self.crc_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_lines(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn get_decoded(&self) -> u64 {
        self.messages_decoded.load(Ordering::Relaxed)
    }

    pub fn get_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn get_crc_errors(&self) -> u64 {
        self.crc_errors.load(Ordering::Relaxed)
    }

    pub fn get_malformed(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }
}

impl fmt::Display for DeviceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lines: {} | Decoded: {} | Sent: {} | CRC errors: {} | Malformed: {}",
            self.get_lines(),
            self.get_decoded(),
            self.get_sent(),
            self.get_crc_errors(),
            self.get_malformed()
        )
    }
}

/// Why a running decoder is being stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Settings changed; the decoder is relaunched afterwards
    Reconfigure,
    /// Shutdown requested by the owner
    Shutdown,
    /// The decoder's output ended without being asked to
    ProcessExited,
}

/// Lifecycle of one decoder session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping(StopReason),
    Restarting,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_enter(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Stopping(_))
                | (Stopping(StopReason::Reconfigure), Restarting)
                | (Stopping(_), Idle)
                | (Restarting, Running)
                | (Restarting, Idle)
        )
    }

    /// Only an exit nobody asked for is reported upstream
    pub fn is_unexpected_stop(&self) -> bool {
        matches!(self, SessionState::Stopping(StopReason::ProcessExited))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Running => f.write_str("running"),
            SessionState::Stopping(reason) => write!(f, "stopping ({:?})", reason),
            SessionState::Restarting => f.write_str("restarting"),
        }
    }
}
