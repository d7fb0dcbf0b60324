//! Connection watchdog.
//!
//! Armed when the connection attempt starts. Either the channel opens first
//! and the watchdog is disarmed for good, or the deadline passes and it fires
//! exactly once. Both outcomes are terminal.

use std::time::Duration;

use tokio::time::Instant;

/// Default time allowed for the channel to open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchdogState {
    Armed { deadline: Instant },
    Disarmed,
    Fired,
}

/// Deadline tracker for the connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectionWatchdog {
    state: WatchdogState,
}

impl ConnectionWatchdog {
    /// Arm a watchdog that expires `timeout` after `started`.
    pub fn arm(started: Instant, timeout: Duration) -> Self {
        Self {
            state: WatchdogState::Armed {
                deadline: started + timeout,
            },
        }
    }

    /// The instant at which the watchdog fires, while it is still armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            WatchdogState::Armed { deadline } => Some(deadline),
            WatchdogState::Disarmed | WatchdogState::Fired => None,
        }
    }

    /// Cancel the watchdog because the channel opened.
    ///
    /// Returns `false` if the watchdog had already fired; the open is then
    /// too late and must be ignored.
    pub fn disarm(&mut self) -> bool {
        match self.state {
            WatchdogState::Armed { .. } => {
                self.state = WatchdogState::Disarmed;
                true
            }
            WatchdogState::Disarmed => true,
            WatchdogState::Fired => false,
        }
    }

    /// Fire if armed and `now` has reached the deadline.
    ///
    /// Returns `true` only on the call that performs the transition.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.state {
            WatchdogState::Armed { deadline } if now >= deadline => {
                self.state = WatchdogState::Fired;
                true
            }
            _ => false,
        }
    }

    /// Whether the watchdog has fired.
    pub fn has_fired(&self) -> bool {
        self.state == WatchdogState::Fired
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_at_deadline() {
        let start = Instant::now();
        let mut watchdog = ConnectionWatchdog::arm(start, DEFAULT_CONNECT_TIMEOUT);

        assert!(!watchdog.expire(start + Duration::from_millis(4999)));
        assert!(watchdog.expire(start + Duration::from_millis(5000)));
        assert!(!watchdog.expire(start + Duration::from_millis(9000)));
        assert!(watchdog.has_fired());
        assert!(watchdog.deadline().is_none());
    }

    #[test]
    fn open_before_deadline_suppresses_forever() {
        let start = Instant::now();
        let mut watchdog = ConnectionWatchdog::arm(start, DEFAULT_CONNECT_TIMEOUT);

        assert!(watchdog.disarm());
        assert!(!watchdog.expire(start + Duration::from_secs(60)));
        assert!(!watchdog.has_fired());
    }

    #[test]
    fn open_after_firing_is_rejected() {
        let start = Instant::now();
        let mut watchdog = ConnectionWatchdog::arm(start, Duration::from_millis(10));
        assert!(watchdog.expire(start + Duration::from_millis(10)));
        assert!(!watchdog.disarm());
        assert!(watchdog.has_fired());
    }
}
