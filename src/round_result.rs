//! The transient "round just ended" view and its auto-advance countdown.
//!
//! The countdown is a single scheduled deadline owned by this controller. The
//! session loop sleeps until [`RoundResultController::deadline`] and calls
//! [`tick`](RoundResultController::tick); clearing the view drops the
//! deadline, so there is never more than one countdown alive.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::protocol::RoundEndEvent;

/// Default number of countdown ticks before the view clears itself.
pub const DEFAULT_COUNTDOWN: u32 = 5;

/// Default spacing between countdown ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct ActiveResult {
    event: RoundEndEvent,
    remaining: u32,
    next_tick: Instant,
}

/// Result of a countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No countdown was running, or its deadline has not been reached.
    Idle,
    /// The countdown moved on; `remaining` ticks are left.
    Counting { remaining: u32 },
    /// The countdown hit zero and the view was cleared.
    Finished,
}

/// Owns the active round result, if any, and its countdown.
#[derive(Debug, Clone)]
pub struct RoundResultController {
    active: Option<ActiveResult>,
    countdown: u32,
    tick_interval: Duration,
}

impl Default for RoundResultController {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN, DEFAULT_TICK_INTERVAL)
    }
}

impl RoundResultController {
    /// A controller whose countdown starts at `countdown` (at least 1) and
    /// ticks every `tick_interval`.
    pub fn new(countdown: u32, tick_interval: Duration) -> Self {
        Self {
            active: None,
            countdown: countdown.max(1),
            tick_interval,
        }
    }

    /// Show `event` and start a fresh countdown.
    ///
    /// The active flag is set before this returns, so a snapshot handled
    /// right after observes it. Any countdown already running is replaced.
    /// Returns `true` if a previous result was superseded.
    pub fn begin_round(&mut self, event: RoundEndEvent, now: Instant) -> bool {
        let superseded = self.active.is_some();
        if superseded {
            debug!("round result superseded by round {}", event.round_num);
        }
        self.active = Some(ActiveResult {
            event,
            remaining: self.countdown,
            next_tick: now + self.tick_interval,
        });
        superseded
    }

    /// Advance the countdown if its deadline has been reached.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let tick_interval = self.tick_interval;
        let Some(active) = self.active.as_mut() else {
            return TickOutcome::Idle;
        };
        if now < active.next_tick {
            return TickOutcome::Idle;
        }
        active.remaining = active.remaining.saturating_sub(1);
        if active.remaining == 0 {
            self.active = None;
            return TickOutcome::Finished;
        }
        active.next_tick += tick_interval;
        TickOutcome::Counting {
            remaining: active.remaining,
        }
    }

    /// Clear the view immediately, cancelling the countdown.
    ///
    /// Returns `true` if a result was showing.
    pub fn skip_now(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Whether a round result is currently showing.
    ///
    /// Always reflects the latest [`begin_round`](Self::begin_round), never a
    /// value captured earlier.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn event(&self) -> Option<&RoundEndEvent> {
        self.active.as_ref().map(|a| &a.event)
    }

    /// Ticks left before the view clears itself.
    pub fn remaining(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.remaining)
    }

    /// When the next tick is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.active.as_ref().map(|a| a.next_tick)
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

    fn event(round_num: u32) -> RoundEndEvent {
        RoundEndEvent {
            round_num,
            pot: 150.0,
            details: vec![],
            events: None,
        }
    }

    #[test]
    fn counts_down_once_per_interval_then_clears() {
        let start = Instant::now();
        let mut ctl = RoundResultController::default();
        assert!(!ctl.begin_round(event(1), start));
        assert!(ctl.is_active());
        assert_eq!(ctl.remaining(), Some(5));

        for (second, left) in (1..5u64).zip([4, 3, 2, 1]) {
            let at = start + Duration::from_secs(second);
            assert_eq!(ctl.deadline(), Some(at));
            assert_eq!(ctl.tick(at), TickOutcome::Counting { remaining: left });
        }
        assert_eq!(ctl.tick(start + Duration::from_secs(5)), TickOutcome::Finished);
        assert!(!ctl.is_active());
        assert!(ctl.deadline().is_none());
        assert!(ctl.event().is_none());
    }

    #[test]
    fn early_tick_is_ignored() {
        let start = Instant::now();
        let mut ctl = RoundResultController::default();
        ctl.begin_round(event(1), start);
        assert_eq!(ctl.tick(start + Duration::from_millis(500)), TickOutcome::Idle);
        assert_eq!(ctl.remaining(), Some(5));
    }

    #[test]
    fn skip_matches_countdown_end_state() {
        let start = Instant::now();
        let mut counted = RoundResultController::default();
        counted.begin_round(event(1), start);
        for second in 1..=5 {
            counted.tick(start + Duration::from_secs(second));
        }

        let mut skipped = RoundResultController::default();
        skipped.begin_round(event(1), start);
        assert!(skipped.skip_now());

        assert_eq!(counted.is_active(), skipped.is_active());
        assert_eq!(counted.deadline(), skipped.deadline());
        assert_eq!(counted.remaining(), skipped.remaining());
        assert!(!skipped.skip_now());
    }

    #[test]
    fn new_round_replaces_running_countdown() {
        let start = Instant::now();
        let mut ctl = RoundResultController::default();
        ctl.begin_round(event(1), start);
        ctl.tick(start + Duration::from_secs(1));
        ctl.tick(start + Duration::from_secs(2));

        let later = start + Duration::from_millis(2500);
        assert!(ctl.begin_round(event(2), later));
        assert_eq!(ctl.event().unwrap().round_num, 2);
        assert_eq!(ctl.remaining(), Some(5));
        assert_eq!(ctl.deadline(), Some(later + Duration::from_secs(1)));
    }

    #[test]
    fn zero_countdown_is_clamped() {
        let start = Instant::now();
        let mut ctl = RoundResultController::new(0, Duration::from_millis(10));
        ctl.begin_round(event(1), start);
        assert_eq!(ctl.tick(start + Duration::from_millis(10)), TickOutcome::Finished);
    }

    #[test]
    fn tick_without_result_is_idle() {
        let mut ctl = RoundResultController::default();
        assert_eq!(ctl.tick(Instant::now()), TickOutcome::Idle);
    }
}
