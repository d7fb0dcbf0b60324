//! The synchronous heart of a room session.
//!
//! [`SessionController`] owns every piece of session state: connection
//! state, watchdog, snapshot store, round result and dispatcher. Each input
//! (an inbound message, a timer firing, a user intent) is one method call
//! that runs to completion and leaves outbound frames and events queued for
//! the caller to drain. It never touches I/O or sleeps, so the ordering
//! rules can be exercised directly with any interleaving of inputs.

use std::mem;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dispatch::{ActionDispatcher, RoundFlags};
use crate::event::SessionEvent;
use crate::identity::ClientIdentity;
use crate::phase::{self, ConnectionState, EndVoteControl, Phase, RestartControl};
use crate::protocol::{ClientId, ClientMessage, RoomSnapshot, RoundEndEvent, ServerMessage};
use crate::round_result::{RoundResultController, TickOutcome, DEFAULT_COUNTDOWN, DEFAULT_TICK_INTERVAL};
use crate::store::RoomStateStore;
use crate::watchdog::{ConnectionWatchdog, DEFAULT_CONNECT_TIMEOUT};

/// Timing knobs of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerTimings {
    /// Time the channel has to open before the session fails.
    pub connect_timeout: Duration,
    /// Countdown ticks before a round result clears itself.
    pub round_result_countdown: u32,
    /// Spacing between countdown ticks.
    pub tick_interval: Duration,
}

impl Default for ControllerTimings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            round_result_countdown: DEFAULT_COUNTDOWN,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Everything the presentation layer needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub client_id: ClientId,
    pub display_name: String,
    pub phase: Phase,
    pub connection: ConnectionState,
    pub snapshot: Option<RoomSnapshot>,
    pub round_result: Option<RoundEndEvent>,
    /// Seconds left on the round result countdown.
    pub countdown: Option<u32>,
    pub flags: RoundFlags,
    /// Only present in [`Phase::GameOver`].
    pub restart: Option<RestartControl>,
    /// Only present in [`Phase::ActiveRound`].
    pub end_vote: Option<EndVoteControl>,
    pub is_host: bool,
}

/// User intents accepted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    StartGame,
    SubmitScore(String),
    VoteToEnd,
    VoteToRestart,
    /// Dismiss the round result before the countdown finishes.
    SkipRoundResult,
}

/// Session state machine. See the module docs.
#[derive(Debug)]
pub struct SessionController {
    identity: ClientIdentity,
    connection: ConnectionState,
    watchdog: ConnectionWatchdog,
    store: RoomStateStore,
    round: RoundResultController,
    dispatcher: ActionDispatcher,
    phase: Phase,
    outbound: Vec<ClientMessage>,
    events: Vec<SessionEvent>,
}

impl SessionController {
    /// Create a controller whose connection attempt started at `started`.
    pub fn new(identity: ClientIdentity, timings: ControllerTimings, started: Instant) -> Self {
        Self {
            identity,
            connection: ConnectionState::Connecting,
            watchdog: ConnectionWatchdog::arm(started, timings.connect_timeout),
            store: RoomStateStore::new(),
            round: RoundResultController::new(timings.round_result_countdown, timings.tick_interval),
            dispatcher: ActionDispatcher::new(),
            phase: Phase::Connecting,
            outbound: Vec::new(),
            events: Vec::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn store(&self) -> &RoomStateStore {
        &self.store
    }

    pub fn round_result(&self) -> &RoundResultController {
        &self.round
    }

    pub fn flags(&self) -> &RoundFlags {
        self.dispatcher.flags()
    }

    /// When the connection watchdog fires, while it is armed.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// When the round result countdown next ticks, while one is running.
    pub fn round_deadline(&self) -> Option<Instant> {
        self.round.deadline()
    }

    /// Whether the session reached a state it cannot leave.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.connection,
            ConnectionState::Closed | ConnectionState::TimedOut
        )
    }

    /// Frames waiting to be sent, oldest first.
    pub fn take_outbound(&mut self) -> Vec<ClientMessage> {
        mem::take(&mut self.outbound)
    }

    /// Events produced since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        mem::take(&mut self.events)
    }

    /// The restart control, derived from the current snapshot.
    pub fn restart_control(&self) -> Option<RestartControl> {
        self.store.snapshot().map(|s| {
            phase::restart_control(s, &self.identity.client_id, self.dispatcher.restart_voted())
        })
    }

    pub fn view(&self) -> SessionView {
        let snapshot = self.store.snapshot();
        SessionView {
            client_id: self.identity.client_id.clone(),
            display_name: self.identity.display_name.clone(),
            phase: self.phase,
            connection: self.connection,
            snapshot: snapshot.cloned(),
            round_result: self.round.event().cloned(),
            countdown: self.round.remaining(),
            flags: self.dispatcher.flags().clone(),
            restart: (self.phase == Phase::GameOver)
                .then(|| self.restart_control())
                .flatten(),
            end_vote: match (self.phase, snapshot) {
                (Phase::ActiveRound, Some(s)) => Some(phase::end_vote_control(
                    s,
                    self.dispatcher.flags().voted_to_end,
                )),
                _ => None,
            },
            is_host: self.store.is_host(&self.identity.client_id),
        }
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// The channel opened. Queues the `join` frame ahead of anything else.
    ///
    /// Returns `false` if the watchdog already fired; the caller must then
    /// close the late channel.
    pub fn on_open(&mut self) -> bool {
        if self.connection != ConnectionState::Connecting || !self.watchdog.disarm() {
            warn!("channel opened after the session failed; ignoring");
            return false;
        }
        self.connection = ConnectionState::Open;
        let join = self
            .dispatcher
            .join(&self.identity.display_name, &self.identity.avatar);
        self.outbound.insert(0, join);
        info!(client_id = %self.identity.client_id, "room channel open");
        self.events.push(SessionEvent::Connected);
        self.refresh_phase();
        true
    }

    /// The connection attempt failed before the channel opened.
    ///
    /// Nothing changes: the watchdog still decides when the session fails.
    pub fn on_connect_failed(&mut self, reason: &str) {
        warn!("connection attempt failed: {reason}");
    }

    /// The watchdog deadline may have passed.
    ///
    /// Returns `true` on the one call that moves the session to
    /// [`Phase::ConnectionError`].
    pub fn on_watchdog(&mut self, now: Instant) -> bool {
        if self.connection != ConnectionState::Connecting || !self.watchdog.expire(now) {
            return false;
        }
        warn!("room channel did not open in time");
        self.connection = ConnectionState::TimedOut;
        self.events.push(SessionEvent::ConnectionFailed);
        self.refresh_phase();
        true
    }

    /// The channel closed after being open.
    pub fn on_closed(&mut self) {
        if self.connection != ConnectionState::Open {
            return;
        }
        info!("room channel closed");
        self.connection = ConnectionState::Closed;
        self.round.skip_now();
        self.refresh_phase();
    }

    /// Stop all timers and mark the channel closed. Called on every
    /// teardown path; the final phase is [`Phase::ConnectionError`].
    pub fn teardown(&mut self) {
        self.watchdog.disarm();
        self.round.skip_now();
        if self.connection != ConnectionState::TimedOut {
            self.connection = ConnectionState::Closed;
        }
        self.outbound.clear();
        self.refresh_phase();
        debug!("session controller torn down");
    }

    // ── Inbound ─────────────────────────────────────────────────────

    pub fn handle_message(&mut self, msg: ServerMessage, now: Instant) {
        if self.connection != ConnectionState::Open {
            debug!("ignoring message on a channel that is not open");
            return;
        }
        match msg {
            ServerMessage::StateUpdate { data } => self.apply_snapshot(*data),
            ServerMessage::RoundEnd { data } => self.begin_round(*data, now),
            ServerMessage::PlayerLeft { client_id } => {
                info!(%client_id, "player left");
                self.events.push(SessionEvent::PlayerLeft { client_id });
            }
            ServerMessage::Error { message } => {
                warn!("server error: {message}");
                self.events.push(SessionEvent::ServerError { message });
            }
            ServerMessage::Unknown => {}
        }
        self.refresh_phase();
    }

    fn apply_snapshot(&mut self, snapshot: RoomSnapshot) {
        // Read the live flag: a round_end handled just before this snapshot
        // must keep the result view frozen.
        let showing_result = self.round.is_active();
        let fresh_round = snapshot
            .player(&self.identity.client_id)
            .is_some_and(|me| me.current_round_score.is_none());
        // The echo of our own end vote carries the same round number.
        let vote_is_stale = self
            .dispatcher
            .end_vote_round()
            .is_some_and(|round| round != snapshot.current_round);

        self.store.apply_snapshot(snapshot);
        self.events.push(SessionEvent::SnapshotUpdated);

        if !showing_result && fresh_round {
            self.dispatcher.reset_turn_flags();
        }
        if vote_is_stale {
            self.dispatcher.release_end_vote();
        }
    }

    fn begin_round(&mut self, event: RoundEndEvent, now: Instant) {
        info!(round = event.round_num, pot = event.pot, "round ended");
        let celebrate = event
            .detail_for(&self.identity.display_name)
            .is_some_and(|d| d.is_winner);
        self.dispatcher.record_round_end(event.events.clone(), celebrate);
        self.events
            .push(SessionEvent::RoundEnded(Box::new(event.clone())));
        self.round.begin_round(event, now);
    }

    // ── Timers ──────────────────────────────────────────────────────

    /// The round result countdown deadline may have passed.
    pub fn on_round_tick(&mut self, now: Instant) {
        match self.round.tick(now) {
            TickOutcome::Idle => {}
            TickOutcome::Counting { remaining } => {
                self.events.push(SessionEvent::Countdown { remaining });
            }
            TickOutcome::Finished => {
                debug!("round result countdown finished");
                self.finish_round_result();
            }
        }
    }

    fn finish_round_result(&mut self) {
        self.dispatcher.reset_round_flags();
        self.events.push(SessionEvent::RoundResultCleared);
        self.refresh_phase();
    }

    // ── User intents ────────────────────────────────────────────────

    pub fn handle_intent(&mut self, intent: Intent) {
        let open = self.connection == ConnectionState::Open;
        let frame = match intent {
            Intent::StartGame => self.dispatcher.start_game(open),
            Intent::SubmitScore(value) => self.dispatcher.submit_score(&value, open),
            Intent::VoteToEnd => {
                if self.phase != Phase::ActiveRound {
                    debug!(phase = %self.phase, "vote_end not available");
                    return;
                }
                let round = self.store.snapshot().map_or(0, |s| s.current_round);
                self.dispatcher.vote_to_end(round, open)
            }
            Intent::VoteToRestart => {
                if self.phase != Phase::GameOver
                    || !self.restart_control().is_some_and(RestartControl::is_enabled)
                {
                    debug!(phase = %self.phase, "vote_restart not available");
                    return;
                }
                self.dispatcher.vote_to_restart(open)
            }
            Intent::SkipRoundResult => {
                if self.round.skip_now() {
                    self.finish_round_result();
                }
                None
            }
        };
        if let Some(frame) = frame {
            self.outbound.push(frame);
        }
    }

    // ── Phase bookkeeping ───────────────────────────────────────────

    fn refresh_phase(&mut self) {
        let next = phase::resolve(self.connection, self.store.snapshot(), self.round.event());
        if next == self.phase {
            return;
        }
        let previous = mem::replace(&mut self.phase, next);
        match previous {
            Phase::GameOver => self.dispatcher.reset_restart_vote(),
            Phase::ActiveRound => self.dispatcher.release_end_vote(),
            _ => {}
        }
        debug!(from = %previous, to = %next, "phase changed");
        self.events.push(SessionEvent::PhaseChanged {
            from: previous,
            to: next,
        });
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
    use crate::protocol::{PlayerRoundDetail, PlayerView, StreakEvent, StreakKind};

    const ME: &str = "me";
    const HOST: &str = "host";

    fn identity() -> ClientIdentity {
        ClientIdentity::new(ClientId::new(ME), "Ann", "a.svg")
    }

    fn player(name: &str, host: bool, score: Option<f64>) -> PlayerView {
        PlayerView {
            name: name.into(),
            avatar: format!("{name}.svg"),
            is_host: host,
            total_score: 0.0,
            current_round_score: score,
            win_streak: 0,
            loss_streak: 0,
        }
    }

    fn snapshot(started: bool, over: bool, my_score: Option<f64>) -> RoomSnapshot {
        let mut s = RoomSnapshot {
            game_started: started,
            game_over: over,
            current_round: 1,
            total_rounds: 3,
            ..Default::default()
        };
        s.players
            .insert(ClientId::new(HOST), player("Hana", true, None));
        s.players
            .insert(ClientId::new(ME), player("Ann", false, my_score));
        s
    }

    fn state_update(s: RoomSnapshot) -> ServerMessage {
        ServerMessage::StateUpdate { data: Box::new(s) }
    }

    fn round_end(winner: &str) -> ServerMessage {
        let detail = |name: &str, is_winner: bool| PlayerRoundDetail {
            name: name.into(),
            avatar: String::new(),
            score_input: Some(if is_winner { 0.0 } else { 150.0 }),
            change: if is_winner { 150.0 } else { -150.0 },
            total: if is_winner { 150.0 } else { -150.0 },
            is_winner,
            win_streak: 0,
            loss_streak: 0,
        };
        ServerMessage::RoundEnd {
            data: Box::new(RoundEndEvent {
                round_num: 1,
                pot: 150.0,
                details: vec![detail("Ann", winner == "Ann"), detail("Hana", winner == "Hana")],
                events: Some(vec![StreakEvent {
                    kind: StreakKind::Comeback,
                    player: winner.into(),
                    streak: 3,
                }]),
            }),
        }
    }

    fn open_controller(start: Instant) -> SessionController {
        let mut ctl = SessionController::new(identity(), ControllerTimings::default(), start);
        assert!(ctl.on_open());
        ctl.take_outbound();
        ctl.take_events();
        ctl
    }

    #[test]
    fn open_queues_join_first() {
        let start = Instant::now();
        let mut ctl = SessionController::new(identity(), ControllerTimings::default(), start);
        ctl.handle_intent(Intent::StartGame);
        assert!(ctl.take_outbound().is_empty());

        assert!(ctl.on_open());
        assert_eq!(
            ctl.take_outbound(),
            vec![ClientMessage::Join {
                name: "Ann".into(),
                avatar: "a.svg".into()
            }]
        );
        assert_eq!(ctl.phase(), Phase::Loading);
        let events = ctl.take_events();
        assert_eq!(events.first(), Some(&SessionEvent::Connected));
    }

    #[test]
    fn watchdog_fires_once_and_blocks_late_open() {
        let start = Instant::now();
        let mut ctl = SessionController::new(identity(), ControllerTimings::default(), start);
        assert!(!ctl.on_watchdog(start + Duration::from_millis(4999)));
        assert!(ctl.on_watchdog(start + Duration::from_millis(5000)));
        assert!(!ctl.on_watchdog(start + Duration::from_millis(6000)));
        assert_eq!(ctl.phase(), Phase::ConnectionError);

        assert!(!ctl.on_open());
        assert_eq!(ctl.phase(), Phase::ConnectionError);
        let failures = ctl
            .take_events()
            .into_iter()
            .filter(|e| *e == SessionEvent::ConnectionFailed)
            .count();
        assert_eq!(failures, 1);
    }

    #[test]
    fn open_disarms_watchdog() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        assert!(ctl.watchdog_deadline().is_none());
        assert!(!ctl.on_watchdog(start + Duration::from_secs(10)));
        assert_eq!(ctl.phase(), Phase::Loading);
    }

    #[test]
    fn phases_follow_snapshots() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(false, false, None)), start);
        assert_eq!(ctl.phase(), Phase::Lobby);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        assert_eq!(ctl.phase(), Phase::ActiveRound);
        ctl.handle_message(state_update(snapshot(true, true, None)), start);
        assert_eq!(ctl.phase(), Phase::GameOver);
    }

    #[test]
    fn fresh_round_snapshot_clears_flags() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_intent(Intent::SubmitScore("40".into()));
        ctl.handle_intent(Intent::VoteToEnd);
        assert!(ctl.flags().turn_done);
        assert!(ctl.flags().voted_to_end);

        // Server echoes the submission: my score is set, nothing resets.
        ctl.handle_message(state_update(snapshot(true, false, Some(40.0))), start);
        assert!(ctl.flags().turn_done);

        // Next round begins for me.
        let mut next = snapshot(true, false, None);
        next.current_round = 2;
        ctl.handle_message(state_update(next), start);
        assert_eq!(ctl.flags(), &RoundFlags::default());
    }

    #[test]
    fn stale_snapshot_after_round_end_keeps_result() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_intent(Intent::SubmitScore("150".into()));

        ctl.handle_message(round_end("Hana"), start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);

        assert_eq!(ctl.phase(), Phase::RoundResult);
        assert!(ctl.flags().turn_done);
        assert_eq!(ctl.flags().events.len(), 1);
    }

    #[test]
    fn countdown_returns_to_active_round() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_message(round_end("Ann"), start);
        assert!(ctl.flags().celebrate);
        ctl.take_events();

        for second in 1..=4 {
            ctl.on_round_tick(start + Duration::from_secs(second));
            assert_eq!(ctl.phase(), Phase::RoundResult);
        }
        ctl.on_round_tick(start + Duration::from_secs(5));
        assert_eq!(ctl.phase(), Phase::ActiveRound);
        assert_eq!(ctl.flags(), &RoundFlags::default());

        let events = ctl.take_events();
        assert!(events.contains(&SessionEvent::Countdown { remaining: 1 }));
        assert!(events.contains(&SessionEvent::RoundResultCleared));
    }

    #[test]
    fn skip_reaches_same_state_as_countdown() {
        let start = Instant::now();
        let mut skipped = open_controller(start);
        let mut waited = open_controller(start);
        for ctl in [&mut skipped, &mut waited] {
            ctl.handle_message(state_update(snapshot(true, false, None)), start);
            ctl.handle_intent(Intent::SubmitScore("0".into()));
            ctl.handle_message(round_end("Ann"), start);
        }

        skipped.handle_intent(Intent::SkipRoundResult);
        for second in 1..=5 {
            waited.on_round_tick(start + Duration::from_secs(second));
        }

        assert_eq!(skipped.view(), waited.view());
        assert!(skipped.round_deadline().is_none());
    }

    #[test]
    fn end_vote_only_once_per_round() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_intent(Intent::VoteToEnd);
        ctl.handle_intent(Intent::VoteToEnd);
        assert_eq!(ctl.take_outbound(), vec![ClientMessage::VoteEnd]);
    }

    #[test]
    fn end_vote_survives_its_echo_snapshot() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_intent(Intent::VoteToEnd);

        let mut echo = snapshot(true, false, None);
        echo.votes_to_end = 1;
        ctl.handle_message(state_update(echo.clone()), start);
        assert!(ctl.flags().voted_to_end);
        ctl.handle_intent(Intent::VoteToEnd);
        assert_eq!(ctl.take_outbound(), vec![ClientMessage::VoteEnd]);

        // A snapshot for the next round re-arms the vote.
        echo.current_round = 2;
        ctl.handle_message(state_update(echo), start);
        assert!(!ctl.flags().voted_to_end);
        ctl.handle_intent(Intent::VoteToEnd);
        assert_eq!(ctl.take_outbound(), vec![ClientMessage::VoteEnd]);
    }

    #[test]
    fn leaving_active_round_rearms_end_vote() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_intent(Intent::VoteToEnd);
        ctl.handle_message(state_update(snapshot(true, true, None)), start);
        assert_eq!(ctl.phase(), Phase::GameOver);
        assert!(!ctl.flags().voted_to_end);
        assert_eq!(ctl.dispatcher.end_vote_round(), None);
    }

    #[test]
    fn end_vote_ignored_outside_active_round() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(false, false, None)), start);
        ctl.handle_intent(Intent::VoteToEnd);
        assert!(ctl.take_outbound().is_empty());
        assert!(!ctl.flags().voted_to_end);
    }

    #[test]
    fn guest_restart_waits_for_host() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, true, None)), start);
        assert_eq!(ctl.view().restart, Some(RestartControl::WaitingForHost));
        ctl.handle_intent(Intent::VoteToRestart);
        assert!(ctl.take_outbound().is_empty());

        let mut voted = snapshot(true, true, None);
        voted.restart_votes.insert(ClientId::new(HOST));
        ctl.handle_message(state_update(voted), start);
        assert_eq!(ctl.view().restart, Some(RestartControl::Enabled));
        ctl.handle_intent(Intent::VoteToRestart);
        ctl.handle_intent(Intent::VoteToRestart);
        assert_eq!(ctl.take_outbound(), vec![ClientMessage::VoteRestart]);
        assert!(matches!(
            ctl.view().restart,
            Some(RestartControl::AlreadyVoted { .. })
        ));
    }

    #[test]
    fn restart_vote_rearms_after_leaving_game_over() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        let mut voted = snapshot(true, true, None);
        voted.restart_votes.insert(ClientId::new(HOST));
        ctl.handle_message(state_update(voted.clone()), start);
        ctl.handle_intent(Intent::VoteToRestart);
        assert_eq!(ctl.take_outbound().len(), 1);

        // Everyone voted: the server resets to the lobby.
        ctl.handle_message(state_update(snapshot(false, false, None)), start);
        assert_eq!(ctl.phase(), Phase::Lobby);

        ctl.handle_message(state_update(voted), start);
        ctl.handle_intent(Intent::VoteToRestart);
        assert_eq!(ctl.take_outbound(), vec![ClientMessage::VoteRestart]);
    }

    #[test]
    fn close_is_terminal_and_cancels_countdown() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        ctl.handle_message(round_end("Ann"), start);
        ctl.on_closed();
        assert_eq!(ctl.phase(), Phase::ConnectionError);
        assert!(ctl.round_deadline().is_none());
        assert!(ctl.is_terminal());

        ctl.handle_intent(Intent::StartGame);
        assert!(ctl.take_outbound().is_empty());
    }

    #[test]
    fn side_messages_do_not_touch_state() {
        let start = Instant::now();
        let mut ctl = open_controller(start);
        ctl.handle_message(state_update(snapshot(true, false, None)), start);
        let before = ctl.view();
        ctl.take_events();

        ctl.handle_message(
            ServerMessage::PlayerLeft {
                client_id: ClientId::new(HOST),
            },
            start,
        );
        ctl.handle_message(
            ServerMessage::Error {
                message: "nope".into(),
            },
            start,
        );
        ctl.handle_message(ServerMessage::Unknown, start);

        assert_eq!(ctl.view(), before);
        assert_eq!(ctl.take_events().len(), 2);
    }

    #[test]
    fn teardown_stops_timers() {
        let start = Instant::now();
        let mut ctl = SessionController::new(identity(), ControllerTimings::default(), start);
        ctl.teardown();
        assert!(ctl.watchdog_deadline().is_none());
        assert!(ctl.round_deadline().is_none());
        assert_eq!(ctl.phase(), Phase::ConnectionError);
        assert!(!ctl.on_watchdog(start + Duration::from_secs(10)));
    }
}
