//! Phase derivation for the room view.
//!
//! [`resolve`] is a pure function from connection state, the latest snapshot
//! and the active round result to exactly one [`Phase`]. The control helpers
//! below derive what the presentation layer may offer in a given phase.

use std::fmt;

use serde::Serialize;

use crate::protocol::{ClientId, RoomSnapshot, RoundEndEvent};

/// Lifecycle of the room channel as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// The connection attempt is in flight.
    Connecting,
    /// The channel is open.
    Open,
    /// The channel closed after being open. There is no reconnect.
    Closed,
    /// The watchdog expired before the channel opened.
    TimedOut,
}

/// The single displayable phase of a room visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Connecting,
    ConnectionError,
    /// Connected, no snapshot received yet.
    Loading,
    Lobby,
    GameOver,
    RoundResult,
    ActiveRound,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::ConnectionError => "connection_error",
            Self::Loading => "loading",
            Self::Lobby => "lobby",
            Self::GameOver => "game_over",
            Self::RoundResult => "round_result",
            Self::ActiveRound => "active_round",
        };
        f.write_str(name)
    }
}

/// Compute the current phase. Checked in priority order; the first match wins.
pub fn resolve(
    connection: ConnectionState,
    snapshot: Option<&RoomSnapshot>,
    round_result: Option<&RoundEndEvent>,
) -> Phase {
    match connection {
        ConnectionState::TimedOut | ConnectionState::Closed => return Phase::ConnectionError,
        ConnectionState::Connecting => return Phase::Connecting,
        ConnectionState::Open => {}
    }
    let Some(snapshot) = snapshot else {
        return Phase::Loading;
    };
    if !snapshot.game_started {
        Phase::Lobby
    } else if snapshot.game_over {
        Phase::GameOver
    } else if round_result.is_some() {
        Phase::RoundResult
    } else {
        Phase::ActiveRound
    }
}

/// State of the restart control on the game-over screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RestartControl {
    /// The local player may vote to restart.
    Enabled,
    /// Disabled until the host votes; rendered as "waiting for host".
    WaitingForHost,
    /// The local vote is in; rendered as "waiting for others".
    AlreadyVoted { votes: usize, players: usize },
}

impl RestartControl {
    /// Whether pressing the control should send a frame.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Derive the restart control for `me` purely from the snapshot.
///
/// `voted_locally` covers the window between sending the vote and the next
/// snapshot echoing it back.
pub fn restart_control(snapshot: &RoomSnapshot, me: &ClientId, voted_locally: bool) -> RestartControl {
    if voted_locally || snapshot.restart_votes.contains(me) {
        return RestartControl::AlreadyVoted {
            votes: snapshot.restart_votes.len(),
            players: snapshot.players.len(),
        };
    }
    let i_am_host = snapshot.host_id() == Some(me);
    if i_am_host || snapshot.host_voted_restart() {
        RestartControl::Enabled
    } else {
        RestartControl::WaitingForHost
    }
}

/// State of the vote-to-end control during an active round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndVoteControl {
    /// Whether the control is still offered to the local player.
    pub available: bool,
    /// `(votes, players)` when at least one vote has been cast.
    pub tally: Option<(u32, usize)>,
}

/// Derive the vote-to-end control from the snapshot and the local one-shot.
pub fn end_vote_control(snapshot: &RoomSnapshot, voted_locally: bool) -> EndVoteControl {
    let tally = (snapshot.votes_to_end > 0)
        .then(|| (snapshot.votes_to_end, snapshot.players.len()));
    EndVoteControl {
        available: !voted_locally,
        tally,
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
    use crate::protocol::PlayerView;

    fn view(name: &str, host: bool) -> PlayerView {
        PlayerView {
            name: name.into(),
            avatar: String::new(),
            is_host: host,
            total_score: 0.0,
            current_round_score: None,
            win_streak: 0,
            loss_streak: 0,
        }
    }

    fn game_over_room() -> RoomSnapshot {
        let mut snapshot = RoomSnapshot {
            game_started: true,
            game_over: true,
            ..Default::default()
        };
        snapshot.players.insert(ClientId::new("host"), view("Hana", true));
        snapshot.players.insert(ClientId::new("guest"), view("Gus", false));
        snapshot
    }

    fn round_event() -> RoundEndEvent {
        RoundEndEvent {
            round_num: 1,
            pot: 10.0,
            details: vec![],
            events: None,
        }
    }

    #[test]
    fn connection_states_take_priority() {
        let room = game_over_room();
        let event = round_event();
        assert_eq!(
            resolve(ConnectionState::TimedOut, Some(&room), Some(&event)),
            Phase::ConnectionError
        );
        assert_eq!(
            resolve(ConnectionState::Closed, Some(&room), None),
            Phase::ConnectionError
        );
        assert_eq!(
            resolve(ConnectionState::Connecting, Some(&room), None),
            Phase::Connecting
        );
        assert_eq!(resolve(ConnectionState::Open, None, Some(&event)), Phase::Loading);
    }

    #[test]
    fn snapshot_flags_resolve_in_order() {
        let event = round_event();
        let mut room = RoomSnapshot::default();
        assert_eq!(resolve(ConnectionState::Open, Some(&room), Some(&event)), Phase::Lobby);

        room.game_started = true;
        assert_eq!(resolve(ConnectionState::Open, Some(&room), None), Phase::ActiveRound);
        assert_eq!(
            resolve(ConnectionState::Open, Some(&room), Some(&event)),
            Phase::RoundResult
        );

        room.game_over = true;
        assert_eq!(resolve(ConnectionState::Open, Some(&room), Some(&event)), Phase::GameOver);
    }

    #[test]
    fn guest_waits_for_host_before_restart() {
        let mut room = game_over_room();
        let guest = ClientId::new("guest");
        assert_eq!(
            restart_control(&room, &guest, false),
            RestartControl::WaitingForHost
        );
        assert!(!restart_control(&room, &guest, false).is_enabled());

        room.restart_votes.insert(ClientId::new("host"));
        assert_eq!(restart_control(&room, &guest, false), RestartControl::Enabled);
    }

    #[test]
    fn host_can_always_vote_first() {
        let room = game_over_room();
        assert_eq!(
            restart_control(&room, &ClientId::new("host"), false),
            RestartControl::Enabled
        );
    }

    #[test]
    fn own_vote_shows_tally() {
        let mut room = game_over_room();
        room.restart_votes.insert(ClientId::new("host"));
        room.restart_votes.insert(ClientId::new("guest"));
        assert_eq!(
            restart_control(&room, &ClientId::new("guest"), false),
            RestartControl::AlreadyVoted { votes: 2, players: 2 }
        );
    }

    #[test]
    fn end_vote_tally_only_when_votes_cast() {
        let mut room = game_over_room();
        let control = end_vote_control(&room, false);
        assert!(control.available);
        assert!(control.tally.is_none());

        room.votes_to_end = 1;
        let control = end_vote_control(&room, true);
        assert!(!control.available);
        assert_eq!(control.tally, Some((1, 2)));
    }
}
