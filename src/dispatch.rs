//! Turns user intents into outbound frames.
//!
//! The dispatcher also owns the ephemeral per-round flags that those intents
//! set optimistically. Every method takes `channel_open`; when the channel is
//! not open the intent is discarded and no flag changes.

use serde::Serialize;
use tracing::debug;

use crate::protocol::{ClientMessage, StreakEvent};

/// Local UI state that lives for one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundFlags {
    /// The local player submitted a score for the current round.
    pub turn_done: bool,
    /// Streak cues from the most recent round result.
    pub events: Vec<StreakEvent>,
    /// The local player won the most recent round.
    pub celebrate: bool,
    /// The local player voted to end the game this round.
    pub voted_to_end: bool,
}

/// Builds outbound frames and enforces one-shot votes.
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher {
    flags: RoundFlags,
    /// Round the end vote was cast in.
    end_vote_round: Option<u32>,
    restart_voted: bool,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `join` frame. Sent by the controller as soon as the channel opens.
    pub fn join(&self, name: &str, avatar: &str) -> ClientMessage {
        ClientMessage::Join {
            name: name.to_string(),
            avatar: avatar.to_string(),
        }
    }

    /// Ask the server to start the game. Host-only is enforced server-side.
    pub fn start_game(&self, channel_open: bool) -> Option<ClientMessage> {
        if !channel_open {
            debug!("start_game discarded: channel not open");
            return None;
        }
        Some(ClientMessage::StartGame)
    }

    /// Submit a score and optimistically mark the local turn as done.
    ///
    /// Blank input is a no-op.
    pub fn submit_score(&mut self, value: &str, channel_open: bool) -> Option<ClientMessage> {
        let score = value.trim();
        if score.is_empty() {
            debug!("submit_score ignored: empty input");
            return None;
        }
        if !channel_open {
            debug!("submit_score discarded: channel not open");
            return None;
        }
        self.flags.turn_done = true;
        Some(ClientMessage::SubmitScore {
            score: score.to_string(),
        })
    }

    /// Vote to end the game during `round`. Only the first call per round
    /// produces a frame.
    pub fn vote_to_end(&mut self, round: u32, channel_open: bool) -> Option<ClientMessage> {
        if self.flags.voted_to_end {
            debug!("vote_end already sent this round");
            return None;
        }
        if !channel_open {
            debug!("vote_end discarded: channel not open");
            return None;
        }
        self.flags.voted_to_end = true;
        self.end_vote_round = Some(round);
        Some(ClientMessage::VoteEnd)
    }

    /// Vote to restart. Only the first call per game-over produces a frame.
    pub fn vote_to_restart(&mut self, channel_open: bool) -> Option<ClientMessage> {
        if self.restart_voted {
            debug!("vote_restart already sent");
            return None;
        }
        if !channel_open {
            debug!("vote_restart discarded: channel not open");
            return None;
        }
        self.restart_voted = true;
        Some(ClientMessage::VoteRestart)
    }

    pub fn flags(&self) -> &RoundFlags {
        &self.flags
    }

    /// Record the cues of a round that just ended.
    ///
    /// A round end without a cue list keeps the previous cues.
    pub fn record_round_end(&mut self, events: Option<Vec<StreakEvent>>, celebrate: bool) {
        if let Some(events) = events {
            self.flags.events = events;
        }
        if celebrate {
            self.flags.celebrate = true;
        }
    }

    /// Clear every per-round flag, the end vote included.
    pub fn reset_round_flags(&mut self) {
        self.flags = RoundFlags::default();
        self.end_vote_round = None;
    }

    /// Clear the turn, cue and celebration flags but keep the end vote.
    pub fn reset_turn_flags(&mut self) {
        self.flags = RoundFlags {
            voted_to_end: self.flags.voted_to_end,
            ..RoundFlags::default()
        };
    }

    /// The round the end vote was cast in, if one was.
    pub fn end_vote_round(&self) -> Option<u32> {
        self.end_vote_round
    }

    /// Re-arm the end-vote one-shot.
    pub fn release_end_vote(&mut self) {
        self.flags.voted_to_end = false;
        self.end_vote_round = None;
    }

    pub fn restart_voted(&self) -> bool {
        self.restart_voted
    }

    /// Re-arm the restart one-shot once the game-over phase is left.
    pub fn reset_restart_vote(&mut self) {
        self.restart_voted = false;
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
    use crate::protocol::StreakKind;

    #[test]
    fn join_carries_identity() {
        let dispatcher = ActionDispatcher::new();
        assert_eq!(
            dispatcher.join("Ann", "a.svg"),
            ClientMessage::Join {
                name: "Ann".into(),
                avatar: "a.svg".into()
            }
        );
    }

    #[test]
    fn blank_score_is_a_no_op() {
        let mut dispatcher = ActionDispatcher::new();
        assert!(dispatcher.submit_score("", true).is_none());
        assert!(dispatcher.submit_score("   ", true).is_none());
        assert!(!dispatcher.flags().turn_done);
    }

    #[test]
    fn submit_sets_turn_done_optimistically() {
        let mut dispatcher = ActionDispatcher::new();
        let msg = dispatcher.submit_score(" 50 ", true).unwrap();
        assert_eq!(msg, ClientMessage::SubmitScore { score: "50".into() });
        assert!(dispatcher.flags().turn_done);
    }

    #[test]
    fn closed_channel_discards_without_side_effects() {
        let mut dispatcher = ActionDispatcher::new();
        assert!(dispatcher.start_game(false).is_none());
        assert!(dispatcher.submit_score("10", false).is_none());
        assert!(dispatcher.vote_to_end(1, false).is_none());
        assert!(dispatcher.vote_to_restart(false).is_none());
        assert_eq!(dispatcher.flags(), &RoundFlags::default());
        assert!(!dispatcher.restart_voted());

        // The vote is still available once the channel opens.
        assert!(dispatcher.vote_to_end(1, true).is_some());
        assert_eq!(dispatcher.end_vote_round(), Some(1));
    }

    #[test]
    fn end_vote_is_one_shot_until_round_reset() {
        let mut dispatcher = ActionDispatcher::new();
        assert_eq!(dispatcher.vote_to_end(2, true), Some(ClientMessage::VoteEnd));
        assert!(dispatcher.vote_to_end(2, true).is_none());
        assert!(dispatcher.vote_to_end(2, true).is_none());

        dispatcher.reset_round_flags();
        assert_eq!(dispatcher.end_vote_round(), None);
        assert_eq!(dispatcher.vote_to_end(3, true), Some(ClientMessage::VoteEnd));
    }

    #[test]
    fn turn_reset_keeps_end_vote() {
        let mut dispatcher = ActionDispatcher::new();
        dispatcher.submit_score("10", true);
        dispatcher.vote_to_end(1, true);

        dispatcher.reset_turn_flags();
        assert!(!dispatcher.flags().turn_done);
        assert!(dispatcher.flags().voted_to_end);
        assert!(dispatcher.vote_to_end(1, true).is_none());

        dispatcher.release_end_vote();
        assert_eq!(dispatcher.end_vote_round(), None);
        assert_eq!(dispatcher.vote_to_end(1, true), Some(ClientMessage::VoteEnd));
    }

    #[test]
    fn restart_vote_is_one_shot_until_rearmed() {
        let mut dispatcher = ActionDispatcher::new();
        assert_eq!(dispatcher.vote_to_restart(true), Some(ClientMessage::VoteRestart));
        assert!(dispatcher.vote_to_restart(true).is_none());

        // A round reset does not touch the restart vote.
        dispatcher.reset_round_flags();
        assert!(dispatcher.vote_to_restart(true).is_none());

        dispatcher.reset_restart_vote();
        assert!(dispatcher.vote_to_restart(true).is_some());
    }

    #[test]
    fn round_end_records_cues() {
        let mut dispatcher = ActionDispatcher::new();
        let cue = StreakEvent {
            kind: StreakKind::WinStreak,
            player: "Ann".into(),
            streak: 3,
        };
        dispatcher.record_round_end(Some(vec![cue.clone()]), true);
        assert_eq!(dispatcher.flags().events, vec![cue.clone()]);
        assert!(dispatcher.flags().celebrate);

        // No cue list on the next round end: the last cues stay.
        dispatcher.record_round_end(None, false);
        assert_eq!(dispatcher.flags().events, vec![cue]);
        dispatcher.record_round_end(Some(Vec::new()), false);
        assert!(dispatcher.flags().events.is_empty());
        dispatcher.record_round_end(None, true);

        dispatcher.reset_round_flags();
        assert!(dispatcher.flags().events.is_empty());
        assert!(!dispatcher.flags().celebrate);
    }
}
