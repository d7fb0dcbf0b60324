//! Wire-compatible protocol types for the pot room server.
//!
//! Inbound frames are JSON objects tagged by `type`, outbound frames are
//! tagged by `action`. Field names follow the server's snake_case format;
//! the Rust names differ only where the wire name is ambiguous (`votes` is
//! exposed as [`RoomSnapshot::votes_to_end`]).

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ── Identifiers ─────────────────────────────────────────────────────

/// Stable per-session client identifier.
///
/// Freshly generated identifiers are UUID v4 strings, but the server treats
/// the id as an opaque path segment, so any string round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── Enums ───────────────────────────────────────────────────────────

/// Kind of streak cue attached to a round result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    /// A player on a losing streak of three or more won the round.
    Comeback,
    /// A player has won three or more rounds in a row.
    WinStreak,
    /// A player has lost three or more rounds in a row.
    LossStreak,
}

// ── Structs ─────────────────────────────────────────────────────────

/// Decode a missing or `null` field as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One player's entry in a room snapshot.
///
/// The server stores whatever the player joined with, so `name` and
/// `avatar` may arrive as `null`; both decode as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub total_score: f64,
    /// `None` until the player submits for the round in progress.
    #[serde(default)]
    pub current_round_score: Option<f64>,
    #[serde(default)]
    pub win_streak: u32,
    #[serde(default)]
    pub loss_streak: u32,
}

impl PlayerView {
    /// Whether this player has submitted a score for the round in progress.
    pub fn has_submitted(&self) -> bool {
        self.current_round_score.is_some()
    }
}

/// Per-player outcome of a finished round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRoundDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar: String,
    /// The raw score the player submitted (zero for an implicit winner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_input: Option<f64>,
    /// Signed change applied to the running total this round.
    pub change: f64,
    /// Running total after the round.
    pub total: f64,
    pub is_winner: bool,
    #[serde(default)]
    pub win_streak: u32,
    #[serde(default)]
    pub loss_streak: u32,
}

/// Streak cue produced by the server when a round ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakEvent {
    #[serde(rename = "type")]
    pub kind: StreakKind,
    pub player: String,
    pub streak: u32,
}

/// Transient payload of a `round_end` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEndEvent {
    pub round_num: u32,
    pub pot: f64,
    pub details: Vec<PlayerRoundDetail>,
    /// Streak cues. `None` when the server sent no cue list at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<StreakEvent>>,
}

impl RoundEndEvent {
    /// The streak cues of this round, empty when none were sent.
    pub fn cues(&self) -> &[StreakEvent] {
        self.events.as_deref().unwrap_or_default()
    }

    /// The detail row for the player shown under `name`, if any.
    pub fn detail_for(&self, name: &str) -> Option<&PlayerRoundDetail> {
        self.details.iter().find(|d| d.name == name)
    }

    /// Names of all winners of this round.
    pub fn winners(&self) -> impl Iterator<Item = &str> {
        self.details
            .iter()
            .filter(|d| d.is_winner)
            .map(|d| d.name.as_str())
    }
}

/// Archived round inside [`RoomSnapshot::history`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_num: u32,
    #[serde(default)]
    pub pot: f64,
    pub details: Vec<PlayerRoundDetail>,
    #[serde(default)]
    pub events: Vec<StreakEvent>,
}

/// Authoritative room state pushed by the server.
///
/// Every snapshot fully supersedes the previous one; nothing is merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoomSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
    pub players: HashMap<ClientId, PlayerView>,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub current_round: u32,
    #[serde(default)]
    pub total_rounds: u32,
    #[serde(default)]
    pub show_scores: bool,
    /// Number of players who voted to end the game early.
    #[serde(rename = "votes", default)]
    pub votes_to_end: u32,
    /// Players who voted to restart. Only populated after the game is over.
    #[serde(default)]
    pub restart_votes: BTreeSet<ClientId>,
    #[serde(default)]
    pub history: Vec<RoundRecord>,
}

impl RoomSnapshot {
    /// The player with the given id.
    pub fn player(&self, id: &ClientId) -> Option<&PlayerView> {
        self.players.get(id)
    }

    /// The id of the host, if the host is still in the room.
    pub fn host_id(&self) -> Option<&ClientId> {
        self.players
            .iter()
            .find(|(_, p)| p.is_host)
            .map(|(id, _)| id)
    }

    /// Whether the host has already voted to restart.
    pub fn host_voted_restart(&self) -> bool {
        self.host_id()
            .is_some_and(|host| self.restart_votes.contains(host))
    }

    /// Players ordered by total score, best first. Ties keep name order.
    pub fn leaderboard(&self) -> Vec<(&ClientId, &PlayerView)> {
        let mut ranked: Vec<_> = self.players.iter().collect();
        ranked.sort_by(|(_, a), (_, b)| {
            b.total_score
                .total_cmp(&a.total_score)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Frames sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register in the room. Sent once, right after the channel opens.
    Join { name: String, avatar: String },
    /// Start the game. Only honored for the host.
    StartGame,
    /// Submit this round's score as typed by the player.
    SubmitScore { score: String },
    /// Vote to end the game early.
    VoteEnd,
    /// Vote to restart after the game is over.
    VoteRestart,
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full room snapshot (boxed to reduce enum size).
    StateUpdate { data: Box<RoomSnapshot> },
    /// A round just finished (boxed to reduce enum size).
    RoundEnd { data: Box<RoundEndEvent> },
    /// A player's channel closed.
    PlayerLeft { client_id: ClientId },
    /// Server-side error notice.
    Error { message: String },
    /// Any kind this client does not understand.
    #[serde(other)]
    Unknown,
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

    fn player(name: &str, host: bool, total: f64) -> PlayerView {
        PlayerView {
            name: name.into(),
            avatar: String::new(),
            is_host: host,
            total_score: total,
            current_round_score: None,
            win_streak: 0,
            loss_streak: 0,
        }
    }

    #[test]
    fn client_id_generate_is_unique() {
        assert_ne!(ClientId::generate(), ClientId::generate());
    }

    #[test]
    fn client_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ClientId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn host_id_finds_flagged_player() {
        let mut snapshot = RoomSnapshot::default();
        snapshot
            .players
            .insert(ClientId::new("a"), player("Ann", false, 0.0));
        snapshot
            .players
            .insert(ClientId::new("b"), player("Bob", true, 0.0));
        assert_eq!(snapshot.host_id(), Some(&ClientId::new("b")));
        assert!(!snapshot.host_voted_restart());

        snapshot.restart_votes.insert(ClientId::new("b"));
        assert!(snapshot.host_voted_restart());
    }

    #[test]
    fn leaderboard_orders_by_total_descending() {
        let mut snapshot = RoomSnapshot::default();
        snapshot
            .players
            .insert(ClientId::new("a"), player("Ann", true, -40.0));
        snapshot
            .players
            .insert(ClientId::new("b"), player("Bob", false, 90.0));
        snapshot
            .players
            .insert(ClientId::new("c"), player("Cid", false, -50.0));

        let names: Vec<_> = snapshot
            .leaderboard()
            .into_iter()
            .map(|(_, p)| p.name.as_str())
            .collect();
        assert_eq!(names, ["Bob", "Ann", "Cid"]);
    }

    #[test]
    fn round_end_winners_and_detail_lookup() {
        let event = RoundEndEvent {
            round_num: 1,
            pot: 150.0,
            details: vec![
                PlayerRoundDetail {
                    name: "Ann".into(),
                    avatar: "a.svg".into(),
                    score_input: Some(0.0),
                    change: 150.0,
                    total: 150.0,
                    is_winner: true,
                    win_streak: 1,
                    loss_streak: 0,
                },
                PlayerRoundDetail {
                    name: "Bob".into(),
                    avatar: "b.svg".into(),
                    score_input: Some(150.0),
                    change: -150.0,
                    total: -150.0,
                    is_winner: false,
                    win_streak: 0,
                    loss_streak: 1,
                },
            ],
            events: None,
        };
        assert!(event.cues().is_empty());
        assert_eq!(event.winners().collect::<Vec<_>>(), ["Ann"]);
        assert!(!event.detail_for("Bob").unwrap().is_winner);
        assert!(event.detail_for("Cid").is_none());
    }

    #[test]
    fn player_without_name_still_decodes() {
        let snapshot: RoomSnapshot = serde_json::from_str(
            r#"{"players":{
                "a":{"name":null,"avatar":null,"total_score":0,"is_host":true},
                "b":{"name":"Bob"}
            }}"#,
        )
        .unwrap();
        let nameless = snapshot.player(&ClientId::new("a")).unwrap();
        assert_eq!(nameless.name, "");
        assert_eq!(nameless.avatar, "");
        assert_eq!(snapshot.player(&ClientId::new("b")).unwrap().name, "Bob");
    }
}
