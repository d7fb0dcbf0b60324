//! Holder for the latest authoritative room snapshot.

use crate::protocol::{ClientId, PlayerView, RoomSnapshot};

/// Keeps exactly one snapshot. Each [`apply_snapshot`](Self::apply_snapshot)
/// replaces it wholesale; there is no field-level merge and no ordering
/// check beyond arrival order on the channel.
#[derive(Debug, Clone, Default)]
pub struct RoomStateStore {
    snapshot: Option<RoomSnapshot>,
}

impl RoomStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held snapshot, returning the previous one.
    pub fn apply_snapshot(&mut self, snapshot: RoomSnapshot) -> Option<RoomSnapshot> {
        self.snapshot.replace(snapshot)
    }

    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        self.snapshot.as_ref()
    }

    /// The view of player `id` in the current snapshot.
    pub fn player(&self, id: &ClientId) -> Option<&PlayerView> {
        self.snapshot.as_ref().and_then(|s| s.player(id))
    }

    /// Whether player `id` is the host in the current snapshot.
    pub fn is_host(&self, id: &ClientId) -> bool {
        self.player(id).is_some_and(|p| p.is_host)
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

    fn room_with(id: &str, name: &str, score: Option<f64>) -> RoomSnapshot {
        let mut snapshot = RoomSnapshot {
            game_started: true,
            total_rounds: 3,
            current_round: 1,
            votes_to_end: 1,
            ..Default::default()
        };
        snapshot.players.insert(
            ClientId::new(id),
            PlayerView {
                name: name.into(),
                avatar: String::new(),
                is_host: true,
                total_score: 0.0,
                current_round_score: score,
                win_streak: 0,
                loss_streak: 0,
            },
        );
        snapshot
    }

    #[test]
    fn starts_empty() {
        let store = RoomStateStore::new();
        assert!(store.snapshot().is_none());
        assert!(store.player(&ClientId::new("x")).is_none());
    }

    #[test]
    fn latest_snapshot_wins_without_field_bleed() {
        let mut store = RoomStateStore::new();
        store.apply_snapshot(room_with("x", "Ann", Some(20.0)));

        let second = RoomSnapshot {
            game_started: true,
            ..Default::default()
        };
        let previous = store.apply_snapshot(second.clone());

        assert_eq!(previous.unwrap().votes_to_end, 1);
        assert_eq!(store.snapshot(), Some(&second));
        assert!(store.player(&ClientId::new("x")).is_none());
        assert_eq!(store.snapshot().unwrap().votes_to_end, 0);
    }

    #[test]
    fn player_lookup_by_client_id() {
        let mut store = RoomStateStore::new();
        store.apply_snapshot(room_with("x", "Ann", None));
        let me = ClientId::new("x");
        assert_eq!(store.player(&me).unwrap().name, "Ann");
        assert!(store.is_host(&me));
        assert!(!store.is_host(&ClientId::new("y")));
    }
}
