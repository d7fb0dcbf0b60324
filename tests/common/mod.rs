#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for pot room client integration tests.
//!
//! Provides a [`MockConnector`] whose transport is fed by a [`RoomServer`]
//! handle, plus builders for the JSON frames a real room server sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use pot_room_client::protocol::ClientMessage;
use pot_room_client::{Connector, PotRoomError, Transport};
use serde_json::json;
use tokio::sync::mpsc;

/// Client id of the local player in every test.
pub const ME: &str = "c1";
/// Client id of the host in every test.
pub const HOST: &str = "h1";

// ── MockTransport ───────────────────────────────────────────────────

type Frame = Option<Result<String, PotRoomError>>;

/// A channel-backed transport. Frames are pushed through [`RoomServer`].
pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    fail_send: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), PotRoomError> {
        if self.fail_send {
            return Err(PotRoomError::TransportSend("connection reset".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, PotRoomError>> {
        match self.incoming.recv().await {
            Some(frame) => frame,
            // The server handle was dropped: stay silent until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), PotRoomError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ── RoomServer ──────────────────────────────────────────────────────

/// The server side of a [`MockTransport`].
pub struct RoomServer {
    frames: mpsc::UnboundedSender<Frame>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    urls: Arc<StdMutex<Vec<String>>>,
}

impl RoomServer {
    /// Deliver one text frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        self.frames.send(Some(Ok(frame.into()))).unwrap();
    }

    /// Close the channel from the server side.
    pub fn hang_up(&self) {
        self.frames.send(None).unwrap();
    }

    /// Make the client's next `recv` fail.
    pub fn break_channel(&self) {
        self.frames
            .send(Some(Err(PotRoomError::TransportReceive("connection reset".into()))))
            .unwrap();
    }

    /// Everything the client sent, decoded.
    pub fn received(&self) -> Vec<ClientMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    /// Raw frames the client sent.
    pub fn received_raw(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until the client has sent at least `count` frames.
    pub async fn wait_received(&self, count: usize) -> Vec<ClientMessage> {
        for _ in 0..10_000 {
            if self.sent.lock().unwrap().len() >= count {
                return self.received();
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "expected {count} frames, client sent {:?}",
            self.received_raw()
        );
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Addresses the connector was asked to open.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

// ── MockConnector ───────────────────────────────────────────────────

/// How the connection attempt behaves.
#[derive(Debug, Clone, Copy)]
pub enum ConnectBehavior {
    /// Open immediately.
    Ready,
    /// Open after the given delay.
    Delay(Duration),
    /// Fail immediately.
    Fail,
    /// Never complete.
    Hang,
}

pub struct MockConnector {
    transport: StdMutex<Option<MockTransport>>,
    behavior: ConnectBehavior,
    urls: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &str) -> Result<MockTransport, PotRoomError> {
        self.urls.lock().unwrap().push(url.to_string());
        match self.behavior {
            ConnectBehavior::Ready => {}
            ConnectBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            ConnectBehavior::Fail => {
                return Err(PotRoomError::Connect("connection refused".into()));
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }
        self.transport
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| PotRoomError::Connect("already connected".into()))
    }
}

/// A connector plus the server handle feeding its transport.
pub fn mock_room(behavior: ConnectBehavior) -> (MockConnector, RoomServer) {
    mock_room_with(behavior, false)
}

/// Like [`mock_room`], but every client send fails.
pub fn mock_room_with(behavior: ConnectBehavior, fail_send: bool) -> (MockConnector, RoomServer) {
    let (frames, incoming) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let urls = Arc::new(StdMutex::new(Vec::new()));
    let transport = MockTransport {
        incoming,
        sent: Arc::clone(&sent),
        closed: Arc::clone(&closed),
        fail_send,
    };
    let connector = MockConnector {
        transport: StdMutex::new(Some(transport)),
        behavior,
        urls: Arc::clone(&urls),
    };
    let server = RoomServer {
        frames,
        sent,
        closed,
        urls,
    };
    (connector, server)
}

// ── JSON frame builders ─────────────────────────────────────────────

/// Builder for `state_update` frames of a two-player room (host "Hana",
/// local player "Ann").
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    pub started: bool,
    pub over: bool,
    pub round: u32,
    pub my_score: Option<f64>,
    pub host_score: Option<f64>,
    pub votes: u32,
    pub restart_votes: Vec<&'static str>,
}

impl RoomState {
    pub fn lobby() -> Self {
        Self {
            round: 1,
            ..Self::default()
        }
    }

    pub fn active() -> Self {
        Self {
            started: true,
            round: 1,
            ..Self::default()
        }
    }

    pub fn game_over() -> Self {
        Self {
            started: true,
            over: true,
            round: 3,
            ..Self::default()
        }
    }

    pub fn my_score(mut self, score: f64) -> Self {
        self.my_score = Some(score);
        self
    }

    pub fn votes(mut self, votes: u32) -> Self {
        self.votes = votes;
        self
    }

    pub fn restart_vote(mut self, client_id: &'static str) -> Self {
        self.restart_votes.push(client_id);
        self
    }

    pub fn frame(&self) -> String {
        json!({
            "type": "state_update",
            "data": {
                "room_code": "QZ7K2M",
                "players": {
                    HOST: {
                        "name": "Hana", "avatar": "h.svg", "total_score": 0.0,
                        "current_round_score": self.host_score,
                        "win_streak": 0, "loss_streak": 0, "is_host": true
                    },
                    ME: {
                        "name": "Ann", "avatar": "a.svg", "total_score": 0.0,
                        "current_round_score": self.my_score,
                        "win_streak": 0, "loss_streak": 0, "is_host": false
                    }
                },
                "current_round": self.round,
                "total_rounds": 3,
                "game_started": self.started,
                "game_over": self.over,
                "history": [],
                "show_scores": true,
                "votes": self.votes,
                "restart_votes": self.restart_votes
            }
        })
        .to_string()
    }
}

/// A `round_end` frame where `winner` ("Ann" or "Hana") takes a pot of 150.
pub fn round_end_frame(winner: &str) -> String {
    let row = |name: &str, avatar: &str| {
        let won = name == winner;
        json!({
            "name": name,
            "avatar": avatar,
            "score_input": if won { 0 } else { 150 },
            "change": if won { 150.0 } else { -150.0 },
            "total": if won { 150.0 } else { -150.0 },
            "is_winner": won,
            "win_streak": u32::from(won),
            "loss_streak": u32::from(!won)
        })
    };
    json!({
        "type": "round_end",
        "data": {
            "round_num": 1,
            "pot": 150.0,
            "details": [row("Hana", "h.svg"), row("Ann", "a.svg")],
            "events": [{"type": "win_streak", "player": winner, "streak": 3}]
        }
    })
    .to_string()
}

pub fn player_left_frame(client_id: &str) -> String {
    json!({"type": "player_left", "client_id": client_id}).to_string()
}

pub fn error_frame(message: &str) -> String {
    json!({"type": "error", "message": message}).to_string()
}
