//! # Pot Room Client
//!
//! Client-side session controller for a "loser pays the pot" score room.
//!
//! A [`RoomSession`] joins one room over a single bidirectional channel,
//! keeps the latest authoritative room snapshot, shows each round's result
//! for a short countdown, and derives the phase the player is in from that
//! state alone. The server owns every rule of the game; this crate only
//! mirrors its state and forwards the player's intents.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   [`WebSocketConnector`]
//! - **Room endpoints**: the `http-rooms` feature adds [`rooms::RoomsClient`]
//!   for creating and checking rooms
//! - **Event-driven**: receive [`SessionEvent`]s on a channel, or watch the
//!   full [`SessionView`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), pot_room_client::PotRoomError> {
//! use pot_room_client::identity::{load_or_create, MemorySessionStore};
//! use pot_room_client::{Phase, RoomSession, SessionConfig, SessionEvent, WebSocketConnector};
//!
//! let mut store = MemorySessionStore::new();
//! let identity = load_or_create(&mut store, Some("Ann"), None)?;
//! let config = SessionConfig::new("ws://localhost:8000", "QZ7K2M");
//! let (mut session, mut events) = RoomSession::start(WebSocketConnector, config, identity);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::PhaseChanged { to: Phase::ActiveRound, .. } => session.submit_score("40")?,
//!         SessionEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod identity;
pub mod phase;
pub mod protocol;
#[cfg(feature = "http-rooms")]
pub mod rooms;
pub mod round_result;
pub mod session;
pub mod store;
pub mod transport;
pub mod transports;
pub mod watchdog;

// Re-export primary types for ergonomic imports.
pub use controller::{Intent, SessionController, SessionView};
pub use error::PotRoomError;
pub use event::SessionEvent;
pub use identity::ClientIdentity;
pub use phase::{ConnectionState, Phase};
pub use protocol::{ClientId, ClientMessage, RoomSnapshot, RoundEndEvent, ServerMessage};
pub use session::{RoomSession, SessionConfig};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
