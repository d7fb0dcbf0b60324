//! Transport abstraction for the room channel.
//!
//! The [`Transport`] trait is a bidirectional text message channel between
//! the client and the room server. Every frame is one complete JSON document,
//! so implementations handle their own framing (WebSocket frames, in-memory
//! channels in tests, and so on).
//!
//! Unlike a pre-connected socket, the session controller needs to observe
//! the connection attempt itself so it can run the connection watchdog. That
//! is what [`Connector`] is for: the controller asks it to open a transport
//! for the room address and races the attempt against the watchdog deadline.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use pot_room_client::error::PotRoomError;
//! use pot_room_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), PotRoomError> {
//!         // Send the JSON text frame
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, PotRoomError>> {
//!         // Return None when the connection is closed cleanly
//!         None
//!     }
//!
//!     async fn close(&mut self) -> Result<(), PotRoomError> {
//!         Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, url: &str) -> Result<MyTransport, PotRoomError> {
//!         Ok(MyTransport {})
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::PotRoomError;

/// A bidirectional text message transport for the room protocol.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON frame.
/// Each call to [`recv`](Transport::recv) returns one complete JSON frame.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because the
/// session loop polls it inside `tokio::select!`. If `recv` is cancelled
/// before completion, calling it again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), PotRoomError>;

    /// Receive the next JSON text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` for a complete frame
    /// - `Some(Err(e))` for a transport error
    /// - `None` once the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, PotRoomError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), PotRoomError>;
}

/// Opens a [`Transport`] for a room channel address.
///
/// The session loop calls [`connect`](Connector::connect) exactly once per
/// room visit. The returned future is dropped if the connection watchdog
/// expires first, so implementations must not rely on it running to
/// completion.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced by a successful connection.
    type Transport: Transport;

    /// Open a channel to `url` (`ws(s)://<host>/ws/{room}/{client}`).
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::Connect`] (or [`PotRoomError::Io`]) when the
    /// channel cannot be opened.
    async fn connect(&self, url: &str) -> Result<Self::Transport, PotRoomError>;
}
