//! Error types for the pot room client.

use thiserror::Error;

/// Errors that can occur when using the pot room client.
#[derive(Debug, Error)]
pub enum PotRoomError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// The channel could not be opened.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Failed to serialize or deserialize a protocol message or stored value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session task has exited; no further intents can be delivered.
    #[error("session is not running")]
    NotConnected,

    /// The room endpoint reported that the room does not exist.
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// The room endpoint answered with an unexpected status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// An HTTP request to the room endpoints failed.
    #[cfg(feature = "http-rooms")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for pot room client operations.
pub type Result<T> = std::result::Result<T, PotRoomError>;
