//! Ownership of the single room channel.
//!
//! [`ConnectionManager`] holds the transport once it is open, decodes inbound
//! frames into [`ServerMessage`]s and serializes outbound [`ClientMessage`]s.
//! Sends are fire-and-forget: a frame offered while the channel is not open
//! is dropped with a log line and never queued.

use tracing::{debug, error, warn};

use crate::error::PotRoomError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::Transport;

/// Decode one inbound frame.
///
/// Malformed frames and kinds this client does not know are dropped and
/// yield `None`; they never end the session.
pub fn decode_frame(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Unknown) => {
            debug!("dropping frame of unknown kind: {text}");
            None
        }
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("failed to decode server frame: {e} (raw: {text})");
            None
        }
    }
}

/// Owns the transport for one room visit.
///
/// The channel is open exactly while a transport is attached. Whether it
/// is still connecting, closed or timed out is the controller's business.
#[derive(Debug)]
pub struct ConnectionManager<T> {
    transport: Option<T>,
}

impl<T> Default for ConnectionManager<T> {
    fn default() -> Self {
        Self { transport: None }
    }
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Take ownership of a freshly opened transport.
    pub fn attach(&mut self, transport: T) {
        self.transport = Some(transport);
    }

    /// Serialize and send `msg`.
    ///
    /// Returns `Ok(false)` when the frame was discarded because the channel
    /// is not open.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the send failed; the channel is marked
    /// closed in that case.
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<bool, PotRoomError> {
        let Some(transport) = self.transport.as_mut() else {
            debug!("discarding {msg:?}: channel not open");
            return Ok(false);
        };
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                // Serialization failures are programming bugs; don't kill the channel.
                error!("failed to serialize ClientMessage: {e}");
                return Ok(false);
            }
        };
        debug!("sending {json}");
        if let Err(e) = transport.send(json).await {
            error!("transport send error: {e}");
            self.transport = None;
            return Err(e);
        }
        Ok(true)
    }

    /// Receive the next raw frame. Pending forever while no transport is attached.
    ///
    /// Cancel-safe as long as the transport's `recv` is.
    pub async fn recv(&mut self) -> Option<Result<String, PotRoomError>> {
        match self.transport.as_mut() {
            Some(transport) => transport.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Record that the remote side closed the channel.
    pub fn mark_closed(&mut self) {
        self.transport = None;
    }

    /// Close the channel if it is open. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("transport close failed: {e}");
            }
        }
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
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    struct RecordingTransport {
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        fail_send: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&mut self, message: String) -> Result<(), PotRoomError> {
            if self.fail_send {
                return Err(PotRoomError::TransportSend("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, PotRoomError>> {
            Some(Ok(r#"{"type":"error","message":"hi"}"#.into()))
        }

        async fn close(&mut self) -> Result<(), PotRoomError> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    fn transport(fail_send: bool) -> (RecordingTransport, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            RecordingTransport {
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                fail_send,
            },
            sent,
            closed,
        )
    }

    #[test]
    fn decode_drops_unknown_and_malformed() {
        assert!(decode_frame(r#"{"type":"confetti","data":{}}"#).is_none());
        assert!(decode_frame("{not json").is_none());
        assert!(decode_frame(r#"{"type":"state_update","data":42}"#).is_none());
        assert_eq!(
            decode_frame(r#"{"type":"error","message":"Room does not exist"}"#),
            Some(ServerMessage::Error {
                message: "Room does not exist".into()
            })
        );
    }

    #[test]
    fn send_before_open_is_discarded() {
        let mut conn = ConnectionManager::<RecordingTransport>::new();
        assert!(!conn.is_open());
        let sent = tokio_test::block_on(conn.send(&ClientMessage::StartGame));
        assert!(!tokio_test::assert_ok!(sent));
    }

    #[tokio::test]
    async fn send_after_attach_serializes_frame() {
        let (t, sent, _closed) = transport(false);
        let mut conn = ConnectionManager::new();
        conn.attach(t);
        assert!(conn.is_open());
        assert!(conn.send(&ClientMessage::VoteEnd).await.unwrap());
        assert_eq!(sent.lock().unwrap().as_slice(), [r#"{"action":"vote_end"}"#]);
    }

    #[tokio::test]
    async fn send_failure_marks_closed() {
        let (t, _sent, _closed) = transport(true);
        let mut conn = ConnectionManager::new();
        conn.attach(t);
        let err = tokio_test::assert_err!(conn.send(&ClientMessage::StartGame).await);
        assert!(matches!(err, PotRoomError::TransportSend(_)));
        assert!(!conn.is_open());
        assert!(!conn.send(&ClientMessage::StartGame).await.unwrap());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (t, _sent, closed) = transport(false);
        let mut conn = ConnectionManager::new();
        conn.attach(t);
        conn.close().await;
        conn.close().await;
        assert!(closed.load(Ordering::Acquire));
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn close_before_open_is_a_no_op() {
        let mut conn = ConnectionManager::<RecordingTransport>::new();
        conn.close().await;
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn mark_closed_detaches_without_closing() {
        let (t, _sent, closed) = transport(false);
        let mut conn = ConnectionManager::new();
        conn.attach(t);
        conn.mark_closed();
        assert!(!conn.is_open());
        conn.close().await;
        assert!(!closed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn recv_reads_from_attached_transport() {
        let (t, _sent, _closed) = transport(false);
        let mut conn = ConnectionManager::new();
        conn.attach(t);
        let frame = conn.recv().await.unwrap().unwrap();
        assert!(decode_frame(&frame).is_some());
    }
}
