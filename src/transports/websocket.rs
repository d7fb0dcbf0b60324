//! WebSocket room channel built on `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the room protocol's JSON text frames over
//! one WebSocket, and [`WebSocketConnector`] opens it for the session loop.
//! Both `ws://` and `wss://` addresses work; TLS is handled by
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), pot_room_client::PotRoomError> {
//! use pot_room_client::{Transport, WebSocketTransport};
//!
//! let mut channel = WebSocketTransport::connect("ws://localhost:8000/ws/ABCD/c1").await?;
//! channel.send(r#"{"action":"join","name":"Ann","avatar":""}"#.to_string()).await?;
//!
//! while let Some(Ok(frame)) = channel.recv().await {
//!     println!("server: {frame}");
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::PotRoomError;
use crate::transport::{Connector, Transport};

/// The underlying WebSocket stream, exposed for [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A room channel over one WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not lose a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::Connect`] if the address is invalid or the
    /// handshake fails.
    pub async fn connect(url: &str) -> Result<Self, PotRoomError> {
        debug!(url = %url, "opening room channel");
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| PotRoomError::Connect(format!("{url}: {e}")))?;
        info!(url = %url, "room channel established");
        Ok(Self::from_stream(stream))
    }

    /// Wrap a stream opened elsewhere (custom TLS, proxies, extra headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), PotRoomError> {
        if self.closed {
            return Err(PotRoomError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| PotRoomError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PotRoomError>> {
        while let Some(next) = self.stream.next().await {
            match next {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server closed the room channel");
                    return None;
                }
                Ok(Message::Binary(_)) => warn!("skipping binary frame on room channel"),
                // Pings are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(PotRoomError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), PotRoomError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| PotRoomError::TransportSend(e.to_string()))
    }
}

/// Opens [`WebSocketTransport`]s for [`RoomSession`](crate::session::RoomSession).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, url: &str) -> Result<WebSocketTransport, PotRoomError> {
        WebSocketTransport::connect(url).await
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
    use crate::event::SessionEvent;
    use crate::identity::ClientIdentity;
    use crate::phase::Phase;
    use crate::protocol::{ClientId, ClientMessage};
    use crate::session::{RoomSession, SessionConfig};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    type ServerStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Accept one WebSocket on a local port, run `handler` on it, and
    /// return the base address plus the request path the client used.
    async fn room_server<F, Fut>(handler: F) -> (String, tokio::sync::oneshot::Receiver<String>)
    where
        F: FnOnce(ServerStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, path_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let record_path =
                move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let _ = path_tx.send(req.uri().path().to_string());
                    Ok(resp)
                };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, record_path)
                .await
                .unwrap();
            handler(ws).await;
        });

        (format!("ws://{addr}"), path_rx)
    }

    #[test]
    fn websocket_types_are_send_and_debug() {
        fn assert_send_debug<T: Send + std::fmt::Debug>() {}
        assert_send_debug::<WebSocketTransport>();
        assert_send_debug::<WebSocketConnector>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url").await.unwrap_err();
        assert!(matches!(err, PotRoomError::Connect(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketConnector.connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, PotRoomError::Connect(_)));
    }

    #[tokio::test]
    async fn recv_skips_binary_and_stops_at_close() {
        let (url, _path) = room_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into())).await.unwrap();
            ws.send(Message::Text(r#"{"type":"error","message":"x"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut channel = WebSocketTransport::connect(&url).await.unwrap();
        let frame = channel.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"type":"error","message":"x"}"#);
        assert!(channel.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_close_is_rejected() {
        let (url, _path) =
            room_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} }).await;

        let mut channel = WebSocketTransport::connect(&url).await.unwrap();
        channel.close().await.unwrap();
        channel.close().await.unwrap();
        let err = channel.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, PotRoomError::TransportClosed));
    }

    #[tokio::test]
    async fn from_stream_wraps_existing_socket() {
        let (url, _path) = room_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let (stream, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let mut channel = WebSocketTransport::from_stream(stream);
        channel.send(r#"{"action":"vote_end"}"#.to_string()).await.unwrap();
        assert_eq!(
            channel.recv().await.unwrap().unwrap(),
            r#"{"action":"vote_end"}"#
        );
    }

    #[tokio::test]
    async fn session_joins_over_websocket() {
        let (join_tx, join_rx) = tokio::sync::oneshot::channel::<String>();
        let (url, path_rx) = room_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = join_tx.send(text.to_string());
            }
            let lobby = serde_json::json!({
                "type": "state_update",
                "data": {
                    "players": {
                        "c1": {"name": "Ann", "avatar": "a.svg", "is_host": true, "total_score": 0.0}
                    },
                    "game_started": false,
                    "game_over": false,
                    "current_round": 0,
                    "total_rounds": 3
                }
            });
            ws.send(Message::Text(lobby.to_string().into())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let identity = ClientIdentity::new(ClientId::new("c1"), "Ann", "a.svg");
        let config = SessionConfig::new(url, "abcd");
        let (mut session, mut events) = RoomSession::start(WebSocketConnector, config, identity);

        while let Some(event) = events.recv().await {
            if event == (SessionEvent::PhaseChanged { from: Phase::Loading, to: Phase::Lobby }) {
                break;
            }
        }

        assert_eq!(path_rx.await.unwrap(), "/ws/ABCD/c1");
        let join: ClientMessage = serde_json::from_str(&join_rx.await.unwrap()).unwrap();
        assert_eq!(
            join,
            ClientMessage::Join {
                name: "Ann".into(),
                avatar: "a.svg".into()
            }
        );
        assert!(session.view().is_host);
        session.shutdown().await;
    }
}
