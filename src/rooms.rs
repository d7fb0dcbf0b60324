//! HTTP helpers for the room endpoints.
//!
//! Rooms are created and looked up over plain HTTP before a session opens
//! its channel:
//!
//! - `POST /create-room` with `{"rounds": n, "show_scores": bool}` answers
//!   `{"room_code": "..."}`.
//! - `GET /check-room/{code}` answers 200 when the room exists, 404 otherwise.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PotRoomError, Result};

/// Default number of rounds for a new room.
pub const DEFAULT_ROUNDS: u32 = 5;

#[derive(Debug, Serialize)]
struct CreateRoomRequest {
    rounds: u32,
    show_scores: bool,
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    room_code: String,
}

/// Client for the room endpoints of one server.
#[derive(Debug, Clone)]
pub struct RoomsClient {
    http: reqwest::Client,
    base_url: String,
}

impl RoomsClient {
    /// A client for the server at `base_url` (e.g. `https://pot.example.com`).
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Reuse an existing HTTP client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a room and return its code.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::HttpStatus`] on a non-success answer and
    /// [`PotRoomError::Http`] if the request fails.
    pub async fn create_room(&self, rounds: u32, show_scores: bool) -> Result<String> {
        let url = format!("{}/create-room", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&CreateRoomRequest {
                rounds: rounds.max(1),
                show_scores,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PotRoomError::HttpStatus(status.as_u16()));
        }
        let created: CreateRoomResponse = response.json().await?;
        info!(room = %created.room_code, rounds, show_scores, "room created");
        Ok(created.room_code)
    }

    /// Whether the room `code` exists. Codes are matched upper case.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::HttpStatus`] for any answer other than 200 or
    /// 404, and [`PotRoomError::Http`] if the request fails.
    pub async fn check_room(&self, code: &str) -> Result<bool> {
        let code = code.trim().to_uppercase();
        let url = format!("{}/check-room/{code}", self.base_url);
        let status = self.http.get(&url).send().await?.status();
        debug!(room = %code, status = status.as_u16(), "checked room");
        match status {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            other => Err(PotRoomError::HttpStatus(other.as_u16())),
        }
    }

    /// Like [`check_room`](Self::check_room) but a missing room is an error.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::RoomNotFound`] if the room does not exist.
    pub async fn ensure_room(&self, code: &str) -> Result<()> {
        if self.check_room(code).await? {
            Ok(())
        } else {
            Err(PotRoomError::RoomNotFound(code.trim().to_uppercase()))
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
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (req_tx, req_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0_u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&raw) {
                    break;
                }
            }
            let _ = req_tx.send(String::from_utf8_lossy(&raw).into_owned());
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://{addr}/"), req_rx)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    #[tokio::test]
    async fn create_room_posts_settings() {
        let (url, request) = one_shot_server("200 OK", r#"{"room_code":"QZ7K2M"}"#).await;
        let rooms = RoomsClient::new(url).unwrap();

        let code = rooms.create_room(3, false).await.unwrap();
        assert_eq!(code, "QZ7K2M");

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /create-room "));
        assert!(request.ends_with(r#"{"rounds":3,"show_scores":false}"#));
    }

    #[tokio::test]
    async fn create_room_surfaces_status() {
        let (url, _request) = one_shot_server("500 Internal Server Error", "{}").await;
        let rooms = RoomsClient::new(url).unwrap();
        let err = rooms.create_room(DEFAULT_ROUNDS, true).await.unwrap_err();
        assert!(matches!(err, PotRoomError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn check_room_found() {
        let (url, request) = one_shot_server("200 OK", r#"{"exists":true}"#).await;
        let rooms = RoomsClient::new(url).unwrap();
        assert!(rooms.check_room("qz7k").await.unwrap());
        assert!(request.await.unwrap().starts_with("GET /check-room/QZ7K "));
    }

    #[tokio::test]
    async fn check_room_missing() {
        let (url, _request) = one_shot_server("404 Not Found", r#"{"detail":"Room not found"}"#).await;
        let rooms = RoomsClient::new(url).unwrap();
        assert!(!rooms.check_room("NOPE").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_room_reports_missing_code() {
        let (url, _request) = one_shot_server("404 Not Found", "{}").await;
        let rooms = RoomsClient::new(url).unwrap();
        let err = rooms.ensure_room(" abcd ").await.unwrap_err();
        assert!(matches!(err, PotRoomError::RoomNotFound(code) if code == "ABCD"));
    }

    #[tokio::test]
    async fn check_room_other_status_is_error() {
        let (url, _request) = one_shot_server("503 Service Unavailable", "{}").await;
        let rooms = RoomsClient::new(url).unwrap();
        assert!(matches!(
            rooms.check_room("ABCD").await,
            Err(PotRoomError::HttpStatus(503))
        ));
    }

    #[test]
    fn base_url_is_trimmed() {
        let rooms = RoomsClient::with_client(reqwest::Client::new(), "http://h:8000///");
        assert_eq!(rooms.base_url(), "http://h:8000");
    }
}
