//! Async room session.
//!
//! [`RoomSession`] is a thin handle that talks to a background session loop
//! over an unbounded MPSC channel. The loop owns the [`SessionController`]
//! and the [`ConnectionManager`], multiplexes the connection attempt, inbound
//! frames, user intents and both timers in one `tokio::select!`, and
//! publishes the latest [`SessionView`] on a watch channel. Events are
//! emitted on a bounded channel returned from [`RoomSession::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = SessionConfig::new("ws://localhost:8000", "abcd");
//! let identity = load_or_create(&mut MemorySessionStore::new(), Some("Ann"), None)?;
//! let (session, mut events) = RoomSession::start(WebSocketConnector, config, identity);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::PhaseChanged { to: Phase::ActiveRound, .. } => {
//!             session.submit_score("42")?;
//!         }
//!         SessionEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::connection::{decode_frame, ConnectionManager};
use crate::controller::{ControllerTimings, Intent, SessionController, SessionView};
use crate::error::{PotRoomError, Result};
use crate::event::SessionEvent;
use crate::identity::ClientIdentity;
use crate::phase::{ConnectionState, Phase};
use crate::protocol::ClientId;
use crate::round_result::{DEFAULT_COUNTDOWN, DEFAULT_TICK_INTERVAL};
use crate::transport::{Connector, Transport};
use crate::watchdog::DEFAULT_CONNECT_TIMEOUT;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`RoomSession`].
///
/// # Example
///
/// ```
/// use pot_room_client::session::SessionConfig;
/// use pot_room_client::protocol::ClientId;
///
/// let config = SessionConfig::new("ws://localhost:8000/", "abcd");
/// assert_eq!(config.room_code, "ABCD");
/// assert_eq!(
///     config.channel_url(&ClientId::new("c1")),
///     "ws://localhost:8000/ws/ABCD/c1"
/// );
/// ```
///
/// # Tuning
///
/// ```
/// use pot_room_client::session::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("ws://localhost:8000", "ABCD")
///     .with_connect_timeout(Duration::from_secs(10))
///     .with_round_result_countdown(3)
///     .with_event_channel_capacity(512);
/// assert_eq!(config.round_result_countdown, 3);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base address of the room server, e.g. `wss://pot.example.com`.
    /// Trailing slashes are removed.
    pub server_url: String,
    /// Room to join. Always upper case.
    pub room_code: String,
    /// How long the channel has to open before the session fails.
    ///
    /// Defaults to **5 seconds**.
    pub connect_timeout: Duration,
    /// Countdown ticks before a round result clears itself.
    ///
    /// Defaults to **5**. Values below 1 are clamped to 1.
    pub round_result_countdown: u32,
    /// Spacing between countdown ticks. Defaults to **1 second**.
    pub tick_interval: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning
    /// logged) so the session loop never blocks. The `Disconnected` event is
    /// always delivered regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the session loop
    /// immediately.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    pub fn new(server_url: impl Into<String>, room_code: impl AsRef<str>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            room_code: room_code.as_ref().trim().to_uppercase(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            round_result_countdown: DEFAULT_COUNTDOWN,
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_round_result_countdown(mut self, ticks: u32) -> Self {
        self.round_result_countdown = ticks.max(1);
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Address of the room channel for `client_id`.
    pub fn channel_url(&self, client_id: &ClientId) -> String {
        format!("{}/ws/{}/{}", self.server_url, self.room_code, client_id)
    }

    fn timings(&self) -> ControllerTimings {
        ControllerTimings {
            connect_timeout: self.connect_timeout,
            round_result_countdown: self.round_result_countdown,
            tick_interval: self.tick_interval,
        }
    }
}

// ── Session handle ──────────────────────────────────────────────────

/// Handle to a running room session.
///
/// Created via [`RoomSession::start`], which spawns the session loop and
/// returns this handle together with an event receiver. Intent methods
/// return as soon as the intent is queued.
pub struct RoomSession {
    cmd_tx: mpsc::UnboundedSender<Intent>,
    view_rx: watch::Receiver<SessionView>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
    client_id: ClientId,
}

impl RoomSession {
    /// Start the session loop and return a handle plus event receiver.
    ///
    /// The loop immediately asks `connector` to open the room channel and
    /// arms the connection watchdog. Must be called from within a Tokio
    /// runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start<C: Connector>(
        connector: C,
        config: SessionConfig,
        identity: ClientIdentity,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Intent>();
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let url = config.channel_url(&identity.client_id);
        let client_id = identity.client_id.clone();
        let controller = SessionController::new(identity, config.timings(), Instant::now());
        let (view_tx, view_rx) = watch::channel(controller.view());

        info!(room = %config.room_code, %client_id, "starting room session");
        let task = tokio::spawn(session_loop(
            connector,
            url,
            controller,
            cmd_rx,
            event_tx,
            view_tx,
            shutdown_rx,
        ));

        let session = Self {
            cmd_tx,
            view_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
            client_id,
        };
        (session, event_rx)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Ask the server to start the game. Only the host's request is honored.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::NotConnected`] if the session has ended.
    pub fn start_game(&self) -> Result<()> {
        self.send(Intent::StartGame)
    }

    /// Submit a score for the current round. Blank input is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::NotConnected`] if the session has ended.
    pub fn submit_score(&self, value: impl Into<String>) -> Result<()> {
        self.send(Intent::SubmitScore(value.into()))
    }

    /// Vote to end the game. At most one vote per round is sent.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::NotConnected`] if the session has ended.
    pub fn vote_to_end(&self) -> Result<()> {
        self.send(Intent::VoteToEnd)
    }

    /// Vote to restart from the game-over screen.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::NotConnected`] if the session has ended.
    pub fn vote_to_restart(&self) -> Result<()> {
        self.send(Intent::VoteToRestart)
    }

    /// Dismiss the round result without waiting for the countdown.
    ///
    /// # Errors
    ///
    /// Returns [`PotRoomError::NotConnected`] if the session has ended.
    pub fn skip_round_result(&self) -> Result<()> {
        self.send(Intent::SkipRoundResult)
    }

    /// Shut down the session, closing the channel and stopping the loop.
    ///
    /// After this returns, the event receiver yields `None` once drained.
    pub async fn shutdown(&mut self) {
        debug!("RoomSession: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("session loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("session loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("session loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// The latest published view.
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.view_rx.borrow().phase
    }

    /// A receiver that is notified whenever the view changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Returns `true` while the session can still reach the server.
    pub fn is_connected(&self) -> bool {
        !self.cmd_tx.is_closed()
            && matches!(
                self.view_rx.borrow().connection,
                ConnectionState::Connecting | ConnectionState::Open
            )
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn send(&self, intent: Intent) -> Result<()> {
        if !self.is_connected() {
            return Err(PotRoomError::NotConnected);
        }
        self.cmd_tx
            .send(intent)
            .map_err(|_| PotRoomError::NotConnected)
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("client_id", &self.client_id)
            .field("phase", &self.phase())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        // The detached loop runs its normal exit path and closes the channel.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if self.task.take().is_some() {
            debug!("RoomSession dropped, session loop finishing in the background");
        }
    }
}

// ── Session loop ────────────────────────────────────────────────────

/// Background loop that owns all session state.
///
/// Exits when:
/// - The watchdog fires before the channel opens
/// - The server closes the channel or a transport error occurs
/// - Shutdown is requested or the handle is dropped
///
/// Every exit closes the channel, stops both timers and emits
/// `Disconnected` as the final event.
async fn session_loop<C: Connector>(
    connector: C,
    url: String,
    mut controller: SessionController,
    mut cmd_rx: mpsc::UnboundedReceiver<Intent>,
    event_tx: mpsc::Sender<SessionEvent>,
    view_tx: watch::Sender<SessionView>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(url = %url, "session loop started");

    let mut connection = ConnectionManager::<C::Transport>::new();
    let mut connecting = Some(connector.connect(&url));
    let mut reason: Option<String> = None;

    loop {
        if let Some(failure) = flush(&mut controller, &mut connection, &event_tx, &view_tx).await {
            reason = Some(failure);
        }
        if controller.is_terminal() {
            break;
        }

        let watchdog = controller.watchdog_deadline();
        let round = controller.round_deadline();

        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                reason = Some("client shut down".into());
                break;
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(intent) => controller.handle_intent(intent),
                    None => {
                        debug!("command channel closed, shutting down session loop");
                        reason = Some("client shut down".into());
                        break;
                    }
                }
            }

            result = poll_pending(&mut connecting) => {
                connecting = None;
                match result {
                    Ok(transport) => {
                        connection.attach(transport);
                        if !controller.on_open() {
                            connection.close().await;
                        }
                    }
                    Err(e) => controller.on_connect_failed(&e.to_string()),
                }
            }

            () = sleep_until_opt(watchdog) => {
                if controller.on_watchdog(Instant::now()) {
                    connecting = None;
                    reason = Some("connection timed out".into());
                }
            }

            () = sleep_until_opt(round) => {
                controller.on_round_tick(Instant::now());
            }

            incoming = connection.recv(), if connection.is_open() => {
                match incoming {
                    Some(Ok(text)) => {
                        if let Some(msg) = decode_frame(&text) {
                            controller.handle_message(msg, Instant::now());
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        connection.mark_closed();
                        controller.on_closed();
                        reason = Some(format!("transport receive error: {e}"));
                    }
                    None => {
                        debug!("channel closed by server");
                        connection.mark_closed();
                        controller.on_closed();
                    }
                }
            }
        }
    }

    drop(connecting);
    connection.close().await;
    controller.teardown();
    publish_view(&view_tx, &controller);
    for event in controller.take_events() {
        emit_event(&event_tx, event);
    }
    emit_disconnected(&event_tx, reason).await;

    debug!("session loop exited");
}

/// Send queued frames, then publish the view and emit queued events.
///
/// Returns the failure reason if a send broke the channel.
async fn flush<T: Transport>(
    controller: &mut SessionController,
    connection: &mut ConnectionManager<T>,
    event_tx: &mpsc::Sender<SessionEvent>,
    view_tx: &watch::Sender<SessionView>,
) -> Option<String> {
    let mut failure = None;
    for frame in controller.take_outbound() {
        if let Err(e) = connection.send(&frame).await {
            controller.on_closed();
            failure = Some(format!("transport send error: {e}"));
            break;
        }
    }
    publish_view(view_tx, controller);
    for event in controller.take_events() {
        emit_event(event_tx, event);
    }
    failure
}

fn publish_view(view_tx: &watch::Sender<SessionView>, controller: &SessionController) {
    let next = controller.view();
    view_tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

/// Await the pending future if there is one, otherwise never resolve.
async fn poll_pending<F>(pending: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match pending.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the session loop.
fn emit_event(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final [`Disconnected`](SessionEvent::Disconnected) event.
///
/// Uses `send().await` so the last event on the channel is never dropped.
async fn emit_disconnected(event_tx: &mpsc::Sender<SessionEvent>, reason: Option<String>) {
    if event_tx
        .send(SessionEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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

    /// Connector whose attempt never completes.
    struct HangingConnector;

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&mut self, _message: String) -> Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for HangingConnector {
        type Transport = NeverTransport;

        async fn connect(&self, _url: &str) -> Result<NeverTransport> {
            std::future::pending().await
        }
    }

    fn identity() -> ClientIdentity {
        ClientIdentity::new(ClientId::new("c1"), "Ann", "")
    }

    #[test]
    fn config_defaults() {
        let config = SessionConfig::new("ws://localhost:8000", "abcd");
        assert_eq!(config.room_code, "ABCD");
        assert_eq!(config.connect_timeout, Duration::from_millis(5000));
        assert_eq!(config.round_result_countdown, 5);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_clamps() {
        let config = SessionConfig::new("ws://h", "x")
            .with_event_channel_capacity(0)
            .with_round_result_countdown(0);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.round_result_countdown, 1);
    }

    #[test]
    fn channel_url_joins_parts() {
        let config = SessionConfig::new("wss://pot.example.com//", " qz7k ");
        assert_eq!(
            config.channel_url(&ClientId::new("abc-123")),
            "wss://pot.example.com/ws/QZ7K/abc-123"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_connect_times_out_after_five_seconds() {
        let config = SessionConfig::new("ws://h", "ROOM");
        let started = Instant::now();
        let (mut session, mut events) = RoomSession::start(HangingConnector, config, identity());
        assert_eq!(session.phase(), Phase::Connecting);

        let mut failed_at = None;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::ConnectionFailed => failed_at = Some(Instant::now()),
                SessionEvent::Disconnected { reason } => {
                    assert_eq!(reason.as_deref(), Some("connection timed out"));
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(failed_at.unwrap() - started, Duration::from_millis(5000));
        assert_eq!(session.phase(), Phase::ConnectionError);
        assert!(matches!(
            session.start_game(),
            Err(PotRoomError::NotConnected)
        ));
        session.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_connecting_emits_disconnected() {
        let config = SessionConfig::new("ws://h", "ROOM");
        let (mut session, mut events) = RoomSession::start(HangingConnector, config, identity());
        session.shutdown().await;

        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(SessionEvent::Disconnected {
                reason: Some("client shut down".into())
            })
        );
    }
}
