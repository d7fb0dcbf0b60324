//! Events emitted by a running room session.

use crate::phase::Phase;
use crate::protocol::{ClientId, RoundEndEvent};

/// Notifications delivered on the session's event channel.
///
/// The latest full state is always available through
/// [`RoomSession::view`](crate::session::RoomSession::view); events only say
/// what changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The channel opened and the `join` frame was sent.
    Connected,
    /// The channel did not open before the watchdog deadline. Terminal.
    ConnectionFailed,
    /// The derived phase changed.
    PhaseChanged { from: Phase, to: Phase },
    /// A new room snapshot replaced the previous one.
    SnapshotUpdated,
    /// A round result is now showing (boxed to reduce enum size).
    RoundEnded(Box<RoundEndEvent>),
    /// The round result countdown ticked.
    Countdown { remaining: u32 },
    /// The round result was cleared, by countdown or by skip.
    RoundResultCleared,
    /// Another player's channel closed.
    PlayerLeft { client_id: ClientId },
    /// The server reported an error.
    ServerError { message: String },
    /// The channel closed. Always the last event of a session.
    Disconnected { reason: Option<String> },
}
