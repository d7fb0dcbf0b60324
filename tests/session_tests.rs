#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for `RoomSession`.
//!
//! A `MockConnector` stands in for the room server so each test can script
//! the connection attempt and the frames that follow. Tests that depend on
//! timers run on a paused clock.

mod common;

use std::time::Duration;

use pot_room_client::dispatch::RoundFlags;
use pot_room_client::phase::RestartControl;
use pot_room_client::protocol::{ClientId, ClientMessage};
use pot_room_client::{
    ClientIdentity, Phase, PotRoomError, RoomSession, SessionConfig, SessionEvent, SessionView,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

use common::{
    error_frame, mock_room, mock_room_with, player_left_frame, round_end_frame, ConnectBehavior,
    RoomServer, RoomState, HOST, ME,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn identity() -> ClientIdentity {
    ClientIdentity::new(ClientId::new(ME), "Ann", "a.svg")
}

fn config() -> SessionConfig {
    SessionConfig::new("ws://pot.test", "qz7k2m")
}

fn start(behavior: ConnectBehavior) -> (RoomSession, mpsc::Receiver<SessionEvent>, RoomServer) {
    let (connector, server) = mock_room(behavior);
    let (session, events) = RoomSession::start(connector, config(), identity());
    (session, events, server)
}

/// Receive events until one matches `pred`, returning it.
async fn next_matching(
    events: &mut mpsc::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    let wait = async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return event;
            }
        }
        panic!("event channel closed before the expected event");
    };
    tokio::time::timeout(Duration::from_secs(60), wait)
        .await
        .expect("timed out waiting for event")
}

async fn reach_phase(events: &mut mpsc::Receiver<SessionEvent>, phase: Phase) {
    next_matching(
        events,
        |e| matches!(e, SessionEvent::PhaseChanged { to, .. } if *to == phase),
    )
    .await;
}

/// Drain every remaining event. The session must already be ending.
async fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut rest = Vec::new();
    while let Some(event) = events.recv().await {
        rest.push(event);
    }
    rest
}

async fn view_where(session: &RoomSession, pred: impl Fn(&SessionView) -> bool) -> SessionView {
    let mut rx = session.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|v| pred(v)))
        .await
        .expect("timed out waiting for view")
        .expect("session loop gone");
    view.clone()
}

/// Open a session and bring it to the active round.
async fn active_session() -> (RoomSession, mpsc::Receiver<SessionEvent>, RoomServer) {
    let (session, mut events, server) = start(ConnectBehavior::Ready);
    server.push(RoomState::active().frame());
    reach_phase(&mut events, Phase::ActiveRound).await;
    (session, events, server)
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn join_is_the_first_frame_after_open() {
    let (mut session, mut events, server) = start(ConnectBehavior::Ready);

    let first = events.recv().await.unwrap();
    assert_eq!(first, SessionEvent::Connected);

    server.push(RoomState::lobby().frame());
    reach_phase(&mut events, Phase::Lobby).await;

    assert_eq!(server.urls(), vec!["ws://pot.test/ws/QZ7K2M/c1".to_string()]);
    assert_eq!(
        server.received().first(),
        Some(&ClientMessage::Join {
            name: "Ann".into(),
            avatar: "a.svg".into()
        })
    );
    assert_eq!(
        server.received_raw()[0],
        r#"{"action":"join","name":"Ann","avatar":"a.svg"}"#
    );

    session.shutdown().await;
}

#[tokio::test]
async fn phases_before_first_snapshot() {
    let (mut session, mut events, _server) = start(ConnectBehavior::Ready);
    assert_eq!(session.phase(), Phase::Connecting);

    next_matching(&mut events, |e| *e == SessionEvent::Connected).await;
    let view = view_where(&session, |v| v.phase == Phase::Loading).await;
    assert!(view.snapshot.is_none());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_connect_times_out_at_five_seconds() {
    let started = Instant::now();
    let (mut session, mut events, server) = start(ConnectBehavior::Fail);

    next_matching(&mut events, |e| *e == SessionEvent::ConnectionFailed).await;
    assert_eq!(started.elapsed(), Duration::from_millis(5000));
    assert_eq!(session.phase(), Phase::ConnectionError);

    let rest = drain(&mut events).await;
    assert!(matches!(
        rest.last(),
        Some(SessionEvent::Disconnected { reason: Some(r) }) if r == "connection timed out"
    ));
    assert!(server.received().is_empty());
    assert!(matches!(session.submit_score("5"), Err(PotRoomError::NotConnected)));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn late_open_after_watchdog_is_ignored() {
    let (mut session, mut events, server) = start(ConnectBehavior::Delay(Duration::from_secs(6)));

    next_matching(&mut events, |e| *e == SessionEvent::ConnectionFailed).await;
    let rest = drain(&mut events).await;
    assert!(!rest.contains(&SessionEvent::Connected));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.phase(), Phase::ConnectionError);
    assert!(server.received().is_empty());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn open_before_deadline_disarms_watchdog() {
    let (mut session, mut events, _server) =
        start(ConnectBehavior::Delay(Duration::from_millis(4900)));

    next_matching(&mut events, |e| *e == SessionEvent::Connected).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(session.phase(), Phase::Loading);
    assert!(session.is_connected());

    session.shutdown().await;
    let rest = drain(&mut events).await;
    assert!(!rest.contains(&SessionEvent::ConnectionFailed));
}

#[tokio::test]
async fn server_close_is_a_connection_error() {
    let (mut session, mut events, server) = active_session().await;

    server.hang_up();
    reach_phase(&mut events, Phase::ConnectionError).await;
    let rest = drain(&mut events).await;
    assert_eq!(rest.last(), Some(&SessionEvent::Disconnected { reason: None }));

    assert!(!session.is_connected());
    assert!(matches!(session.vote_to_end(), Err(PotRoomError::NotConnected)));
    session.shutdown().await;
}

#[tokio::test]
async fn receive_error_ends_session() {
    let (mut session, mut events, server) = active_session().await;

    server.break_channel();
    let rest = drain(&mut events).await;
    assert!(matches!(
        rest.last(),
        Some(SessionEvent::Disconnected { reason: Some(r) }) if r.starts_with("transport receive error")
    ));
    assert_eq!(session.phase(), Phase::ConnectionError);
    session.shutdown().await;
}

#[tokio::test]
async fn send_error_ends_session() {
    let (connector, _server) = mock_room_with(ConnectBehavior::Ready, true);
    let (mut session, mut events) = RoomSession::start(connector, config(), identity());

    let rest = drain(&mut events).await;
    assert!(matches!(
        rest.last(),
        Some(SessionEvent::Disconnected { reason: Some(r) }) if r.starts_with("transport send error")
    ));
    assert_eq!(session.phase(), Phase::ConnectionError);
    session.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_channel_and_disconnects_last() {
    let (mut session, mut events, server) = active_session().await;

    session.shutdown().await;
    assert!(server.was_closed());

    let rest = drain(&mut events).await;
    assert_eq!(
        rest.last(),
        Some(&SessionEvent::Disconnected {
            reason: Some("client shut down".into())
        })
    );
    assert!(matches!(session.start_game(), Err(PotRoomError::NotConnected)));
}

#[tokio::test]
async fn dropping_handle_closes_channel() {
    let (session, mut events, server) = active_session().await;
    drop(session);

    let rest = drain(&mut events).await;
    assert_eq!(
        rest.last(),
        Some(&SessionEvent::Disconnected {
            reason: Some("client shut down".into())
        })
    );
    assert!(server.was_closed());
    assert_eq!(server.urls().len(), 1);
}

// ════════════════════════════════════════════════════════════════════
// Inbound frames
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshots_drive_phase() {
    let (mut session, mut events, server) = start(ConnectBehavior::Ready);

    server.push(RoomState::lobby().frame());
    reach_phase(&mut events, Phase::Lobby).await;
    server.push(RoomState::active().frame());
    reach_phase(&mut events, Phase::ActiveRound).await;
    server.push(RoomState::game_over().frame());
    reach_phase(&mut events, Phase::GameOver).await;

    let view = session.view();
    let snapshot = view.snapshot.unwrap();
    assert!(snapshot.game_over);
    assert_eq!(snapshot.host_id(), Some(&ClientId::new(HOST)));
    assert!(!view.is_host);

    session.shutdown().await;
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_ignored() {
    let (mut session, mut events, server) = active_session().await;

    server.push("{not json");
    server.push(r#"{"type":"confetti","data":{}}"#);
    server.push(r#"{"type":"state_update","data":"oops"}"#);
    server.push(RoomState::active().votes(1).frame());

    let view = view_where(&session, |v| {
        v.snapshot.as_ref().is_some_and(|s| s.votes_to_end == 1)
    })
    .await;
    assert_eq!(view.phase, Phase::ActiveRound);
    assert_eq!(view.end_vote.unwrap().tally, Some((1, 2)));
    assert!(session.is_connected());

    server.push(error_frame("Room does not exist"));
    let event = next_matching(&mut events, |e| matches!(e, SessionEvent::ServerError { .. })).await;
    assert_eq!(
        event,
        SessionEvent::ServerError {
            message: "Room does not exist".into()
        }
    );

    session.shutdown().await;
}

#[tokio::test]
async fn player_left_is_reported() {
    let (mut session, mut events, server) = active_session().await;

    server.push(player_left_frame(HOST));
    let event = next_matching(&mut events, |e| matches!(e, SessionEvent::PlayerLeft { .. })).await;
    assert_eq!(
        event,
        SessionEvent::PlayerLeft {
            client_id: ClientId::new(HOST)
        }
    );

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Round result
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn round_result_shows_for_five_seconds() {
    let (mut session, mut events, server) = active_session().await;

    session.submit_score("150").unwrap();
    let sent = server.wait_received(2).await;
    assert_eq!(sent[1], ClientMessage::SubmitScore { score: "150".into() });
    server.push(RoomState::active().my_score(150.0).frame());
    view_where(&session, |v| v.flags.turn_done).await;

    server.push(round_end_frame("Hana"));
    let ended = next_matching(&mut events, |e| matches!(e, SessionEvent::RoundEnded(_))).await;
    let ended_at = Instant::now();
    let SessionEvent::RoundEnded(result) = ended else {
        unreachable!()
    };
    assert_eq!(result.pot, 150.0);
    assert_eq!(result.winners().collect::<Vec<_>>(), vec!["Hana"]);

    reach_phase(&mut events, Phase::RoundResult).await;
    let view = session.view();
    assert_eq!(view.countdown, Some(5));
    assert!(!view.flags.celebrate);
    assert_eq!(view.flags.events.len(), 1);

    let mut ticks = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            SessionEvent::Countdown { remaining } => ticks.push(remaining),
            SessionEvent::RoundResultCleared => break,
            _ => {}
        }
    }
    assert_eq!(ticks, vec![4, 3, 2, 1]);
    assert_eq!(ended_at.elapsed(), Duration::from_secs(5));

    reach_phase(&mut events, Phase::ActiveRound).await;
    let view = session.view();
    assert!(view.round_result.is_none());
    assert!(!view.flags.turn_done);
    assert!(view.flags.events.is_empty());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn snapshot_right_after_round_end_keeps_result() {
    let (mut session, mut events, server) = active_session().await;

    session.submit_score("150").unwrap();
    server.wait_received(2).await;

    // The server resets everyone's round score in the snapshot that follows.
    server.push(round_end_frame("Hana"));
    server.push(RoomState::active().frame());
    next_matching(&mut events, |e| *e == SessionEvent::SnapshotUpdated).await;

    let view = session.view();
    assert_eq!(view.phase, Phase::RoundResult);
    assert!(view.flags.turn_done);
    assert!(view.round_result.is_some());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn winner_celebrates() {
    let (mut session, mut events, server) = active_session().await;

    server.push(round_end_frame("Ann"));
    reach_phase(&mut events, Phase::RoundResult).await;
    assert!(session.view().flags.celebrate);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn skip_clears_result_immediately() {
    let (mut session, mut events, server) = active_session().await;

    server.push(round_end_frame("Ann"));
    reach_phase(&mut events, Phase::RoundResult).await;
    let skipped_at = Instant::now();

    session.skip_round_result().unwrap();
    reach_phase(&mut events, Phase::ActiveRound).await;
    assert_eq!(skipped_at.elapsed(), Duration::ZERO);
    assert_eq!(session.view().flags, RoundFlags::default());

    // No countdown keeps running after a skip.
    tokio::time::sleep(Duration::from_secs(10)).await;
    session.shutdown().await;
    let rest = drain(&mut events).await;
    assert!(!rest.iter().any(|e| matches!(e, SessionEvent::Countdown { .. })));
}

#[tokio::test(start_paused = true)]
async fn second_round_end_restarts_countdown() {
    let (mut session, mut events, server) = active_session().await;

    server.push(round_end_frame("Ann"));
    reach_phase(&mut events, Phase::RoundResult).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;

    server.push(round_end_frame("Hana"));
    let restarted_at = {
        next_matching(&mut events, |e| matches!(e, SessionEvent::RoundEnded(_))).await;
        Instant::now()
    };
    next_matching(&mut events, |e| *e == SessionEvent::RoundResultCleared).await;
    assert_eq!(restarted_at.elapsed(), Duration::from_secs(5));

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Intents
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn blank_score_sends_nothing() {
    let (mut session, _events, server) = active_session().await;

    session.submit_score("   ").unwrap();
    session.start_game().unwrap();
    let sent = server.wait_received(2).await;
    assert_eq!(sent, vec![
        ClientMessage::Join {
            name: "Ann".into(),
            avatar: "a.svg".into()
        },
        ClientMessage::StartGame,
    ]);
    assert!(!session.view().flags.turn_done);

    session.shutdown().await;
}

#[tokio::test]
async fn vote_to_end_is_sent_once_per_round() {
    let (mut session, mut events, server) = active_session().await;

    session.vote_to_end().unwrap();
    session.vote_to_end().unwrap();
    session.vote_to_end().unwrap();
    session.start_game().unwrap();
    let sent = server.wait_received(3).await;
    assert_eq!(&sent[1..], &[ClientMessage::VoteEnd, ClientMessage::StartGame]);

    let view = session.view();
    assert!(view.flags.voted_to_end);
    assert!(!view.end_vote.unwrap().available);

    // A fresh round re-arms the vote.
    server.push(round_end_frame("Ann"));
    reach_phase(&mut events, Phase::RoundResult).await;
    session.skip_round_result().unwrap();
    reach_phase(&mut events, Phase::ActiveRound).await;
    session.vote_to_end().unwrap();
    let sent = server.wait_received(4).await;
    assert_eq!(sent[3], ClientMessage::VoteEnd);

    session.shutdown().await;
}

#[tokio::test]
async fn end_vote_echo_keeps_vote_spent() {
    let (mut session, _events, server) = active_session().await;

    session.vote_to_end().unwrap();
    server.wait_received(2).await;

    // The server answers the vote with a snapshot of the same round.
    server.push(RoomState::active().votes(1).frame());
    let view = view_where(&session, |v| {
        v.snapshot.as_ref().is_some_and(|s| s.votes_to_end == 1)
    })
    .await;
    assert!(view.flags.voted_to_end);
    assert_eq!(view.end_vote.unwrap().tally, Some((1, 2)));

    session.vote_to_end().unwrap();
    session.start_game().unwrap();
    let sent = server.wait_received(3).await;
    assert_eq!(&sent[1..], &[ClientMessage::VoteEnd, ClientMessage::StartGame]);
    let votes = sent.iter().filter(|m| **m == ClientMessage::VoteEnd).count();
    assert_eq!(votes, 1);

    session.shutdown().await;
}

#[tokio::test]
async fn restart_waits_for_host_then_votes_once() {
    let (mut session, mut events, server) = start(ConnectBehavior::Ready);
    server.push(RoomState::game_over().frame());
    reach_phase(&mut events, Phase::GameOver).await;

    assert_eq!(session.view().restart, Some(RestartControl::WaitingForHost));
    session.vote_to_restart().unwrap();

    server.push(RoomState::game_over().restart_vote(HOST).frame());
    let view = view_where(&session, |v| v.restart == Some(RestartControl::Enabled)).await;
    assert_eq!(view.phase, Phase::GameOver);

    session.vote_to_restart().unwrap();
    session.vote_to_restart().unwrap();
    session.start_game().unwrap();
    let sent = server.wait_received(3).await;
    assert_eq!(&sent[1..], &[ClientMessage::VoteRestart, ClientMessage::StartGame]);

    let view = view_where(&session, |v| {
        matches!(v.restart, Some(RestartControl::AlreadyVoted { .. }))
    })
    .await;
    assert_eq!(
        view.restart,
        Some(RestartControl::AlreadyVoted {
            votes: 1,
            players: 2
        })
    );

    session.shutdown().await;
}

#[tokio::test]
async fn event_channel_overflow_still_delivers_disconnected() {
    let (connector, server) = mock_room(ConnectBehavior::Ready);
    let config = config().with_event_channel_capacity(1);
    let (mut session, mut events) = RoomSession::start(connector, config, identity());

    server.push(RoomState::lobby().frame());
    server.push(RoomState::active().frame());
    server.push(error_frame("one"));
    server.push(error_frame("two"));
    view_where(&session, |v| v.phase == Phase::ActiveRound).await;
    server.wait_received(1).await;

    let shutdown = tokio::spawn(async move {
        session.shutdown().await;
    });
    let rest = drain(&mut events).await;
    shutdown.await.unwrap();
    assert!(matches!(rest.last(), Some(SessionEvent::Disconnected { .. })));
}
