#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the pot room protocol.
//!
//! Fixtures are frames as the room server actually emits them: integer
//! scores where the server computed whole numbers, `null` round scores,
//! and restart votes as a plain list of client ids.

use pot_room_client::connection::decode_frame;
use pot_room_client::protocol::{
    ClientId, ClientMessage, RoomSnapshot, ServerMessage, StreakKind,
};

// ════════════════════════════════════════════════════════════════════
// ClientMessage encoding
// ════════════════════════════════════════════════════════════════════

fn encode(msg: &ClientMessage) -> serde_json::Value {
    serde_json::to_value(msg).unwrap()
}

#[test]
fn join_frame() {
    let msg = ClientMessage::Join {
        name: "Ann".into(),
        avatar: "/avatars/fox.svg".into(),
    };
    assert_eq!(
        encode(&msg),
        serde_json::json!({"action": "join", "name": "Ann", "avatar": "/avatars/fox.svg"})
    );
}

#[test]
fn unit_actions_carry_only_the_tag() {
    assert_eq!(encode(&ClientMessage::StartGame), serde_json::json!({"action": "start_game"}));
    assert_eq!(encode(&ClientMessage::VoteEnd), serde_json::json!({"action": "vote_end"}));
    assert_eq!(
        encode(&ClientMessage::VoteRestart),
        serde_json::json!({"action": "vote_restart"})
    );
}

#[test]
fn score_is_sent_as_typed_text() {
    let msg = ClientMessage::SubmitScore {
        score: "12.5".into(),
    };
    assert_eq!(
        serde_json::to_string(&msg).unwrap(),
        r#"{"action":"submit_score","score":"12.5"}"#
    );
}

// ════════════════════════════════════════════════════════════════════
// ServerMessage decoding
// ════════════════════════════════════════════════════════════════════

const LOBBY_FRAME: &str = r#"{
    "type": "state_update",
    "data": {
        "room_code": "QZ7K2M",
        "players": {
            "0b6f3c1e-2f55-4a57-9d0c-6f1f0f3f4a11": {
                "name": "Hana", "avatar": "", "total_score": 0.0,
                "current_round_score": null, "win_streak": 0, "loss_streak": 0,
                "is_host": true
            }
        },
        "current_round": 1,
        "total_rounds": 5,
        "game_started": false,
        "game_over": false,
        "history": [],
        "show_scores": true,
        "votes": 0,
        "restart_votes": []
    }
}"#;

#[test]
fn state_update_fixture() {
    let Some(ServerMessage::StateUpdate { data }) = decode_frame(LOBBY_FRAME) else {
        panic!("expected state_update");
    };
    let host = ClientId::new("0b6f3c1e-2f55-4a57-9d0c-6f1f0f3f4a11");
    assert_eq!(data.room_code.as_deref(), Some("QZ7K2M"));
    assert_eq!(data.total_rounds, 5);
    assert!(!data.game_started);
    assert_eq!(data.host_id(), Some(&host));
    assert!(!data.player(&host).unwrap().has_submitted());
}

#[test]
fn state_update_mid_game_fixture() {
    let frame = r#"{"type":"state_update","data":{
        "room_code":"QZ7K2M",
        "players":{
            "a":{"name":"Ann","avatar":"","total_score":-40,"current_round_score":25.5,"win_streak":0,"loss_streak":2,"is_host":true},
            "b":{"name":"Bob","avatar":"","total_score":40,"current_round_score":null,"win_streak":2,"loss_streak":0,"is_host":false}
        },
        "current_round":3,"total_rounds":5,"game_started":true,"game_over":false,
        "history":[{"round_num":1,"pot":40,"details":[
            {"name":"Ann","avatar":"","score_input":40,"change":-40,"total":-40,"is_winner":false,"win_streak":0,"loss_streak":1},
            {"name":"Bob","avatar":"","score_input":0,"change":40.0,"total":40.0,"is_winner":true,"win_streak":1,"loss_streak":0}
        ],"events":[]}],
        "show_scores":false,"votes":1,"restart_votes":[]
    }}"#;
    let Some(ServerMessage::StateUpdate { data }) = decode_frame(frame) else {
        panic!("expected state_update");
    };
    assert_eq!(data.votes_to_end, 1);
    assert_eq!(data.history.len(), 1);
    assert_eq!(data.history[0].details[1].change, 40.0);
    assert_eq!(data.player(&ClientId::new("a")).unwrap().current_round_score, Some(25.5));
    assert!(!data.player(&ClientId::new("b")).unwrap().has_submitted());

    let ranked: Vec<_> = data.leaderboard().into_iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ranked, ["b", "a"]);
}

#[test]
fn restart_votes_decode_as_id_set() {
    let frame = r#"{"type":"state_update","data":{
        "players":{"h":{"name":"Hana","is_host":true},"g":{"name":"Gus"}},
        "game_started":true,"game_over":true,
        "restart_votes":["h","h"]
    }}"#;
    let Some(ServerMessage::StateUpdate { data }) = decode_frame(frame) else {
        panic!("expected state_update");
    };
    assert_eq!(data.restart_votes.len(), 1);
    assert!(data.host_voted_restart());
}

#[test]
fn round_end_fixture() {
    let frame = r#"{"type":"round_end","data":{
        "round_num":4,"pot":150,
        "details":[
            {"name":"Ann","avatar":"","score_input":0,"change":75.0,"total":75.0,"is_winner":true,"win_streak":1,"loss_streak":0},
            {"name":"Cid","avatar":"","score_input":0,"change":75.0,"total":10.0,"is_winner":true,"win_streak":3,"loss_streak":0},
            {"name":"Bob","avatar":"","score_input":150,"change":-150,"total":-85.0,"is_winner":false,"win_streak":0,"loss_streak":3}
        ],
        "events":[
            {"type":"comeback","player":"Ann","streak":4},
            {"type":"win_streak","player":"Cid","streak":3},
            {"type":"loss_streak","player":"Bob","streak":3}
        ]
    }}"#;
    let Some(ServerMessage::RoundEnd { data }) = decode_frame(frame) else {
        panic!("expected round_end");
    };
    assert_eq!(data.pot, 150.0);
    assert_eq!(data.winners().collect::<Vec<_>>(), ["Ann", "Cid"]);
    let kinds: Vec<_> = data.cues().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [StreakKind::Comeback, StreakKind::WinStreak, StreakKind::LossStreak]
    );
    assert_eq!(data.detail_for("Bob").unwrap().score_input, Some(150.0));
}

#[test]
fn round_end_without_events() {
    let frame = r#"{"type":"round_end","data":{"round_num":1,"pot":0,"details":[]}}"#;
    let Some(ServerMessage::RoundEnd { data }) = decode_frame(frame) else {
        panic!("expected round_end");
    };
    assert!(data.events.is_none());
    assert!(data.cues().is_empty());
    assert_eq!(data.winners().count(), 0);
}

#[test]
fn side_channel_frames() {
    assert_eq!(
        decode_frame(r#"{"type":"player_left","client_id":"b"}"#),
        Some(ServerMessage::PlayerLeft {
            client_id: ClientId::new("b")
        })
    );
    assert_eq!(
        decode_frame(r#"{"type":"error","message":"Room does not exist"}"#),
        Some(ServerMessage::Error {
            message: "Room does not exist".into()
        })
    );
}

#[test]
fn unknown_kinds_decode_to_unknown() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"chat","text":"hi","from":"b"}"#).unwrap();
    assert_eq!(msg, ServerMessage::Unknown);
    assert!(decode_frame(r#"{"type":"chat","text":"hi"}"#).is_none());
}

#[test]
fn malformed_frames_are_dropped() {
    assert!(decode_frame("").is_none());
    assert!(decode_frame("[]").is_none());
    assert!(decode_frame(r#"{"data":{}}"#).is_none());
    assert!(decode_frame(r#"{"type":"round_end","data":{"pot":"lots"}}"#).is_none());
    assert!(decode_frame(r#"{"type":"state_update"}"#).is_none());
}

#[test]
fn snapshot_serializes_votes_under_wire_name() {
    let snapshot = RoomSnapshot {
        votes_to_end: 2,
        ..Default::default()
    };
    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["votes"], 2);
    assert!(value.get("votes_to_end").is_none());
    assert!(value.get("room_code").is_none());
}
