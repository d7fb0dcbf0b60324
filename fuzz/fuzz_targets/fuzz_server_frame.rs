#![no_main]

use libfuzzer_sys::fuzz_target;
use pot_room_client::connection::decode_frame;
use pot_room_client::protocol::ServerMessage;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<ServerMessage>(data);

    // Whatever arrives on the channel must decode or be dropped, never panic.
    if let Ok(text) = std::str::from_utf8(data) {
        if let Some(ServerMessage::StateUpdate { data }) = decode_frame(text) {
            let _ = data.leaderboard();
            let _ = data.host_voted_restart();
        }
    }
});
