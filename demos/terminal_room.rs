//! # Terminal Room
//!
//! Plays one pot room from the terminal:
//!
//! 1. Load (or create) the session identity from a small JSON file
//! 2. Open the room channel over WebSocket
//! 3. Print phase changes, round results and the leaderboard
//! 4. Read commands from stdin until `quit` or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a room server on localhost:8000, then:
//! cargo run --example terminal_room -- QZ7K2M Ann
//!
//! # Create a fresh room first (needs the http-rooms feature):
//! cargo run --example terminal_room --features http-rooms -- new Ann
//!
//! # Override the server address:
//! POT_ROOM_URL=ws://my-server:8000 cargo run --example terminal_room -- QZ7K2M
//! ```
//!
//! Commands: `start`, `score <n>`, `end`, `restart`, `skip`, `quit`.

use pot_room_client::identity::{load_or_create, FileSessionStore};
use pot_room_client::{Phase, RoomSession, SessionConfig, SessionEvent, SessionView, WebSocketConnector};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default server address when `POT_ROOM_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let url = std::env::var("POT_ROOM_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let mut args = std::env::args().skip(1);
    let Some(room_arg) = args.next() else {
        eprintln!("usage: terminal_room <ROOM_CODE|new> [NAME]");
        return Ok(());
    };
    let name = args.next();

    let room_code = if room_arg == "new" {
        create_room(&url).await?
    } else {
        room_arg
    };

    let session_file = std::env::temp_dir().join("pot-room-session.json");
    let mut store = FileSessionStore::open(&session_file)?;
    let identity = load_or_create(&mut store, name.as_deref(), None)?;
    tracing::info!(
        "Joining {room_code} as {} ({})",
        identity.display_name,
        identity.client_id
    );

    let config = SessionConfig::new(url, room_code);
    let (mut session, mut events) = RoomSession::start(WebSocketConnector, config, identity);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    SessionEvent::PhaseChanged { to, .. } => {
                        println!("── {to} ──");
                        print_view(&session.view());
                    }
                    SessionEvent::RoundEnded(result) => {
                        println!("Round {} ended, pot {:.0}", result.round_num, result.pot);
                        for row in &result.details {
                            let mark = if row.is_winner { "★" } else { " " };
                            println!("  {mark} {:<12} {:+8.1} → {:8.1}", row.name, row.change, row.total);
                        }
                        for cue in result.cues() {
                            println!("  {:?}: {} ({})", cue.kind, cue.player, cue.streak);
                        }
                    }
                    SessionEvent::Countdown { remaining } => println!("  next round in {remaining}…"),
                    SessionEvent::PlayerLeft { client_id } => println!("  player {client_id} left"),
                    SessionEvent::ServerError { message } => println!("  server: {message}"),
                    SessionEvent::SnapshotUpdated => {
                        if session.phase() == Phase::ActiveRound {
                            print_view(&session.view());
                        }
                    }
                    SessionEvent::Disconnected { reason } => {
                        println!("Disconnected: {}", reason.as_deref().unwrap_or("server closed"));
                    }
                    SessionEvent::Connected
                    | SessionEvent::ConnectionFailed
                    | SessionEvent::RoundResultCleared => {}
                }
            }

            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let mut words = line.split_whitespace();
                let result = match (words.next(), words.next()) {
                    (Some("start"), _) => session.start_game(),
                    (Some("score"), Some(value)) => session.submit_score(value),
                    (Some("end"), _) => session.vote_to_end(),
                    (Some("restart"), _) => session.vote_to_restart(),
                    (Some("skip"), _) => session.skip_round_result(),
                    (Some("quit"), _) => break,
                    _ => {
                        println!("commands: start | score <n> | end | restart | skip | quit");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    println!("  {e}");
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn print_view(view: &SessionView) {
    let Some(snapshot) = &view.snapshot else {
        return;
    };
    match view.phase {
        Phase::Lobby => {
            println!("Waiting in lobby ({} players)", snapshot.players.len());
            if view.is_host {
                println!("  you are the host: type `start`");
            }
        }
        Phase::ActiveRound => {
            println!("Round {} / {}", snapshot.current_round, snapshot.total_rounds);
            for (_, player) in snapshot.leaderboard() {
                let done = if player.has_submitted() { "✓" } else { "…" };
                if snapshot.show_scores {
                    println!("  {done} {:<12} {:8.1}", player.name, player.total_score);
                } else {
                    println!("  {done} {}", player.name);
                }
            }
            if let Some((votes, players)) = view.end_vote.and_then(|c| c.tally) {
                println!("  {votes}/{players} voted to end");
            }
        }
        Phase::GameOver => {
            println!("Final standings:");
            for (rank, (_, player)) in snapshot.leaderboard().into_iter().enumerate() {
                println!("  {}. {:<12} {:8.1}", rank + 1, player.name, player.total_score);
            }
            if let Some(restart) = view.restart {
                println!("  restart: {restart:?}");
            }
        }
        Phase::Connecting | Phase::ConnectionError | Phase::Loading | Phase::RoundResult => {}
    }
}

#[cfg(feature = "http-rooms")]
async fn create_room(url: &str) -> Result<String, Box<dyn std::error::Error>> {
    use pot_room_client::rooms::{RoomsClient, DEFAULT_ROUNDS};

    let http_url = url.replacen("ws", "http", 1);
    let code = RoomsClient::new(http_url)?
        .create_room(DEFAULT_ROUNDS, true)
        .await?;
    println!("Created room {code}");
    Ok(code)
}

#[cfg(not(feature = "http-rooms"))]
async fn create_room(_url: &str) -> Result<String, Box<dyn std::error::Error>> {
    Err("creating rooms needs the http-rooms feature".into())
}
