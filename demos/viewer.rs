//! WebRTC Stream Viewer Example
//!
//! Connects to a WebSocket signaling server, requests the live stream and
//! prints every connection state change until Ctrl+C.
//!
//! Usage:
//!   cargo run --example viewer -- <ws_url> [--video-only]
//!
//! Examples:
//!   VIEWER_TOKEN=secret cargo run --example viewer -- ws://localhost:8080/viewer
//!   RUST_LOG=debug cargo run --example viewer -- wss://example.com/signal --video-only

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use webrtc_viewer::{
    ConnectionConfig, ConnectionState, MediaConstraints, SessionValidity, TokenPresence, ViewerSession,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <ws_url> [--video-only]", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} ws://localhost:8080/viewer", args[0]);
        eprintln!("  {} wss://example.com/signal --video-only", args[0]);
        std::process::exit(1);
    }

    let url = &args[1];
    let video_only = args.iter().any(|a| a == "--video-only");

    println!("========================================");
    println!("  WebRTC Stream Viewer");
    println!("========================================");
    println!();
    println!("Signaling URL: {}", url);
    println!("Video only:    {}", video_only);
    println!();

    // Viewing requires a valid session
    if !TokenPresence::from_env("VIEWER_TOKEN").is_authenticated().await {
        eprintln!("[ERROR] VIEWER_TOKEN is not set, refusing to start a session");
        std::process::exit(1);
    }

    let mut config = ConnectionConfig::new(url.as_str());
    if video_only {
        config = config.with_constraints(MediaConstraints {
            audio: false,
            video: true,
        });
    }

    let mut session = ViewerSession::new(config);
    let mut updates = session.subscribe();

    println!("Connecting to signaling server...");
    session.connect().await.map_err(|e| format!("Failed to connect: {}", e))?;
    println!("[OK] Signaling connected, waiting for offer");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, shutting down...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    println!("Watching connection... Press Ctrl+C to stop.");
    println!();

    while running.load(Ordering::SeqCst) {
        match tokio::time::timeout(Duration::from_millis(500), updates.changed()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => break,
            Err(_) => continue,
        }

        let snapshot = updates.borrow_and_update().clone();
        match snapshot.state {
            ConnectionState::Failed => println!("State: failed ({})", snapshot.error),
            state => println!("State: {:?}", state),
        }
        if let Some(stream) = &snapshot.stream {
            println!(
                "Stream '{}': {} audio, {} video track(s)",
                stream.id(),
                stream.audio_tracks().count(),
                stream.video_tracks().count()
            );
        }
    }

    println!();
    println!("Disconnecting...");
    session.disconnect().await;
    println!("[OK] Disconnected");

    Ok(())
}
