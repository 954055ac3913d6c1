// Terminal client for the voxstream server.
//
// Renders transcript fragments and engine status transitions as they
// arrive, and maps stdin commands onto the session controller:
//   start | stop | clear | copy | quit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::warn;
use voxstream::{ClientSessionState, ConnectionPhase, ControllerConfig, SessionController};

#[derive(Debug, Parser)]
#[command(name = "voxstream-client", about = "Terminal client for the voxstream server")]
struct Args {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server_url: String,

    /// Liveness probe interval in seconds
    #[arg(long, default_value_t = 5)]
    probe_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let controller = SessionController::new(ControllerConfig {
        server_url: args.server_url,
        probe_interval: Duration::from_secs(args.probe_interval_secs),
        ..ControllerConfig::default()
    })?;

    let runner = tokio::spawn(Arc::clone(&controller).run());
    let renderer = tokio::spawn(render_loop(controller.watch_state()));

    println!("Commands: start | stop | clear | copy | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "start" => {
                if let Err(e) = controller.start_engine().await {
                    warn!("Start request failed: {}", e);
                }
            }
            "stop" | "shutdown" => {
                if let Err(e) = controller.shutdown_engine().await {
                    warn!("Shutdown request failed: {}", e);
                }
            }
            "clear" => controller.clear_transcript(),
            "copy" => println!("--- transcript ---\n{}\n------------------", controller.transcript()),
            "quit" | "exit" => break,
            "" => {}
            other => println!("Unknown command: {} (start | stop | clear | copy | quit)", other),
        }
    }

    renderer.abort();
    runner.abort();
    Ok(())
}

/// Print connection/status transitions and new transcript text as the
/// controller state changes.
async fn render_loop(mut rx: watch::Receiver<ClientSessionState>) {
    let mut last_phase = ConnectionPhase::Disconnected;
    let mut last_status = None;
    let mut printed_len = 0usize;

    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();

        if snapshot.phase != last_phase {
            println!("[connection] {:?}", snapshot.phase);
            last_phase = snapshot.phase;
        }

        if last_status != Some(snapshot.status) {
            println!(
                "[engine] recording={} running={} shut_down={} initializing={}",
                snapshot.status.is_recording,
                snapshot.status.is_running,
                snapshot.status.is_shut_down,
                snapshot.status.is_initializing,
            );
            last_status = Some(snapshot.status);
        }

        if snapshot.transcript.len() < printed_len {
            // Buffer was cleared
            printed_len = 0;
            println!("[transcript cleared]");
        }
        if snapshot.transcript.len() > printed_len {
            let fresh = snapshot.transcript[printed_len..].trim_start();
            println!("> {}", fresh);
            printed_len = snapshot.transcript.len();
        }
    }
}
