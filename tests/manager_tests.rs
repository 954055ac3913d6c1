// Session manager lifecycle and fan-out tests, driven entirely through the
// public API with injected scripted engines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use voxstream::engine::{EngineConfig, ScriptedEngine};
use voxstream::protocol::ChannelMessage;
use voxstream::server::{ChannelKind, SessionManager};

const WAIT: Duration = Duration::from_secs(5);

/// Manager whose factory counts constructions and plays the given script.
fn scripted_manager(script: &[&str]) -> (Arc<SessionManager>, Arc<AtomicUsize>) {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructions);
    let script: Vec<String> = script.iter().map(|s| s.to_string()).collect();

    let manager = SessionManager::with_factory(
        EngineConfig::default(),
        Box::new(move |_cfg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedEngine::with_script(
                script.clone(),
                Duration::from_millis(10),
            )))
        }),
    );

    (Arc::new(manager), constructions)
}

async fn wait_until_running(manager: &Arc<SessionManager>) {
    timeout(WAIT, async {
        while !manager.probe().await.engine_initialized {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("engine did not reach running state");
}

fn parse(payload: &str) -> ChannelMessage {
    serde_json::from_str(payload).expect("valid channel message")
}

async fn next_transcription(rx: &mut tokio::sync::mpsc::Receiver<String>) -> String {
    loop {
        let payload = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for fragment")
            .expect("channel closed");
        if let ChannelMessage::Transcription { text, .. } = parse(&payload) {
            return text;
        }
    }
}

#[tokio::test]
async fn start_is_idempotent() {
    let (manager, constructions) = scripted_manager(&[]);

    let (first, second) = tokio::join!(manager.start(), manager.start());
    assert!(first.ok && second.ok);

    wait_until_running(&manager).await;
    assert_eq!(constructions.load(Ordering::SeqCst), 1);

    // A start while running is a no-op ack, not a second engine
    let again = manager.start().await;
    assert!(again.ok);
    assert!(again.message.contains("already"));
    assert_eq!(constructions.load(Ordering::SeqCst), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn probe_reports_engine_and_subscribers() {
    let (manager, _) = scripted_manager(&[]);

    let probe = manager.probe().await;
    assert_eq!(probe.status, "ok");
    assert_eq!(probe.active_subscriber_count, 0);
    assert!(!probe.engine_initialized);

    let (_id1, _rx1) = manager.subscribe(ChannelKind::Transcript).await;
    let (_id2, _rx2) = manager.subscribe(ChannelKind::Status).await;
    assert_eq!(manager.probe().await.active_subscriber_count, 2);
}

#[tokio::test]
async fn failed_init_reverts_to_shut_down_with_reason() {
    let manager = Arc::new(SessionManager::with_factory(
        EngineConfig::default(),
        Box::new(|_cfg| anyhow::bail!("model file missing")),
    ));

    manager.start().await;

    let last_error = timeout(WAIT, async {
        loop {
            let probe = manager.probe().await;
            if let Some(err) = probe.last_error {
                return err;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("failure was never surfaced");

    assert!(last_error.contains("model file missing"));
    assert!(!manager.probe().await.engine_initialized);
    assert!(manager.current_status().await.is_shut_down);

    // The manager stays usable; a later start goes back to initializing
    let ack = manager.start().await;
    assert!(ack.ok);
}

#[tokio::test]
async fn fragments_fan_out_to_all_transcript_subscribers() {
    let (manager, _) = scripted_manager(&["alpha", "beta"]);

    let (_a, mut rx_a) = manager.subscribe(ChannelKind::Transcript).await;
    let (_b, mut rx_b) = manager.subscribe(ChannelKind::Transcript).await;
    let (_c, mut rx_c) = manager.subscribe(ChannelKind::Transcript).await;

    manager.start().await;
    wait_until_running(&manager).await;

    for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
        assert_eq!(next_transcription(rx).await, "alpha");
    }

    manager.shutdown().await;
}

#[tokio::test]
async fn one_dead_subscriber_does_not_block_the_rest() {
    let (manager, _) = scripted_manager(&["first", "second", "third"]);

    let (_a, mut rx_a) = manager.subscribe(ChannelKind::Transcript).await;
    let (_b, rx_b) = manager.subscribe(ChannelKind::Transcript).await;
    let (_c, mut rx_c) = manager.subscribe(ChannelKind::Transcript).await;

    manager.start().await;
    wait_until_running(&manager).await;

    assert_eq!(next_transcription(&mut rx_a).await, "first");
    assert_eq!(next_transcription(&mut rx_c).await, "first");

    // One subscriber dies mid-stream
    drop(rx_b);

    assert_eq!(next_transcription(&mut rx_a).await, "second");
    assert_eq!(next_transcription(&mut rx_c).await, "second");
    assert_eq!(next_transcription(&mut rx_a).await, "third");
    assert_eq!(next_transcription(&mut rx_c).await, "third");

    manager.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_engine_and_reports_offline() {
    let (manager, _) = scripted_manager(&[]);

    manager.start().await;
    wait_until_running(&manager).await;
    assert!(manager.current_status().await.is_running);

    let ack = manager.shutdown().await;
    assert!(ack.ok);
    assert_eq!(ack.message, "Engine stopped");

    let status = manager.current_status().await;
    assert!(status.is_shut_down);
    assert!(!status.is_running);
    assert!(!status.is_recording);
    assert!(!manager.probe().await.engine_initialized);

    // A second shutdown is a no-op
    let again = manager.shutdown().await;
    assert!(again.message.contains("already"));
}

#[tokio::test]
async fn status_sampler_pushes_snapshots() {
    let (manager, _) = scripted_manager(&[]);
    let sampler = manager.spawn_status_sampler(Duration::from_millis(20));

    let (_id, mut rx) = manager.subscribe(ChannelKind::Status).await;

    let payload = timeout(WAIT, rx.recv())
        .await
        .expect("no status sample arrived")
        .expect("status channel closed");

    match parse(&payload) {
        ChannelMessage::Status { status, timestamp } => {
            assert!(status.is_shut_down);
            assert!(timestamp > 0.0);
        }
        other => panic!("expected status message, got {:?}", other),
    }

    sampler.abort();
}
