use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info};

use super::backend::{EngineConfig, RecognitionEngine};

/// How often a blocked `next_fragment` re-checks the running flag, and the
/// granularity of the feeder's interruptible sleep.
const WAKE_POLL: Duration = Duration::from_millis(100);

/// Deterministic engine that replays a configured utterance script.
///
/// A feeder thread emits one utterance per interval; `next_fragment` blocks
/// on the feed the way a real recognizer blocks on voice activity. Once the
/// script is exhausted the engine stays running but silent until `shutdown`.
#[derive(Debug)]
pub struct ScriptedEngine {
    label: String,
    running: Arc<AtomicBool>,
    recording: Arc<AtomicBool>,
    feed: Receiver<String>,
    feeder: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ScriptedEngine {
    pub fn new(config: &EngineConfig) -> Self {
        let warmup = Duration::from_millis(config.scripted.warmup_ms);
        if !warmup.is_zero() {
            debug!(model = %config.model, "Simulating engine warm-up");
            thread::sleep(warmup);
        }

        let engine = Self::from_parts(
            format!("scripted:{}", config.model),
            config.scripted.script.clone(),
            Duration::from_millis(config.scripted.interval_ms),
        );
        info!(
            model = %config.model,
            language = %config.language,
            "Scripted engine ready"
        );
        engine
    }

    /// Build an engine straight from a script, skipping config and warm-up.
    pub fn with_script(script: Vec<String>, interval: Duration) -> Self {
        Self::from_parts("scripted".to_string(), script, interval)
    }

    fn from_parts(label: String, script: Vec<String>, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let recording = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(32);

        let feeder = {
            let running = Arc::clone(&running);
            let recording = Arc::clone(&recording);
            thread::spawn(move || feeder_loop(script, interval, running, recording, tx))
        };

        Self {
            label,
            running,
            recording,
            feed: rx,
            feeder: Mutex::new(Some(feeder)),
        }
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn next_fragment(&self) -> Result<Option<String>> {
        loop {
            match self.feed.recv_timeout(WAKE_POLL) {
                Ok(text) => return Ok(Some(text)),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.running.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }

    fn is_recording(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.recording.load(Ordering::SeqCst)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.recording.store(false, Ordering::SeqCst);

        let feeder = match self.feeder.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = feeder {
            let _ = handle.join();
        }

        info!(engine = %self.label, "Scripted engine stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

fn feeder_loop(
    script: Vec<String>,
    interval: Duration,
    running: Arc<AtomicBool>,
    recording: Arc<AtomicBool>,
    tx: Sender<String>,
) {
    for utterance in script {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        recording.store(true, Ordering::SeqCst);
        if !sleep_while_running(&running, interval) {
            break;
        }
        if tx.send(utterance).is_err() {
            break;
        }
    }
    recording.store(false, Ordering::SeqCst);

    // Script exhausted: stay idle with the feed open until shutdown, so the
    // poll loop keeps blocking like it would on a silent microphone.
    while running.load(Ordering::SeqCst) {
        thread::sleep(WAKE_POLL);
    }
}

/// Sleep in short slices so shutdown interrupts a long interval. Returns
/// false if the engine stopped mid-sleep.
fn sleep_while_running(running: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(WAKE_POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
    running.load(Ordering::SeqCst)
}
