use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::subscribers::{ChannelKind, SubscriberRegistry};
use crate::engine::{EngineConfig, EngineFactory, RecognitionEngine};
use crate::error::Error;
use crate::protocol::{unix_timestamp, ChannelMessage, ControlAck, EngineStatus, ProbeResponse};

/// Per-subscriber send queue depth.
const SUBSCRIBER_QUEUE: usize = 256;

/// Pause after a failed engine poll before retrying.
const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(500);

type EngineFactoryFn =
    dyn Fn(&EngineConfig) -> Result<Box<dyn RecognitionEngine>> + Send + Sync;

/// Engine lifecycle phases. Transitions happen only inside control
/// operations, never from subscriber paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnginePhase {
    Uninitialized,
    Initializing,
    Running,
    ShutDown,
}

struct Lifecycle {
    phase: EnginePhase,
    last_error: Option<String>,
}

/// Owns the single recognition-engine instance and fans its output out to
/// every connected subscriber.
///
/// The engine is created lazily on the first `start` and released on
/// `shutdown`. Construction and fragment polling run on blocking workers so
/// a slow warm-up never delays a probe or another client's control request.
pub struct SessionManager {
    config: EngineConfig,
    factory: Box<EngineFactoryFn>,
    lifecycle: RwLock<Lifecycle>,
    engine: Mutex<Option<Arc<dyn RecognitionEngine>>>,
    transcripts: SubscriberRegistry,
    statuses: SubscriberRegistry,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_factory(config, Box::new(|cfg| EngineFactory::create(cfg)))
    }

    /// Build a manager with a custom engine factory. Used by tests to
    /// inject counting or failing engines.
    pub fn with_factory(config: EngineConfig, factory: Box<EngineFactoryFn>) -> Self {
        Self {
            config,
            factory,
            lifecycle: RwLock::new(Lifecycle {
                phase: EnginePhase::Uninitialized,
                last_error: None,
            }),
            engine: Mutex::new(None),
            transcripts: SubscriberRegistry::new(ChannelKind::Transcript, SUBSCRIBER_QUEUE),
            statuses: SubscriberRegistry::new(ChannelKind::Status, SUBSCRIBER_QUEUE),
            poll_task: Mutex::new(None),
        }
    }

    /// Liveness snapshot. Never blocks on engine state.
    pub async fn probe(&self) -> ProbeResponse {
        let lifecycle = self.lifecycle.read().await;
        ProbeResponse {
            status: "ok".to_string(),
            active_subscriber_count: self.transcripts.count().await + self.statuses.count().await,
            engine_initialized: lifecycle.phase == EnginePhase::Running,
            last_error: lifecycle.last_error.clone(),
        }
    }

    /// Start the engine. A no-op ack when it is already running or already
    /// initializing; construction itself happens in the background.
    pub async fn start(self: &Arc<Self>) -> ControlAck {
        {
            let mut lifecycle = self.lifecycle.write().await;
            match lifecycle.phase {
                EnginePhase::Running => {
                    warn!("Engine start requested while already running");
                    return ControlAck::ok("Engine already running");
                }
                EnginePhase::Initializing => {
                    warn!("Engine start requested while initializing");
                    return ControlAck::ok("Engine initialization already in progress");
                }
                EnginePhase::Uninitialized | EnginePhase::ShutDown => {
                    lifecycle.phase = EnginePhase::Initializing;
                    lifecycle.last_error = None;
                }
            }
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.initialize_engine().await;
        });

        ControlAck::ok("Engine initialization started")
    }

    async fn initialize_engine(self: Arc<Self>) {
        info!(
            model = %self.config.model,
            language = %self.config.language,
            "Initializing recognition engine"
        );

        let builder = Arc::clone(&self);
        let built =
            tokio::task::spawn_blocking(move || (builder.factory)(&builder.config)).await;

        match built {
            Ok(Ok(engine)) => {
                let engine: Arc<dyn RecognitionEngine> = Arc::from(engine);
                info!(engine = engine.name(), "Recognition engine initialized");

                *self.engine.lock().await = Some(Arc::clone(&engine));
                self.lifecycle.write().await.phase = EnginePhase::Running;

                let poller = Arc::clone(&self);
                let task = tokio::spawn(async move {
                    poller.poll_loop().await;
                });
                *self.poll_task.lock().await = Some(task);
            }
            Ok(Err(e)) => {
                let failure = Error::EngineInitFailure(format!("{:#}", e));
                error!("{}", failure);
                let mut lifecycle = self.lifecycle.write().await;
                lifecycle.phase = EnginePhase::ShutDown;
                lifecycle.last_error = Some(failure.to_string());
            }
            Err(e) => {
                let failure = Error::EngineInitFailure(format!("init task panicked: {}", e));
                error!("{}", failure);
                let mut lifecycle = self.lifecycle.write().await;
                lifecycle.phase = EnginePhase::ShutDown;
                lifecycle.last_error = Some(failure.to_string());
            }
        }
    }

    /// Stop the engine and release its resources.
    pub async fn shutdown(&self) -> ControlAck {
        let engine = self.engine.lock().await.take();
        let Some(engine) = engine else {
            warn!("Engine shutdown requested but no engine is present");
            return ControlAck::ok("Engine already stopped");
        };

        info!("Shutting down recognition engine");
        self.lifecycle.write().await.phase = EnginePhase::ShutDown;

        let stopped = tokio::task::spawn_blocking(move || engine.shutdown()).await;
        match stopped {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Engine shutdown failed: {:#}", e),
            Err(e) => error!("Engine shutdown task panicked: {}", e),
        }

        if let Some(task) = self.poll_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Transcript poll task panicked: {}", e);
            }
        }

        info!("Engine stopped");
        ControlAck::ok("Engine stopped")
    }

    /// Current engine state snapshot.
    pub async fn current_status(&self) -> EngineStatus {
        let phase = self.lifecycle.read().await.phase;
        match phase {
            EnginePhase::Initializing => EngineStatus::initializing(),
            EnginePhase::Running => {
                let engine = self.engine.lock().await.clone();
                match engine {
                    Some(engine) => EngineStatus {
                        is_recording: engine.is_recording(),
                        is_running: engine.is_running(),
                        is_shut_down: false,
                        is_initializing: false,
                    },
                    None => EngineStatus::offline(),
                }
            }
            EnginePhase::Uninitialized | EnginePhase::ShutDown => EngineStatus::offline(),
        }
    }

    /// Register a subscriber on one of the channels.
    pub async fn subscribe(&self, kind: ChannelKind) -> (Uuid, mpsc::Receiver<String>) {
        match kind {
            ChannelKind::Transcript => self.transcripts.register().await,
            ChannelKind::Status => self.statuses.register().await,
        }
    }

    pub async fn unsubscribe(&self, kind: ChannelKind, id: &Uuid) {
        match kind {
            ChannelKind::Transcript => self.transcripts.unregister(id).await,
            ChannelKind::Status => self.statuses.unregister(id).await,
        }
    }

    /// Spawn the loop that samples engine flags and fans status snapshots
    /// out to every status subscriber.
    pub fn spawn_status_sampler(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            info!("Status sampler started");
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let message = ChannelMessage::Status {
                    status: manager.current_status().await,
                    timestamp: unix_timestamp(),
                };
                manager.statuses.broadcast(&message).await;
            }
        })
    }

    /// Poll the engine for recognized text and fan each fragment out.
    ///
    /// Empty and consecutive-duplicate utterances are skipped. Poll errors
    /// are surfaced to subscribers and the loop keeps going; the loop ends
    /// when the engine slot is emptied or the engine reports end of stream.
    async fn poll_loop(self: Arc<Self>) {
        info!("Transcript poll loop started");
        let mut last_text = String::new();

        loop {
            let engine = self.engine.lock().await.clone();
            let Some(engine) = engine else { break };

            let polled =
                tokio::task::spawn_blocking(move || engine.next_fragment()).await;

            match polled {
                Ok(Ok(Some(text))) => {
                    let text = text.trim();
                    if text.is_empty() || text == last_text {
                        continue;
                    }
                    last_text = text.to_string();
                    let message = ChannelMessage::Transcription {
                        text: last_text.clone(),
                        timestamp: unix_timestamp(),
                    };
                    self.transcripts.broadcast(&message).await;
                }
                Ok(Ok(None)) => {
                    info!("Engine reported end of stream");
                    break;
                }
                Ok(Err(e)) => {
                    error!("Transcript poll failed: {:#}", e);
                    let message = ChannelMessage::Error {
                        error: e.to_string(),
                    };
                    self.transcripts.broadcast(&message).await;
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
                Err(e) => {
                    error!("Transcript poll task panicked: {}", e);
                    break;
                }
            }
        }

        info!("Transcript poll loop stopped");
    }
}
