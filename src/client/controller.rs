use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::state::{ClientSessionState, ConnectionPhase};
use crate::error::Error;
use crate::protocol::{ChannelMessage, ControlAck, ProbeResponse};

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Server base URL, e.g. "http://127.0.0.1:8000"
    pub server_url: String,

    /// Liveness probe period
    pub probe_interval: Duration,

    /// Timeout applied to probe and control requests
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            probe_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(3),
        }
    }
}

/// Owns the connection lifecycle on the client side.
///
/// A probe loop runs unconditionally; channels are opened only after a
/// successful probe, and a channel failure only marks the state
/// disconnected. Reconnection is always driven by the next successful
/// probe, never by the failure itself.
pub struct SessionController {
    config: ControllerConfig,
    base_url: String,
    http: reqwest::Client,
    state: watch::Sender<ClientSessionState>,
    channel_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(config: ControllerConfig) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = config.server_url.trim_end_matches('/').to_string();
        let (state, _) = watch::channel(ClientSessionState::default());

        Ok(Arc::new(Self {
            config,
            base_url,
            http,
            state,
            channel_task: Mutex::new(None),
        }))
    }

    /// Observe state snapshots as they change.
    pub fn watch_state(&self) -> watch::Receiver<ClientSessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ClientSessionState {
        self.state.borrow().clone()
    }

    /// Snapshot of the transcript buffer, for the embedding UI to copy.
    pub fn transcript(&self) -> String {
        self.state.borrow().transcript.clone()
    }

    /// Empty the transcript buffer. Purely local.
    pub fn clear_transcript(&self) {
        self.state.send_modify(|s| s.clear_transcript());
    }

    /// Probe immediately, then keep probing on the configured interval for
    /// the life of the session.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.probe_interval);
        loop {
            ticker.tick().await;
            self.probe_cycle().await;
        }
    }

    /// One probe pass: on success make sure the channels are open, on
    /// failure tear them down and fall back to the offline-safe view.
    pub async fn probe_cycle(self: &Arc<Self>) {
        match self.probe().await {
            Ok(probe) => {
                debug!(
                    engine_initialized = probe.engine_initialized,
                    subscribers = probe.active_subscriber_count,
                    "Liveness probe ok"
                );
                self.ensure_channels().await;
            }
            Err(e) => {
                warn!("Liveness probe failed: {}", e);
                self.teardown_channels().await;
                self.state.send_modify(|s| s.mark_offline());
            }
        }
    }

    async fn probe(&self) -> Result<ProbeResponse, Error> {
        let url = format!("{}/", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::NetworkUnavailable(format!(
                "probe returned {}",
                response.status()
            )));
        }

        response
            .json::<ProbeResponse>()
            .await
            .map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Request an engine start, then refresh immediately instead of waiting
    /// for the next scheduled probe.
    pub async fn start_engine(self: &Arc<Self>) -> Result<ControlAck, Error> {
        self.control("start").await
    }

    /// Request an engine shutdown, then refresh immediately.
    pub async fn shutdown_engine(self: &Arc<Self>) -> Result<ControlAck, Error> {
        self.control("shutdown").await
    }

    async fn control(self: &Arc<Self>, action: &str) -> Result<ControlAck, Error> {
        let url = format!("{}/{}", self.base_url, action);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(e.to_string()))?;

        let ack = response
            .json::<ControlAck>()
            .await
            .map_err(|e| Error::MalformedMessage(e.to_string()))?;

        info!(action, message = %ack.message, "Control request acknowledged");
        self.probe_cycle().await;
        Ok(ack)
    }

    /// Open the channels unless a channel task is already live. A connect
    /// attempt in progress suppresses any concurrent second attempt.
    async fn ensure_channels(self: &Arc<Self>) {
        let mut slot = self.channel_task.lock().await;
        if let Some(task) = slot.as_ref() {
            if !task.is_finished() {
                return;
            }
        }

        self.state
            .send_modify(|s| s.phase = ConnectionPhase::Connecting);

        let controller = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            controller.run_channels().await;
        }));
    }

    async fn teardown_channels(&self) {
        let mut slot = self.channel_task.lock().await;
        if let Some(task) = slot.take() {
            task.abort();
        }
    }

    /// Open both channels and read them until either closes.
    async fn run_channels(self: Arc<Self>) {
        let ws_base = websocket_base(&self.base_url);

        let transcript = match connect_async(format!("{}/ws", ws_base)).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Transcript channel connect failed: {}", e);
                self.state
                    .send_modify(|s| s.phase = ConnectionPhase::Disconnected);
                return;
            }
        };
        let status = match connect_async(format!("{}/status-ws", ws_base)).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Status channel connect failed: {}", e);
                self.state
                    .send_modify(|s| s.phase = ConnectionPhase::Disconnected);
                return;
            }
        };

        info!("Transcript and status channels connected");
        self.state
            .send_modify(|s| s.phase = ConnectionPhase::Connected);

        let (_transcript_sink, mut transcript_stream) = transcript.split();
        let (_status_sink, mut status_stream) = status.split();

        loop {
            tokio::select! {
                frame = transcript_stream.next() => {
                    if !self.handle_frame("transcript", frame) {
                        break;
                    }
                }
                frame = status_stream.next() => {
                    if !self.handle_frame("status", frame) {
                        break;
                    }
                }
            }
        }

        self.state
            .send_modify(|s| s.phase = ConnectionPhase::Disconnected);
        info!("Channels closed; waiting for the next successful probe");
    }

    /// Returns false when the channel should be considered closed.
    fn handle_frame(
        &self,
        channel: &str,
        frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> bool {
        match frame {
            Some(Ok(Message::Text(payload))) => {
                self.dispatch_payload(channel, &payload);
                true
            }
            Some(Ok(Message::Close(_))) | None => false,
            Some(Ok(_)) => true,
            Some(Err(e)) => {
                warn!(channel, "Channel read error: {}", e);
                false
            }
        }
    }

    /// Parse and apply one channel payload. Malformed payloads are dropped;
    /// they never close the channel.
    fn dispatch_payload(&self, channel: &str, payload: &str) {
        match serde_json::from_str::<ChannelMessage>(payload) {
            Ok(message) => self.state.send_modify(|s| s.apply(message)),
            Err(e) => {
                let fault = Error::MalformedMessage(e.to_string());
                warn!(channel, "Dropping payload: {}", fault);
            }
        }
    }
}

/// Derive the WebSocket base URL from the HTTP base URL.
fn websocket_base(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", base_url)
    }
}
