use serde::Serialize;
use tracing::warn;

use crate::protocol::{ChannelMessage, EngineStatus};

/// Where the controller is in the connect cycle.
///
/// `Disconnected → (probe ok) → Connecting → (channels open) → Connected`,
/// back to `Disconnected` on any channel close or probe failure. No terminal
/// state; the cycle repeats for the life of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
}

/// Client-local view of the server, rebuilt incrementally from channel
/// messages and forced to safe defaults when the server is unreachable.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSessionState {
    /// Accumulated transcript, fragments joined by single spaces
    pub transcript: String,

    /// Last received engine status snapshot
    pub status: EngineStatus,

    pub phase: ConnectionPhase,
}

impl Default for ClientSessionState {
    fn default() -> Self {
        Self {
            transcript: String::new(),
            status: EngineStatus::offline(),
            phase: ConnectionPhase::Disconnected,
        }
    }
}

impl ClientSessionState {
    /// Apply one channel message.
    ///
    /// Fragments append in arrival order; status snapshots replace the old
    /// one wholesale, never field by field.
    pub fn apply(&mut self, message: ChannelMessage) {
        match message {
            ChannelMessage::Transcription { text, .. } => self.append_fragment(&text),
            ChannelMessage::Status { status, .. } => self.status = status,
            ChannelMessage::Error { error } => {
                warn!("Server reported channel error: {}", error);
            }
        }
    }

    pub fn append_fragment(&mut self, text: &str) {
        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(text);
    }

    /// Force the disconnected-safe view after a failed probe. The server
    /// status is never trusted across an outage; the transcript buffer is
    /// kept (only a user action clears it).
    pub fn mark_offline(&mut self) {
        self.phase = ConnectionPhase::Disconnected;
        self.status = EngineStatus::offline();
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }
}
