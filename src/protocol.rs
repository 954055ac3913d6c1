//! Wire schema shared by the server and the client.
//!
//! Every payload that crosses the HTTP or WebSocket boundary lives here so
//! both sides serialize and parse the exact same shapes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Engine state snapshot delivered over the status channel.
///
/// Snapshots are replaced wholesale on the client; fields never merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Engine is currently capturing an utterance
    pub is_recording: bool,

    /// Engine is constructed and able to produce text
    pub is_running: bool,

    /// Engine is stopped (or was never started)
    pub is_shut_down: bool,

    /// Engine construction is in progress
    pub is_initializing: bool,
}

impl EngineStatus {
    /// Stopped engine, all activity flags cleared.
    ///
    /// Also the safe default a client falls back to whenever the server is
    /// unreachable.
    pub fn offline() -> Self {
        Self {
            is_recording: false,
            is_running: false,
            is_shut_down: true,
            is_initializing: false,
        }
    }

    /// Engine construction in progress.
    pub fn initializing() -> Self {
        Self {
            is_recording: false,
            is_running: false,
            is_shut_down: false,
            is_initializing: true,
        }
    }
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self::offline()
    }
}

/// One message on either server→client channel.
///
/// The transcript channel carries `Transcription` and `Error`; the status
/// channel carries `Status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// Incremental recognized-text fragment
    Transcription { text: String, timestamp: f64 },

    /// Engine state snapshot
    Status {
        status: EngineStatus,
        timestamp: f64,
    },

    /// Non-fatal engine failure surfaced to subscribers
    Error { error: String },
}

/// Body of `GET /` (liveness probe).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResponse {
    /// Always "ok" while the process is up
    pub status: String,

    /// Open transcript + status subscriptions
    pub active_subscriber_count: usize,

    /// Whether the engine is constructed and running
    pub engine_initialized: bool,

    /// Most recent engine construction failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Body of `GET /start` and `GET /shutdown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAck {
    pub ok: bool,
    pub message: String,
}

impl ControlAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Current Unix time as float seconds, the timestamp unit used on the wire.
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
