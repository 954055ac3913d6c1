use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Recognition engine settings, loaded from the `[engine]` config table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model identifier handed to the engine backend
    pub model: String,

    /// Language code handed to the engine backend
    pub language: String,

    /// Which backend to construct ("scripted")
    pub backend: String,

    /// Settings for the scripted backend
    pub scripted: ScriptedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "base.en".to_string(),
            language: "en".to_string(),
            backend: "scripted".to_string(),
            scripted: ScriptedConfig::default(),
        }
    }
}

/// Settings for the scripted engine backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedConfig {
    /// Utterances emitted in order, one per interval
    pub script: Vec<String>,

    /// Delay before each emitted utterance
    pub interval_ms: u64,

    /// Simulated model warm-up before construction completes
    pub warmup_ms: u64,
}

impl Default for ScriptedConfig {
    fn default() -> Self {
        Self {
            script: vec![
                "This is a scripted transcription feed.".to_string(),
                "Each line arrives as its own fragment.".to_string(),
                "Point a real engine backend here when you have one.".to_string(),
            ],
            interval_ms: 1500,
            warmup_ms: 0,
        }
    }
}

/// Speech-recognition engine interface.
///
/// Implementations wrap an external recognizer. `next_fragment` is a
/// blocking call and is always driven from a blocking worker, never from an
/// async task directly.
pub trait RecognitionEngine: Send + Sync + std::fmt::Debug {
    /// Block until the next recognized utterance is available.
    ///
    /// Returns `Ok(None)` once the engine has been shut down. `shutdown`
    /// must wake a blocked `next_fragment` promptly so the poll loop can
    /// exit.
    fn next_fragment(&self) -> Result<Option<String>>;

    /// Whether the engine is currently capturing an utterance
    fn is_recording(&self) -> bool;

    /// Whether the engine is constructed and able to produce text
    fn is_running(&self) -> bool;

    /// Stop the engine and release its resources. Idempotent.
    fn shutdown(&self) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Engine backend factory
pub struct EngineFactory;

impl EngineFactory {
    /// Construct the configured engine backend.
    ///
    /// Construction may take seconds (model load); callers run it off the
    /// control plane.
    pub fn create(config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
        match config.backend.as_str() {
            "scripted" => Ok(Box::new(super::ScriptedEngine::new(config))),
            other => anyhow::bail!("Unsupported engine backend: {}", other),
        }
    }
}
