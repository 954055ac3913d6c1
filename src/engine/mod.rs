//! Speech-recognition engine seam
//!
//! The recognizer itself is an external component; this module defines the
//! trait boundary the server talks through, plus the scripted backend used
//! by the demo binary and the test suite.

mod backend;
mod scripted;

pub use backend::{EngineConfig, EngineFactory, RecognitionEngine, ScriptedConfig};
pub use scripted::ScriptedEngine;
