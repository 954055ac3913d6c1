pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{ClientSessionState, ConnectionPhase, ControllerConfig, SessionController};
pub use config::Config;
pub use engine::{EngineConfig, EngineFactory, RecognitionEngine, ScriptedConfig, ScriptedEngine};
pub use error::Error;
pub use protocol::{ChannelMessage, ControlAck, EngineStatus, ProbeResponse};
pub use server::{
    create_router, AppState, ChannelKind, ServerConfig, ServerHandle, SessionManager,
    SubscriberRegistry,
};
