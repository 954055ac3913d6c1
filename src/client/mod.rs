//! Client session controller
//!
//! Maintains an always-eventually-connected view of server state: a liveness
//! probe loop drives channel (re)connection, the two WebSocket channels feed
//! a local state snapshot, and user actions map to control requests.

mod controller;
mod state;

pub use controller::{ControllerConfig, SessionController};
pub use state::{ClientSessionState, ConnectionPhase};
