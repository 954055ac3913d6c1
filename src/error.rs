use thiserror::Error;

/// Failure taxonomy for the streaming pipeline.
///
/// None of these are process-fatal; each one degrades to a recoverable state
/// signal (offline status, shut-down engine, dropped message).
#[derive(Debug, Error)]
pub enum Error {
    /// Probe or channel cannot reach the server, or it answered with a
    /// non-success status. The client falls back to the disconnected-safe
    /// state and retries on the next poll.
    #[error("server unreachable: {0}")]
    NetworkUnavailable(String),

    /// Engine construction failed. The server reverts to the shut-down
    /// state and surfaces the reason through the liveness probe.
    #[error("engine initialization failed: {0}")]
    EngineInitFailure(String),

    /// Unparseable channel payload. Dropped and logged; the channel stays
    /// open.
    #[error("malformed channel message: {0}")]
    MalformedMessage(String),

    /// One fan-out target failed. Isolated to that subscriber.
    #[error("subscriber fault: {0}")]
    SubscriberFault(String),
}
