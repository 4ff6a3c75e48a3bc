//! Engine error taxonomy
//!
//! Four classes with distinct blast radii: configuration and connectivity
//! errors are fatal to `start`; execution and data errors degrade a single
//! symbol's tick and are reported through the event bus.

use thiserror::Error;

/// Errors surfaced by the decision engine and its collaborators
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Missing or invalid bot settings; supervisor stays stopped
    #[error("configuration error: {0}")]
    Config(String),

    /// Gateway unreachable or disconnected
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Order rejected or close failed; never retried by the engine
    #[error("execution error: {0}")]
    Execution(String),

    /// Insufficient history or malformed gateway response
    #[error("data error: {0}")]
    Data(String),
}

impl EngineError {
    /// True when the error may abort `start` (everything else is per-symbol)
    pub fn is_fatal_at_start(&self) -> bool {
        matches!(self, EngineError::Config(_) | EngineError::Connectivity(_))
    }
}
