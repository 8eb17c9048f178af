//! Error types for the gateway bridge
//!
//! Component errors (`ConfigError`, `MqttError`, `TopicError`) stay close to
//! where they are raised; `BridgeError` is what the service surface returns.
//! Malformed topics never surface here: the loop drops them.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Bridge task failed: {message}")]
    TaskFailed { message: String },

    #[error("Bridge did not stop within {timeout_secs}s")]
    ShutdownTimeout { timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Wrap any adapter error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }

    /// Create task failure error
    pub fn task_failed<S: Into<String>>(message: S) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
