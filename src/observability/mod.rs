//! Observability for the gateway bridge
//!
//! Structured logging through `tracing`, configured from the environment.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, init_logging_with_override, LogFormat};

// Span macros for structured logging
pub use logging::{bridge_span, mqtt_span};
