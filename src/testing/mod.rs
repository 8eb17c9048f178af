//! Testing utilities and mock implementations
//!
//! This module provides a mock broker adapter for testing the bridge without
//! an MQTT broker.

pub mod mocks;

pub use mocks::*;
