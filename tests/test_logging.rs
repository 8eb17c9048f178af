//! Tests for logging configuration and format parsing
//!
//! Tests the pure functions in the logging module that handle
//! log format parsing and configuration from environment variables.

use gateway_bridge::observability::logging::{level_from_verbosity, parse_level, LogFormat};
use gateway_bridge::bridge_span;
use gateway_bridge::observability::init_logging;
use tracing::Level;

#[test]
fn test_log_format_parse_json() {
    assert!(matches!(LogFormat::parse("json"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("JSON"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("Json"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_pretty_and_compact() {
    assert!(matches!(LogFormat::parse("pretty"), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("COMPACT"), LogFormat::Compact));
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    assert!(matches!(LogFormat::parse("invalid"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("  json  "), LogFormat::Json));
    assert!(matches!(LogFormat::parse("xml"), LogFormat::Json));
}

#[test]
fn test_log_level_parsing() {
    assert_eq!(parse_level("error"), Level::ERROR);
    assert_eq!(parse_level("WARN"), Level::WARN);
    assert_eq!(parse_level("debug"), Level::DEBUG);
    assert_eq!(parse_level("verbose"), Level::INFO);
}

#[test]
fn test_verbosity_overrides_level() {
    assert_eq!(level_from_verbosity(0), None);
    assert_eq!(level_from_verbosity(1), Some(Level::DEBUG));
    assert_eq!(level_from_verbosity(2), Some(Level::TRACE));
}

#[test]
fn test_bridge_span_usable_after_init() {
    init_logging(Level::DEBUG, LogFormat::Compact, true);

    let span = bridge_span!(prefix = "home");
    let _guard = span.enter();
    tracing::info!("inside bridge span");
}
