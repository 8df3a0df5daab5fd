//! Integration tests for StreamHub
//!
//! Tests are organized by component:
//! - debrid_test: Real-Debrid API client tests
//! - search_test: Torrent search client tests
//! - resolver_test: Magnet / library link → stream resolution
//! - playback_test: Playback session state machine
//! - cli_test: Argument parsing and JSON output

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
