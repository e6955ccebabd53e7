//! Test harness utilities for load-run testing.
//!
//! This module provides an instrumented in-memory stream environment and a
//! console that captures everything written to it.

#![allow(dead_code)]

mod capture;
mod environment;

pub use capture::{CapturedOutput, capture_console};
pub use environment::{Call, MockEnvironment, MockOptions};

use std::time::Duration;

use stream_client_app::{Config, Timings};

/// Config with no pauses and a short confirmation drain.
pub fn fast_config(producers: usize, messages: u64, consumers: usize) -> Config {
    Config::new()
        .with_stream("test-stream")
        .with_producers(producers, messages)
        .with_consumers(consumers)
        .with_timings(Timings {
            drain_timeout: Duration::from_secs(1),
            ..Timings::immediate()
        })
}
