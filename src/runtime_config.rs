//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the hub's scheduling
//! behavior.
//!
//! ## Environment Variables
//!
//! ### `SWYD_STEP_MAX_EVENTS`
//!
//! Upper bound on readiness events processed per `step()` pass.
//! Default: `64`.
//!
//! ### `SWYD_IDLE_WAIT_MS`
//!
//! How long a `step()` call may sleep in the multiplexer when no request
//! deadline is pending. Bounds the latency of externally injected wake-ups
//! observed by a quiet hub. Default: `100`.
//!
//! ### `SWYD_DEFAULT_TIMEOUT_MS`
//!
//! Timeout applied to requests submitted without one. `0` (the default)
//! leaves such requests without a timeout.
//!
//! Timeout expiry is checked on every multiplexer wake-up rather than with
//! per-request timers, so worst-case timeout latency is bounded by the wait
//! granularity configured here.

use std::env;
use std::time::Duration;

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Runtime configuration loaded from environment variables.
///
/// Load at startup with [`RuntimeConfig::from_env()`], or build one by hand
/// for tests and embedded hosts.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Maximum readiness events handled per step pass (default: 64)
    pub max_events: usize,
    /// Multiplexer wait bound when no deadline is pending (default: 100 ms)
    pub idle_wait: Duration,
    /// Timeout for requests that did not set one; zero disables (default: 0)
    pub default_timeout: Duration,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        RuntimeConfig {
            max_events: env_usize("SWYD_STEP_MAX_EVENTS", 64),
            idle_wait: Duration::from_millis(env_u64("SWYD_IDLE_WAIT_MS", 100)),
            default_timeout: Duration::from_millis(env_u64("SWYD_DEFAULT_TIMEOUT_MS", 0)),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_events: 64,
            idle_wait: Duration::from_millis(100),
            default_timeout: Duration::ZERO,
        }
    }
}
