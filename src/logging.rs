//! Opt-in `tracing` subscriber initialisation.
//!
//! The dispatch core only emits `tracing` events; hosts that already install
//! their own subscriber need nothing from this module. Standalone binaries
//! and tests can call [`init`] to get formatted output filtered by
//! `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Falls back to the given default directive when `RUST_LOG` is unset.
/// Safe to call more than once; only the first call installs.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
