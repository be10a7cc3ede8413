//! # Hub Module
//!
//! The per-thread scheduler that drives non-blocking backend I/O and
//! delivers every request's completion on the thread the caller expects.
//!
//! ## Architecture
//!
//! A [`Hub`] binds to the thread that creates it. It owns:
//!
//! - a ready-set multiplexer (with a cross-thread wake-up handle) for the
//!   sockets of registered handlers,
//! - one handler entry per backend connection, wrapping the connection's
//!   [`Stepper`] and its in-flight bookkeeping,
//! - the pending-request ledger and the completion channel producers use to
//!   send offloaded results home.
//!
//! The host event loop calls [`Hub::step`] repeatedly. One step waits for
//! readiness up to the nearest request deadline, advances ready steppers,
//! drains offload completions, reaps timeouts, and returns the requests
//! that reached a terminal state.
//!
//! ## Thread confinement
//!
//! The hub is `!Send`/`!Sync`: its scheduling methods cannot be called from
//! another thread in safe code, and a runtime thread-id guard rejects
//! foreign entry for hosts holding it behind unsafe plumbing. The only
//! cross-thread surface is the [`HubWaker`].
//!
//! ## Ordering
//!
//! Completions for one handler are delivered in the order the backend
//! reports them; no ordering is guaranteed across handlers.

mod core;
mod multiplexer;
mod stepper;

pub use core::{
    Completion, HandlerId, Hub, HubError, HubMetrics, HubWaker, OffloadError, OffloadRejected,
};
pub use multiplexer::{Interest, Notifier, Readiness};
pub use stepper::{StepCompletions, Stepper};
