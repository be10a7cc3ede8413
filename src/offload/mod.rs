//! # Offload Module
//!
//! The producer/queue subsystem that decouples blocking backend calls from
//! the hub thread.
//!
//! Some native clients (a database driver, a curl-style transport, a job
//! queue client) only offer blocking calls. Running them on the hub thread
//! would stall every other backend, so each such logical connection gets a
//! bounded mailbox ([`OffloadQueue`]) drained by one dedicated producer
//! thread that owns the connection and its [`JobExecutor`].
//!
//! ## Guarantees
//!
//! - Jobs for one connection key execute strictly in enqueue order; keys
//!   never share a producer, so they never reorder each other.
//! - A queue at capacity rejects new jobs synchronously
//!   ([`QueueError::Full`]) instead of growing or blocking; the caller
//!   applies backpressure.
//! - Shutdown finishes the executing job, fails every queued-but-not-started
//!   job with a shutdown error, and joins the producer threads. Nothing is
//!   silently dropped.
//!
//! Results travel back through the hub's completion channel plus a
//! multiplexer wake-up, so the originating caller sees them on the hub
//! thread.

mod core;

pub use core::{
    Job, JobExecutor, OffloadConfig, OffloadQueue, Payload, QueueError, QueueMetrics,
};
