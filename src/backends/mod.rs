//! # Backends Module
//!
//! Adapters binding each backend's native client into the dispatch core.
//!
//! Every backend contributes two things: a trait describing its native
//! client at the interface boundary (the core never implements a wire
//! protocol itself), and the translation from the client's replies and
//! failures into the common [`Value`](crate::protocol::Value) /
//! [`Reply`](crate::protocol::Reply) /
//! [`BackendError`](crate::protocol::BackendError) model.
//!
//! Where an adapter runs follows from its client's blocking behavior:
//!
//! - [`cache`]: non-blocking client; its [`CacheStepper`](cache::CacheStepper)
//!   is driven by the hub on the designated thread.
//! - [`database`], [`jobqueue`], [`transport`]: blocking clients; their
//!   executors run on offloader producer threads.
//!
//! An adapter never blocks inside a stepper callback on the hub thread.

pub mod cache;
pub mod database;
pub mod jobqueue;
pub mod transport;

pub use cache::{CacheClient, CacheStepper};
pub use database::{BufferedRows, DatabaseClient, DbCommand, DbExecutor};
pub use jobqueue::{
    JobQueueClient, JobQueueExecutor, QueueCommand, ReservedJob, DEFAULT_QUEUE,
};
pub use transport::{TransportCall, TransportClient, TransportExchange, TransportExecutor};
