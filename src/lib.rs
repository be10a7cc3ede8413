//! # Switchyard
//!
//! **Switchyard** is an asynchronous multi-backend dispatch core: it lets a
//! single-threaded host event loop issue operations against heterogeneous
//! backends (an in-memory cache, a relational database, a job queue, and a
//! generic HTTP transport) without blocking that loop, and without any
//! backend's native client dictating the host's threading model.
//!
//! ## Overview
//!
//! Callers build a [`Request`](protocol::Request) tagged with a
//! [`Target`](protocol::Target) and hand it to the [`Hub`](hub::Hub). The
//! hub either drives it through a registered handler (non-blocking backends,
//! multiplexed on the hub's own thread) or parks it in its ledger while a
//! job runs on an offloader producer thread (blocking backends). Either way
//! the request comes back from [`Hub::step`](hub::Hub::step) carrying exactly
//! one terminal [`Outcome`](protocol::Outcome): a reply, a structured value,
//! or an error.
//!
//! ## Architecture
//!
//! The library is organized into a few key modules:
//!
//! - **[`protocol`]** - The tagged object model: requests, replies, values
//!   with content-type tagging and single-owner result buffers, and the
//!   backend error taxonomy
//! - **[`hub`]** - The per-thread scheduler: handler registry, ready-set
//!   multiplexing with cross-thread wake-up, timeout reaping, cooperative
//!   cancellation
//! - **[`offload`]** - Bounded per-connection job queues drained by
//!   dedicated producer threads, with backpressure and ordered execution
//! - **[`backends`]** - Per-backend client contracts and the translation of
//!   native replies into the common model
//! - **[`ids`]** - ULID-backed correlation identifiers
//! - **[`runtime_config`]** - Environment-driven tuning
//! - **[`logging`]** - Opt-in `tracing` subscriber setup
//!
//! ## Request flow
//!
//! 1. Caller builds a request (target, timeout, delivery mode, optional
//!    opaque logging context)
//! 2. [`Hub::submit`](hub::Hub::submit) routes it to a handler, or
//!    [`Hub::offload`](hub::Hub::offload) enqueues its payload for a
//!    producer thread
//! 3. The hub's step loop advances backend protocol state as sockets become
//!    ready and drains producer completions as they are published
//! 4. On completion, timeout, or connection failure the request turns
//!    terminal and is returned to the caller on the hub thread
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use switchyard::backends::{DbCommand, DbExecutor};
//! use switchyard::hub::Hub;
//! use switchyard::offload::{OffloadConfig, OffloadQueue, Payload};
//! use switchyard::protocol::{Request, Target};
//! use switchyard::runtime_config::RuntimeConfig;
//!
//! # fn connect_database() -> switchyard::backends::DbExecutor<Client> { unimplemented!() }
//! # struct Client;
//! # impl switchyard::backends::DatabaseClient for Client {
//! #     fn execute(&mut self, _: &DbCommand) -> Result<switchyard::protocol::DbResult, switchyard::protocol::BackendError> { unimplemented!() }
//! # }
//! # fn main() -> std::io::Result<()> {
//! let mut hub = Hub::new(RuntimeConfig::from_env())?;
//! let mut queue = OffloadQueue::new(OffloadConfig::from_env());
//! queue.add_connection("db-main", Box::new(connect_database()), hub.waker())?;
//!
//! let request = Request::new(Target::Database).with_timeout(Duration::from_secs(5));
//! let payload = Payload::Db(DbCommand::new("SELECT name FROM users WHERE id = $1"));
//! let invoke_id = match hub.offload(&queue, "db-main", request, payload) {
//!     Ok(id) => id,
//!     Err(rejected) => return Ok(()), // queue full: retry or shed
//! };
//!
//! if let Some(done) = hub.wait_for(invoke_id, Duration::from_secs(6))? {
//!     println!("terminal state: {}", done.state());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod hub;
pub mod ids;
pub mod logging;
pub mod offload;
pub mod protocol;
pub mod runtime_config;

pub use hub::{Hub, HubError, HubWaker, HandlerId, Stepper};
pub use ids::{InvokeId, Tag};
pub use offload::{Job, JobExecutor, OffloadConfig, OffloadQueue, Payload, QueueError};
pub use protocol::{
    BackendError, ErrorKind, Outcome, Reply, Request, RequestState, Target, Value,
};
pub use runtime_config::RuntimeConfig;
