//! # Protocol Module
//!
//! The tagged object model everything in the dispatch core flows through.
//!
//! Every object carries a class ([`ObjectKind`]) and a backend tag
//! ([`Target`]), both fixed at construction. The variant sets are closed:
//! consumers match on them exhaustively, and a new backend is added by
//! extending the enums and every match, never by subclassing.
//!
//! - [`Request`] is the unit of work. It owns at most one [`Outcome`]
//!   (a [`Reply`], [`BackendError`], or [`Value`]), attached exactly once
//!   when the request reaches a terminal state.
//! - [`Value`] wraps structured backend results with content-type tagging;
//!   a database row set stays behind a single-owner [`RowSet`] handle whose
//!   buffer is released exactly once.
//! - [`BackendError`] layers backend-native status detail over the common
//!   error taxonomy.
//! - [`LogContext`] is the opaque caller handle threaded through for
//!   diagnostic correlation.

mod context;
mod error;
mod object;
mod request;
mod value;

pub use context::{AttachedContext, LogContext};
pub use error::{BackendError, ErrorKind, NativeStatus};
pub use object::{ObjectKind, Outcome, Reply, Target};
pub use request::{DeliveryMode, FlowControl, Request, RequestState};
pub use value::{CacheReply, CacheReplyKind, DbResult, DbResultKind, RowSet, Value};
