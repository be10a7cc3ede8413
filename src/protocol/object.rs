use std::fmt;

use serde::Serialize;
use serde_json::json;

use super::error::BackendError;
use super::value::Value;

/// Which backend protocol an object pertains to.
///
/// The variant set is closed: adding a backend means extending this enum and
/// every `match` over it, not subclassing an open hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Target {
    /// In-memory cache protocol (non-blocking, hub-driven)
    Cache,
    /// Relational database protocol (blocking client, offloaded)
    Database,
    /// Job queue protocol (blocking client, offloaded)
    JobQueue,
    /// Generic HTTP transport (blocking client, offloaded)
    Transport,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Cache => "cache",
            Target::Database => "database",
            Target::JobQueue => "jobqueue",
            Target::Transport => "transport",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class of an object flowing through the dispatch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    Request,
    Reply,
    Error,
    Value,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Request => "request",
            ObjectKind::Reply => "reply",
            ObjectKind::Error => "error",
            ObjectKind::Value => "value",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic completion reply from a backend that does not return structured
/// data: a transport exchange or a job queue acknowledgement.
///
/// `code` carries the backend's positive status (an HTTP status, a job id);
/// `body` the raw response bytes, if any. Structured results travel as
/// [`Value`] instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub target: Target,
    pub code: Option<u64>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            code: None,
            body: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: u64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }
}

/// The terminal result object attached to a request: a reply, an error, or a
/// structured value.
///
/// Consumers match on this exhaustively; there is no open dispatch over
/// result types.
#[derive(Debug)]
pub enum Outcome {
    Reply(Reply),
    Error(BackendError),
    Value(Value),
}

impl Outcome {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Outcome::Reply(_) => ObjectKind::Reply,
            Outcome::Error(_) => ObjectKind::Error,
            Outcome::Value(_) => ObjectKind::Value,
        }
    }

    /// The backend the outcome came from. `None` only for the empty value.
    pub fn target(&self) -> Option<Target> {
        match self {
            Outcome::Reply(reply) => Some(reply.target),
            Outcome::Error(err) => Some(err.target()),
            Outcome::Value(value) => value.target(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// Debug representation for logs and diagnostics.
    pub fn describe(&self) -> serde_json::Value {
        match self {
            Outcome::Reply(reply) => json!({
                "kind": "reply",
                "target": reply.target.as_str(),
                "code": reply.code,
                "body_len": reply.body.len(),
            }),
            Outcome::Error(err) => json!({
                "kind": "error",
                "target": err.target().as_str(),
                "error_kind": err.kind().as_str(),
                "message": err.message(),
            }),
            Outcome::Value(value) => json!({
                "kind": "value",
                "target": value.target().map(|t| t.as_str()),
                "content_type": value.content_type(),
            }),
        }
    }
}
