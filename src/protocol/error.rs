use std::fmt;

use serde::Serialize;

use super::object::Target;

/// Classification of a backend failure.
///
/// Every [`BackendError`] carries exactly one kind. Connection, protocol and
/// backend errors are attached to the originating request and returned to the
/// caller; they are never propagated as panics across the scheduler boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Backend unreachable or handshake failure
    Connection,
    /// Backend returned malformed or unexpected data
    Protocol,
    /// Backend executed the operation but reported a native failure
    Backend,
    /// No completion within the request's timeout
    Timeout,
    /// Offload queue at capacity (backpressure signal)
    Capacity,
    /// Queue or handler shut down before the request could run
    Shutdown,
    /// Scheduler entered from a thread it is not bound to
    ThreadAffinity,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Backend => "backend",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Shutdown => "shutdown",
            ErrorKind::ThreadAffinity => "thread-affinity",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-native status detail attached to an error when the backend
/// reported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NativeStatus {
    /// HTTP status code from the transport backend
    Http(u16),
    /// Database status string (e.g. an SQLSTATE code)
    Database(String),
    /// Cache protocol error prefix (e.g. `WRONGTYPE`)
    Cache(String),
    /// Job queue protocol status line (e.g. `NOT_FOUND`)
    JobQueue(String),
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeStatus::Http(code) => write!(f, "http {}", code),
            NativeStatus::Database(s) => write!(f, "db {}", s),
            NativeStatus::Cache(s) => write!(f, "cache {}", s),
            NativeStatus::JobQueue(s) => write!(f, "queue {}", s),
        }
    }
}

/// A tagged backend failure.
///
/// Immutable after construction. Travels inside a request's
/// [`Outcome`](super::Outcome) to the caller; the scheduler never delivers a
/// bare panic or untyped error for a backend failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendError {
    target: Target,
    kind: ErrorKind,
    message: String,
    status: Option<NativeStatus>,
}

impl BackendError {
    pub fn new(target: Target, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            target,
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Backend unreachable or handshake failure.
    pub fn connection(target: Target, message: impl Into<String>) -> Self {
        Self::new(target, ErrorKind::Connection, message)
    }

    /// Backend returned malformed or unexpected data.
    pub fn protocol(target: Target, message: impl Into<String>) -> Self {
        Self::new(target, ErrorKind::Protocol, message)
    }

    /// Backend executed but reported a native failure.
    pub fn backend(target: Target, message: impl Into<String>) -> Self {
        Self::new(target, ErrorKind::Backend, message)
    }

    /// Synthesized by the scheduler when a request's timeout elapses.
    pub fn timeout(target: Target, message: impl Into<String>) -> Self {
        Self::new(target, ErrorKind::Timeout, message)
    }

    /// Synthesized when a queue or handler shuts down with work still queued.
    pub fn shutdown(target: Target, message: impl Into<String>) -> Self {
        Self::new(target, ErrorKind::Shutdown, message)
    }

    /// Attach the backend's native status detail.
    pub fn with_status(mut self, status: NativeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<&NativeStatus> {
        self.status.as_ref()
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} error: {}", self.target, self.kind, self.message)?;
        if let Some(status) = &self.status {
            write!(f, " ({})", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendError {}
