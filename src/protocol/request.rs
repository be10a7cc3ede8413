use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use super::context::LogContext;
use super::error::ErrorKind;
use super::object::{ObjectKind, Outcome, Target};
use crate::ids::{InvokeId, Tag};

/// Lifecycle state of a request.
///
/// `Created → Submitted → InFlight → Completed | Failed | TimedOut`.
/// Exactly one terminal state is reached, and the result is attached at that
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Submitted,
    InFlight,
    Completed,
    Failed,
    TimedOut,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Completed | RequestState::Failed | RequestState::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Created => "created",
            RequestState::Submitted => "submitted",
            RequestState::InFlight => "in-flight",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
            RequestState::TimedOut => "timed-out",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the caller consumes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Caller waits for the terminal request to come back from the scheduler
    #[default]
    Wait,
    /// Fire-and-forget: the scheduler drops the terminal request after
    /// logging any failure
    Post,
}

/// Flow-control hint supplied by the caller.
///
/// The scheduler forwards it to backend adapters; it does not change
/// scheduling itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    Blocking,
    #[default]
    NonBlocking,
}

/// A unit of work against one backend.
///
/// Built by the caller, submitted to the hub, mutated only by the scheduler
/// that owns it while in flight, then handed back read-only once terminal.
/// Owns at most one [`Outcome`], attached exactly once.
#[derive(Debug)]
pub struct Request {
    target: Target,
    ctx: Option<LogContext>,
    mode: DeliveryMode,
    control: FlowControl,
    invoke_id: Option<InvokeId>,
    tag: Option<Tag>,
    start_time: Option<Instant>,
    timeout: Duration,
    state: RequestState,
    result: Option<Outcome>,
    cancelled: bool,
}

impl Request {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ctx: None,
            mode: DeliveryMode::default(),
            control: FlowControl::default(),
            invoke_id: None,
            tag: None,
            start_time: None,
            timeout: Duration::ZERO,
            state: RequestState::Created,
            result: None,
            cancelled: false,
        }
    }

    /// Maximum time the scheduler lets the request stay in flight.
    /// `Duration::ZERO` (the default) disables the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_control(mut self, control: FlowControl) -> Self {
        self.control = control;
        self
    }

    /// Attach an opaque caller-supplied logging context. The core never
    /// inspects it, only forwards it to backend adapters.
    pub fn with_context(mut self, ctx: LogContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn kind(&self) -> ObjectKind {
        ObjectKind::Request
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn control(&self) -> FlowControl {
        self.control
    }

    pub fn context(&self) -> Option<&LogContext> {
        self.ctx.as_ref()
    }

    pub fn invoke_id(&self) -> Option<InvokeId> {
        self.invoke_id
    }

    pub fn tag(&self) -> Option<Tag> {
        self.tag
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Result attached at the terminal transition, if any yet.
    pub fn result(&self) -> Option<&Outcome> {
        self.result.as_ref()
    }

    /// Consume the request and yield its result.
    pub fn into_result(self) -> Option<Outcome> {
        self.result
    }

    /// The instant the timeout elapses, when submitted with a nonzero
    /// timeout.
    pub fn deadline(&self) -> Option<Instant> {
        if self.timeout.is_zero() {
            return None;
        }
        self.start_time.map(|start| start + self.timeout)
    }

    /// Time since submission.
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }

    /// Cooperative cancellation: the in-progress backend call is not
    /// interrupted, but the scheduler discards the result instead of
    /// delivering it.
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Scheduler bookkeeping at submission: assigns correlation identifiers,
    /// records the start time, and moves the request in flight.
    ///
    /// Fails if the request was already submitted or finished.
    pub(crate) fn activate(
        &mut self,
        invoke_id: InvokeId,
        tag: Tag,
        now: Instant,
    ) -> Result<(), RequestState> {
        if self.state != RequestState::Created {
            return Err(self.state);
        }
        self.invoke_id = Some(invoke_id);
        self.tag = Some(tag);
        self.start_time = Some(now);
        self.state = RequestState::Submitted;
        self.state = RequestState::InFlight;
        debug!(
            invoke_id = %invoke_id,
            tag = %tag,
            target = %self.target,
            timeout_ms = self.timeout.as_millis() as u64,
            "Request in flight"
        );
        Ok(())
    }

    /// Attach the terminal result and derive the terminal state.
    ///
    /// Replies and values complete the request; errors fail it, except
    /// timeout errors which mark it timed out. A second completion is
    /// rejected and the outcome is handed back so the scheduler can log and
    /// drop it.
    pub(crate) fn complete(&mut self, outcome: Outcome) -> Result<(), Outcome> {
        if self.state.is_terminal() {
            return Err(outcome);
        }
        let next = match &outcome {
            Outcome::Reply(_) | Outcome::Value(_) => RequestState::Completed,
            Outcome::Error(err) if err.kind() == ErrorKind::Timeout => RequestState::TimedOut,
            Outcome::Error(_) => RequestState::Failed,
        };
        debug!(
            invoke_id = ?self.invoke_id,
            target = %self.target,
            state = %next,
            outcome = %outcome.kind(),
            "Request reached terminal state"
        );
        self.result = Some(outcome);
        self.state = next;
        Ok(())
    }
}
