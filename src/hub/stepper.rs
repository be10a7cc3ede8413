use std::os::fd::RawFd;

use smallvec::SmallVec;

use super::multiplexer::{Interest, Readiness};
use crate::ids::Tag;
use crate::protocol::{BackendError, Outcome, Target};

/// Completion batch filled by a stepper during one readiness callback.
///
/// Stack-allocated for the common case of a few completions per wake-up.
pub type StepCompletions = SmallVec<[(Tag, Outcome); 4]>;

/// Advances one non-blocking backend connection's protocol state when the
/// hub reports readiness on its file descriptor.
///
/// # Contract
///
/// - Methods are only ever invoked on the hub's bound thread.
/// - `step` must never block: it reads/writes the connection until the OS
///   reports `WouldBlock`, pushing a `(tag, outcome)` pair for every command
///   the backend completed, in the order the backend reported them.
/// - A connection-level failure is returned as `Err`; the hub then fails
///   every in-flight request on this handler and retires it.
/// - Backends whose native client can only block do not implement this;
///   they route through the offloader instead.
pub trait Stepper {
    /// Backend protocol this connection speaks.
    fn target(&self) -> Target;

    /// File descriptor the hub multiplexes on.
    fn raw_fd(&self) -> RawFd;

    /// Current readiness interest (write interest while output is buffered).
    fn interest(&self) -> Interest;

    /// Accept a new in-flight command. The payload is already encoded by the
    /// caller; the tag comes back with the matching completion.
    fn start(&mut self, tag: Tag, payload: &[u8]) -> Result<(), BackendError>;

    /// Advance the protocol on readiness, pushing completed commands.
    fn step(
        &mut self,
        readiness: Readiness,
        completions: &mut StepCompletions,
    ) -> Result<(), BackendError>;
}
