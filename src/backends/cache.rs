use std::collections::VecDeque;
use std::os::fd::RawFd;

use tracing::debug;

use crate::hub::{Interest, Readiness, StepCompletions, Stepper};
use crate::ids::Tag;
use crate::protocol::{BackendError, CacheReply, NativeStatus, Outcome, Target, Value};

/// Native cache client contract.
///
/// The client owns the connection and the wire protocol: it encodes nothing
/// (commands arrive pre-encoded from the caller) and decodes replies into
/// [`CacheReply`]. All methods are non-blocking; `poll_reply` returns
/// `Ok(None)` when no complete reply is buffered yet.
pub trait CacheClient {
    fn raw_fd(&self) -> RawFd;

    /// Current interest: write interest while output is still buffered.
    fn interest(&self) -> Interest;

    /// Buffer an encoded command for transmission.
    fn send_command(&mut self, command: &[u8]) -> Result<(), BackendError>;

    /// Flush buffered output as far as the socket allows.
    fn flush(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Decode the next complete reply, if one has arrived.
    fn poll_reply(&mut self) -> Result<Option<CacheReply>, BackendError>;
}

/// Adapts a [`CacheClient`] into a hub [`Stepper`].
///
/// The cache protocol pipelines: replies come back in command order, so the
/// adapter pairs each decoded reply with the oldest in-flight tag. An error
/// reply fails only its own request; connection-level client errors
/// propagate and fail the whole handler.
pub struct CacheStepper<C: CacheClient> {
    client: C,
    in_flight: VecDeque<Tag>,
}

impl<C: CacheClient> CacheStepper<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            in_flight: VecDeque::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

/// An error reply fails its request; everything else completes it as a
/// cache value.
fn translate(reply: CacheReply) -> Outcome {
    match reply {
        CacheReply::Error(message) => {
            let status = message
                .split_whitespace()
                .next()
                .unwrap_or("ERR")
                .to_string();
            Outcome::Error(
                BackendError::backend(Target::Cache, message)
                    .with_status(NativeStatus::Cache(status)),
            )
        }
        other => Outcome::Value(Value::Cache(other)),
    }
}

impl<C: CacheClient> Stepper for CacheStepper<C> {
    fn target(&self) -> Target {
        Target::Cache
    }

    fn raw_fd(&self) -> RawFd {
        self.client.raw_fd()
    }

    fn interest(&self) -> Interest {
        self.client.interest()
    }

    fn start(&mut self, tag: Tag, payload: &[u8]) -> Result<(), BackendError> {
        self.client.send_command(payload)?;
        self.in_flight.push_back(tag);
        Ok(())
    }

    fn step(
        &mut self,
        readiness: Readiness,
        completions: &mut StepCompletions,
    ) -> Result<(), BackendError> {
        if readiness.writable {
            self.client.flush()?;
        }
        if !readiness.readable {
            return Ok(());
        }
        while let Some(reply) = self.client.poll_reply()? {
            let Some(tag) = self.in_flight.pop_front() else {
                return Err(BackendError::protocol(
                    Target::Cache,
                    "reply received with no command in flight",
                ));
            };
            debug!(tag = %tag, reply = reply.kind().as_str(), "Cache reply decoded");
            completions.push((tag, translate(reply)));
        }
        Ok(())
    }
}
