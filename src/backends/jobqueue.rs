use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::offload::{Job, JobExecutor, Payload};
use crate::protocol::{BackendError, Outcome, Reply, Target, Value};

/// The queue every connection watches until told otherwise.
pub const DEFAULT_QUEUE: &str = "default";

/// A job queue operation.
#[derive(Debug, Clone, Serialize)]
pub enum QueueCommand {
    /// Insert a job into the connection's current queue
    Put {
        priority: u32,
        delay: Option<Duration>,
        body: Vec<u8>,
    },
    /// Reserve the next ready job, waiting up to `wait`
    Reserve { wait: Option<Duration> },
    /// Acknowledge a reserved job without removing it
    Ack { id: u64 },
    /// Remove a reserved job
    Delete { id: u64 },
}

/// A job handed out by a reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedJob {
    pub id: u64,
    pub body: Vec<u8>,
}

/// Native job queue client contract.
///
/// Reserve blocks until a job is ready or the wait elapses, which is why
/// job queue work routes through the offloader.
pub trait JobQueueClient: Send {
    fn watch(&mut self, queue: &str) -> Result<(), BackendError>;

    fn ignore(&mut self, queue: &str) -> Result<(), BackendError>;

    fn put(
        &mut self,
        priority: u32,
        delay: Option<Duration>,
        body: &[u8],
    ) -> Result<u64, BackendError>;

    /// `Ok(None)` when the wait elapsed with no job ready.
    fn reserve(&mut self, wait: Option<Duration>) -> Result<Option<ReservedJob>, BackendError>;

    fn ack(&mut self, id: u64) -> Result<(), BackendError>;

    fn delete(&mut self, id: u64) -> Result<(), BackendError>;
}

/// Runs job queue commands on a producer thread.
pub struct JobQueueExecutor<C: JobQueueClient> {
    client: C,
}

impl<C: JobQueueClient> JobQueueExecutor<C> {
    /// Consumer start-up: watch the named queue, then stop watching the
    /// default queue so reserves only hand out intended jobs.
    pub fn consumer(mut client: C, queue: &str) -> Result<Self, BackendError> {
        client.watch(queue)?;
        if queue != DEFAULT_QUEUE {
            client.ignore(DEFAULT_QUEUE)?;
        }
        debug!(queue, "Job queue consumer watching");
        Ok(Self { client })
    }

    /// A producer-side connection; inserts go to the client's current queue.
    pub fn producer(client: C) -> Self {
        Self { client }
    }
}

impl<C: JobQueueClient> JobExecutor for JobQueueExecutor<C> {
    fn target(&self) -> Target {
        Target::JobQueue
    }

    fn execute(&mut self, job: &Job) -> Outcome {
        let command = match &job.payload {
            Payload::JobQueue(command) => command,
            other => {
                return Outcome::Error(BackendError::protocol(
                    Target::JobQueue,
                    format!("job queue producer received a {} payload", other.target()),
                ))
            }
        };
        match command {
            QueueCommand::Put {
                priority,
                delay,
                body,
            } => match self.client.put(*priority, *delay, body) {
                Ok(id) => Outcome::Reply(Reply::new(Target::JobQueue).with_code(id)),
                Err(err) => Outcome::Error(err),
            },
            QueueCommand::Reserve { wait } => match self.client.reserve(*wait) {
                Ok(Some(reserved)) => Outcome::Reply(
                    Reply::new(Target::JobQueue)
                        .with_code(reserved.id)
                        .with_body(reserved.body),
                ),
                // Wait elapsed with nothing ready: an empty value, not an error.
                Ok(None) => Outcome::Value(Value::Null),
                Err(err) => Outcome::Error(err),
            },
            QueueCommand::Ack { id } => match self.client.ack(*id) {
                Ok(()) => Outcome::Reply(Reply::new(Target::JobQueue).with_code(*id)),
                Err(err) => Outcome::Error(err),
            },
            QueueCommand::Delete { id } => match self.client.delete(*id) {
                Ok(()) => Outcome::Reply(Reply::new(Target::JobQueue).with_code(*id)),
                Err(err) => Outcome::Error(err),
            },
        }
    }
}
