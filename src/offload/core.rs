use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backends::database::DbCommand;
use crate::backends::jobqueue::QueueCommand;
use crate::backends::transport::TransportCall;
use crate::hub::{Completion, HubWaker};
use crate::ids::InvokeId;
use crate::protocol::{BackendError, LogContext, Outcome, Target};

/// Backend-specific job payload carried to a producer thread.
///
/// The variant set is closed; a producer's executor matches on it
/// exhaustively and rejects mismatched payloads as protocol errors.
#[derive(Debug, Clone, Serialize)]
pub enum Payload {
    Db(DbCommand),
    Transport(TransportCall),
    JobQueue(QueueCommand),
}

impl Payload {
    pub fn target(&self) -> Target {
        match self {
            Payload::Db(_) => Target::Database,
            Payload::Transport(_) => Target::Transport,
            Payload::JobQueue(_) => Target::JobQueue,
        }
    }
}

/// What crosses to a producer thread: the payload plus correlation and
/// deadline bookkeeping. The originating request itself stays in the hub's
/// ledger on its own thread.
#[derive(Debug)]
pub struct Job {
    pub invoke_id: InvokeId,
    pub target: Target,
    pub payload: Payload,
    /// Jobs still queued past this instant are failed without calling the
    /// backend.
    pub deadline: Option<Instant>,
    /// Opaque caller context, forwarded for diagnostic correlation.
    pub ctx: Option<LogContext>,
}

/// The blocking backend call plus native-reply translation.
///
/// One executor instance owns one backend connection and runs on the
/// producer thread dedicated to it. `execute` may block; it must return an
/// [`Outcome`] for every job, turning native failures into backend errors
/// rather than panicking.
pub trait JobExecutor: Send {
    fn target(&self) -> Target;

    fn execute(&mut self, job: &Job) -> Outcome;
}

/// Synchronous enqueue failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The connection's queue is at its configured bound. Backpressure: the
    /// caller retries or sheds load; nothing was queued.
    Full { key: String, capacity: usize },
    /// No producer connection under this key
    UnknownKey(String),
    /// The queue is shutting down and no longer accepts work
    ShuttingDown,
    /// The producer thread is gone (it panicked or exited)
    Disconnected(String),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full { key, capacity } => {
                write!(f, "queue for '{}' at capacity ({})", key, capacity)
            }
            QueueError::UnknownKey(key) => write!(f, "no producer connection for '{}'", key),
            QueueError::ShuttingDown => f.write_str("offload queue is shutting down"),
            QueueError::Disconnected(key) => {
                write!(f, "producer for '{}' is no longer running", key)
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Configuration for the offload queue.
#[derive(Debug, Clone, Copy)]
pub struct OffloadConfig {
    /// Maximum queued-but-not-started jobs per connection key
    pub queue_bound: usize,
}

impl OffloadConfig {
    /// Load configuration from environment variables.
    ///
    /// - `SWYD_QUEUE_BOUND`: per-connection queue depth limit (default: 64)
    pub fn from_env() -> Self {
        let queue_bound = std::env::var("SWYD_QUEUE_BOUND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64);
        Self { queue_bound }
    }

    pub fn new(queue_bound: usize) -> Self {
        Self { queue_bound }
    }
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self { queue_bound: 64 }
    }
}

/// Per-connection queue counters.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    depth: AtomicUsize,
}

impl QueueMetrics {
    fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.depth.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Jobs rejected at capacity (backpressure events).
    pub fn get_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn get_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Approximate queued-plus-executing job count.
    pub fn get_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

struct Connection {
    tx: SyncSender<Job>,
    stop: Arc<AtomicBool>,
    metrics: Arc<QueueMetrics>,
    join: Option<JoinHandle<()>>,
}

/// Bounded, ordered mailboxes of pending jobs, one per logical backend
/// connection, each drained by a dedicated producer thread.
///
/// Jobs for the same key execute strictly in enqueue order; different keys
/// execute concurrently on their own producers. A queue at capacity rejects
/// new submissions instead of growing.
pub struct OffloadQueue {
    cfg: OffloadConfig,
    connections: HashMap<String, Connection>,
}

impl OffloadQueue {
    pub fn new(cfg: OffloadConfig) -> Self {
        Self {
            cfg,
            connections: HashMap::new(),
        }
    }

    /// Spawn a producer thread owning one backend connection under `key`.
    ///
    /// Completions are published through `waker` so the hub thread delivers
    /// them on the thread the caller expects. Re-using a key shuts the
    /// previous producer down first.
    pub fn add_connection(
        &mut self,
        key: &str,
        executor: Box<dyn JobExecutor>,
        waker: HubWaker,
    ) -> io::Result<()> {
        if let Some(old) = self.connections.remove(key) {
            warn!(key, "Replacing existing producer connection");
            shut_down_connection(key, old);
        }

        let (tx, rx) = mpsc::sync_channel(self.cfg.queue_bound);
        let stop = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(QueueMetrics::default());

        let thread_key = key.to_string();
        let thread_stop = stop.clone();
        let thread_metrics = metrics.clone();
        let join = thread::Builder::new()
            .name(format!("swyd-producer-{}", key))
            .spawn(move || {
                run_producer(thread_key, rx, thread_stop, executor, waker, thread_metrics)
            })?;

        self.connections.insert(
            key.to_string(),
            Connection {
                tx,
                stop,
                metrics,
                join: Some(join),
            },
        );
        info!(key, queue_bound = self.cfg.queue_bound, "Producer connection added");
        Ok(())
    }

    /// Append a job to its connection's queue.
    ///
    /// Never blocks: a queue at its bound returns [`QueueError::Full`]
    /// immediately so the caller can apply backpressure.
    pub fn enqueue(&self, key: &str, job: Job) -> Result<(), QueueError> {
        let conn = self
            .connections
            .get(key)
            .ok_or_else(|| QueueError::UnknownKey(key.to_string()))?;
        if conn.stop.load(Ordering::SeqCst) {
            return Err(QueueError::ShuttingDown);
        }
        match conn.tx.try_send(job) {
            Ok(()) => {
                conn.metrics.record_enqueued();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                conn.metrics.record_rejected();
                debug!(key, capacity = self.cfg.queue_bound, "Queue at capacity - job rejected");
                Err(QueueError::Full {
                    key: key.to_string(),
                    capacity: self.cfg.queue_bound,
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(key, "Producer disconnected - job rejected");
                Err(QueueError::Disconnected(key.to_string()))
            }
        }
    }

    pub fn metrics(&self, key: &str) -> Option<&Arc<QueueMetrics>> {
        self.connections.get(key).map(|conn| &conn.metrics)
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.cfg
    }

    /// Stop accepting work and wind the producers down.
    ///
    /// The job a producer is executing finishes and its completion is
    /// delivered; queued-but-not-started jobs are failed with shutdown
    /// errors, never silently dropped. Blocks until all producer threads
    /// have exited.
    pub fn shutdown(&mut self) {
        if self.connections.is_empty() {
            return;
        }
        info!(connections = self.connections.len(), "Offload queue shutting down");
        let connections: Vec<(String, Connection)> = self.connections.drain().collect();
        for (_, conn) in &connections {
            conn.stop.store(true, Ordering::SeqCst);
        }
        for (key, conn) in connections {
            shut_down_connection(&key, conn);
        }
    }
}

impl Drop for OffloadQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn shut_down_connection(key: &str, conn: Connection) {
    conn.stop.store(true, Ordering::SeqCst);
    // Dropping the sender lets the producer drain the remaining jobs and
    // exit its receive loop.
    drop(conn.tx);
    if let Some(join) = conn.join {
        if join.join().is_err() {
            warn!(key, "Producer thread panicked during shutdown");
        }
    }
}

fn run_producer(
    key: String,
    rx: Receiver<Job>,
    stop: Arc<AtomicBool>,
    mut executor: Box<dyn JobExecutor>,
    waker: HubWaker,
    metrics: Arc<QueueMetrics>,
) {
    debug!(key = %key, target = %executor.target(), "Producer thread started");

    for job in rx.iter() {
        let invoke_id = job.invoke_id;

        let outcome = if stop.load(Ordering::SeqCst) {
            debug!(key = %key, invoke_id = %invoke_id, "Queue shut down before the job started");
            Outcome::Error(BackendError::shutdown(
                job.target,
                "queue shut down before the job started",
            ))
        } else if job.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            debug!(key = %key, invoke_id = %invoke_id, "Deadline elapsed while the job was queued");
            Outcome::Error(BackendError::timeout(
                job.target,
                "deadline elapsed before the job started",
            ))
        } else {
            let _attached = job.ctx.as_ref().map(|ctx| ctx.attach("producer"));
            let started = Instant::now();
            let outcome = executor.execute(&job);
            debug!(
                key = %key,
                invoke_id = %invoke_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = %outcome.kind(),
                "Job executed"
            );
            outcome
        };

        metrics.record_completed();
        if waker.deliver(Completion { invoke_id, outcome }).is_err() {
            warn!(key = %key, "Hub is gone - exiting producer");
            break;
        }
    }

    debug!(key = %key, "Producer thread exiting");
}
