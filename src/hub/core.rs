use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use slab::Slab;
use tracing::{debug, error, info, warn};

use super::multiplexer::{Multiplexer, Notifier, Readiness};
use super::stepper::{StepCompletions, Stepper};
use crate::ids::{InvokeId, Tag};
use crate::offload::{Job, OffloadQueue, Payload, QueueError};
use crate::protocol::{BackendError, DeliveryMode, Outcome, Request, RequestState};
use crate::runtime_config::RuntimeConfig;

/// Identifier of a handler registered with a [`Hub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) usize);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Scheduler programming error, returned synchronously.
///
/// Backend failures never surface here; they travel inside the request's
/// [`Outcome`].
#[derive(Debug)]
pub enum HubError {
    /// The hub was entered from a thread other than its bound thread.
    ///
    /// A precondition violation: asserts in debug builds, is logged and
    /// rejected here in release builds.
    ThreadAffinity {
        expected: ThreadId,
        actual: ThreadId,
    },
    /// Handler id is not registered
    UnknownHandler(HandlerId),
    /// Request was not in the `Created` state
    InvalidState(RequestState),
    /// Multiplexer registration failed
    Io(io::Error),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::ThreadAffinity { expected, actual } => write!(
                f,
                "hub bound to thread {:?} entered from thread {:?}",
                expected, actual
            ),
            HubError::UnknownHandler(id) => write!(f, "no handler registered as {}", id),
            HubError::InvalidState(state) => {
                write!(f, "request in state '{}' cannot be submitted", state)
            }
            HubError::Io(err) => write!(f, "multiplexer error: {}", err),
        }
    }
}

impl std::error::Error for HubError {}

/// Why [`Hub::offload`] handed the request back instead of submitting it.
#[derive(Debug)]
pub enum OffloadError {
    Hub(HubError),
    Queue(QueueError),
}

impl OffloadError {
    /// Backpressure: the connection's queue is at capacity; retry or shed.
    pub fn is_capacity(&self) -> bool {
        matches!(self, OffloadError::Queue(QueueError::Full { .. }))
    }
}

impl fmt::Display for OffloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffloadError::Hub(err) => err.fmt(f),
            OffloadError::Queue(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for OffloadError {}

/// An offload submission rejection. Owns the request so the caller can apply
/// backpressure and retry; nothing is silently dropped.
#[derive(Debug)]
pub struct OffloadRejected {
    pub request: Request,
    pub error: OffloadError,
}

impl fmt::Display for OffloadRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

/// A finished offload job travelling back to the hub thread.
#[derive(Debug)]
pub struct Completion {
    pub invoke_id: InvokeId,
    pub outcome: Outcome,
}

/// `Send + Clone` handle producers use to publish completions to the hub.
///
/// Delivery is a channel send followed by a multiplexer wake-up, so the hub
/// observes the fully constructed outcome on its next step.
#[derive(Debug, Clone)]
pub struct HubWaker {
    tx: Sender<Completion>,
    notifier: Notifier,
}

impl HubWaker {
    /// Publish a completion. Hands the completion back if the hub is gone.
    pub fn deliver(&self, completion: Completion) -> Result<(), Completion> {
        match self.tx.send(completion) {
            Ok(()) => {
                if let Err(err) = self.notifier.notify() {
                    warn!(error = %err, "Hub wake-up notification failed");
                }
                Ok(())
            }
            Err(send_err) => Err(send_err.0),
        }
    }
}

/// Scheduling counters, readable from any thread.
#[derive(Debug, Default)]
pub struct HubMetrics {
    steps: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    discarded: AtomicU64,
}

impl HubMetrics {
    fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_terminal(&self, state: RequestState) {
        match state {
            RequestState::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            RequestState::TimedOut => self.timed_out.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn get_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn get_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn get_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn get_timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Late or duplicate completions dropped after their request was
    /// detached (timeout, cancellation, unregistration).
    pub fn get_discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

struct HandlerEntry {
    stepper: Box<dyn Stepper>,
    /// In-flight (tag, invoke id) pairs in submission order.
    in_flight: VecDeque<(Tag, InvokeId)>,
    /// Tags whose requests were detached; their late replies are dropped.
    discarded: HashSet<Tag>,
    next_tag: u64,
}

enum Route {
    Handler(HandlerId),
    Offloaded,
}

struct PendingEntry {
    request: Request,
    route: Route,
}

/// The per-thread scheduler.
///
/// One hub instance lives on each host thread that owns non-blocking
/// backends. It multiplexes handler sockets, drains offload completions, and
/// reaps timeouts, all inside [`step`](Hub::step), which the host event loop
/// calls repeatedly.
///
/// The hub is deliberately neither `Send` nor `Sync`: handler-advancing
/// methods cannot be reached from another thread in safe code. Producer
/// threads interact with it only through the [`HubWaker`]. A runtime
/// thread-id guard backs the marker for hosts that hold the hub behind
/// unsafe or foreign-function plumbing.
///
/// Timeout expiry is checked on every wake-up of the multiplexer rather than
/// with per-request timers; worst-case timeout latency is bounded by the
/// configured wait granularity.
pub struct Hub {
    cfg: RuntimeConfig,
    mux: Multiplexer,
    handlers: Slab<HandlerEntry>,
    pending: HashMap<InvokeId, PendingEntry>,
    /// Offloaded invokes whose requests were detached; late completions are
    /// dropped.
    discarded_jobs: HashSet<InvokeId>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
    /// Terminal requests awaiting delivery to the caller.
    ready: Vec<Request>,
    events_buf: Vec<(usize, Readiness)>,
    next_offload_tag: u64,
    bound: ThreadId,
    stepping: bool,
    retired: Vec<HandlerId>,
    metrics: Arc<HubMetrics>,
    _not_send: PhantomData<*const ()>,
}

pub(crate) fn check_affinity(bound: ThreadId) -> Result<(), HubError> {
    let actual = thread::current().id();
    if actual == bound {
        Ok(())
    } else {
        Err(HubError::ThreadAffinity {
            expected: bound,
            actual,
        })
    }
}

impl Hub {
    /// Create a hub bound to the calling thread.
    pub fn new(cfg: RuntimeConfig) -> io::Result<Self> {
        let (completions_tx, completions_rx) = mpsc::channel();
        Ok(Hub {
            mux: Multiplexer::new(cfg.max_events)?,
            cfg,
            handlers: Slab::new(),
            pending: HashMap::new(),
            discarded_jobs: HashSet::new(),
            completions_tx,
            completions_rx,
            ready: Vec::new(),
            events_buf: Vec::new(),
            next_offload_tag: 0,
            bound: thread::current().id(),
            stepping: false,
            retired: Vec::new(),
            metrics: Arc::new(HubMetrics::default()),
            _not_send: PhantomData,
        })
    }

    fn ensure_affinity(&self) -> Result<(), HubError> {
        match check_affinity(self.bound) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug_assert!(false, "hub entered from a foreign thread");
                error!(
                    expected = ?self.bound,
                    actual = ?thread::current().id(),
                    "Hub entered from a foreign thread - rejected"
                );
                Err(err)
            }
        }
    }

    /// Bind a stepper's file descriptor into the multiplexer.
    pub fn register(&mut self, stepper: Box<dyn Stepper>) -> Result<HandlerId, HubError> {
        self.ensure_affinity()?;
        let raw_fd = stepper.raw_fd();
        let interest = stepper.interest();
        let target = stepper.target();
        let entry = self.handlers.vacant_entry();
        let id = HandlerId(entry.key());
        self.mux
            .add(raw_fd, id.0, interest)
            .map_err(HubError::Io)?;
        entry.insert(HandlerEntry {
            stepper,
            in_flight: VecDeque::new(),
            discarded: HashSet::new(),
            next_tag: 0,
        });
        info!(handler = %id, target = %target, fd = raw_fd, "Handler registered");
        Ok(id)
    }

    /// Remove a handler's bindings.
    ///
    /// Safe to call while a step pass is iterating: the removal is deferred
    /// until the pass completes. In-flight requests on the handler are
    /// failed with a shutdown error and delivered normally.
    pub fn unregister(&mut self, id: HandlerId) -> Result<(), HubError> {
        self.ensure_affinity()?;
        if !self.handlers.contains(id.0) {
            return Err(HubError::UnknownHandler(id));
        }
        if self.stepping {
            debug!(handler = %id, "Unregistration deferred until the step pass completes");
            self.retired.push(id);
            return Ok(());
        }
        self.remove_handler(id);
        Ok(())
    }

    /// Submit a request to a registered handler.
    ///
    /// Assigns the correlation identifiers and start time, hands the encoded
    /// payload to the stepper, and tracks the request until a completion,
    /// timeout, or connection failure makes it terminal. A handler-level
    /// submission failure is not returned here: the request comes back
    /// through [`step`](Hub::step) carrying the error, like any other
    /// failure.
    pub fn submit(
        &mut self,
        id: HandlerId,
        mut request: Request,
        payload: Vec<u8>,
    ) -> Result<InvokeId, HubError> {
        self.ensure_affinity()?;
        if request.state() != RequestState::Created {
            return Err(HubError::InvalidState(request.state()));
        }
        if request.timeout().is_zero() && !self.cfg.default_timeout.is_zero() {
            request = request.with_timeout(self.cfg.default_timeout);
        }
        let entry = match self.handlers.get_mut(id.0) {
            Some(entry) => entry,
            None => return Err(HubError::UnknownHandler(id)),
        };

        let invoke_id = InvokeId::new();
        let tag = Tag(entry.next_tag);
        entry.next_tag += 1;
        if let Err(state) = request.activate(invoke_id, tag, Instant::now()) {
            return Err(HubError::InvalidState(state));
        }

        match entry.stepper.start(tag, &payload) {
            Ok(()) => {
                entry.in_flight.push_back((tag, invoke_id));
                let interest = entry.stepper.interest();
                if let Err(err) = self.mux.rearm(id.0, interest) {
                    warn!(handler = %id, error = %err, "Failed to re-arm handler interest");
                }
                self.pending.insert(
                    invoke_id,
                    PendingEntry {
                        request,
                        route: Route::Handler(id),
                    },
                );
                self.metrics.record_submitted();
                debug!(
                    invoke_id = %invoke_id,
                    handler = %id,
                    payload_len = payload.len(),
                    "Request dispatched to handler"
                );
            }
            Err(err) => {
                warn!(
                    invoke_id = %invoke_id,
                    handler = %id,
                    error = %err,
                    "Handler refused request - failing it"
                );
                self.metrics.record_submitted();
                if request.complete(Outcome::Error(err)).is_ok() {
                    self.metrics.record_terminal(request.state());
                }
                self.finish(request);
            }
        }
        Ok(invoke_id)
    }

    /// Submit a request whose backend call must run on a producer thread.
    ///
    /// The request itself never leaves this thread: it is parked in the
    /// hub's ledger while a [`Job`] carrying the payload and correlation id
    /// crosses to the producer. A full queue hands the request back
    /// synchronously so the caller can retry or shed load.
    pub fn offload(
        &mut self,
        queue: &OffloadQueue,
        key: &str,
        mut request: Request,
        payload: Payload,
    ) -> Result<InvokeId, OffloadRejected> {
        if let Err(err) = self.ensure_affinity() {
            return Err(OffloadRejected {
                request,
                error: OffloadError::Hub(err),
            });
        }
        if request.state() != RequestState::Created {
            let state = request.state();
            return Err(OffloadRejected {
                request,
                error: OffloadError::Hub(HubError::InvalidState(state)),
            });
        }
        if request.timeout().is_zero() && !self.cfg.default_timeout.is_zero() {
            request = request.with_timeout(self.cfg.default_timeout);
        }

        let invoke_id = InvokeId::new();
        let now = Instant::now();
        let deadline = if request.timeout().is_zero() {
            None
        } else {
            Some(now + request.timeout())
        };
        let job = Job {
            invoke_id,
            target: request.target(),
            payload,
            deadline,
            ctx: request.context().cloned(),
        };

        if let Err(err) = queue.enqueue(key, job) {
            debug!(invoke_id = %invoke_id, key, error = %err, "Offload enqueue rejected");
            return Err(OffloadRejected {
                request,
                error: OffloadError::Queue(err),
            });
        }

        let tag = Tag(self.next_offload_tag);
        self.next_offload_tag += 1;
        if request.activate(invoke_id, tag, now).is_err() {
            // Unreachable: the state was checked above and nothing ran since.
            error!(invoke_id = %invoke_id, "Offloaded request failed to activate");
        }
        self.pending.insert(
            invoke_id,
            PendingEntry {
                request,
                route: Route::Offloaded,
            },
        );
        self.metrics.record_submitted();
        debug!(invoke_id = %invoke_id, key, "Request offloaded");
        Ok(invoke_id)
    }

    /// One scheduling pass.
    ///
    /// Waits in the multiplexer up to the nearest pending deadline (or the
    /// configured idle bound), advances every ready handler, drains offload
    /// completions, reaps expired requests, and returns the requests that
    /// reached a terminal state. Cancelled requests are dropped here after
    /// their completion fired; fire-and-forget requests are dropped after
    /// logging any failure.
    pub fn step(&mut self) -> io::Result<Vec<Request>> {
        self.ensure_affinity().map_err(io::Error::other)?;
        self.metrics.record_step();
        let timeout = self.wait_timeout();

        self.stepping = true;
        self.events_buf.clear();
        let waited = {
            let events_buf = &mut self.events_buf;
            self.mux.wait(timeout, events_buf)
        };
        if let Err(err) = waited {
            self.stepping = false;
            return Err(err);
        }

        let events = std::mem::take(&mut self.events_buf);
        for &(key, readiness) in &events {
            self.step_handler(key, readiness);
        }
        self.events_buf = events;

        self.drain_completions();
        self.reap_timeouts();

        self.stepping = false;
        let retired = std::mem::take(&mut self.retired);
        for id in retired {
            self.remove_handler(id);
        }

        Ok(std::mem::take(&mut self.ready))
    }

    /// Cooperatively cancel an in-flight request.
    ///
    /// The backend call is not interrupted; its completion still fires to
    /// release backend-side resources and is then dropped instead of being
    /// delivered. Returns `false` when the request is no longer pending.
    pub fn cancel(&mut self, invoke_id: InvokeId) -> bool {
        if self.ensure_affinity().is_err() {
            return false;
        }
        match self.pending.get_mut(&invoke_id) {
            Some(pending) => {
                pending.request.mark_cancelled();
                debug!(invoke_id = %invoke_id, "Request marked cancelled");
                true
            }
            None => false,
        }
    }

    /// Drive [`step`](Hub::step) until the given request is terminal or
    /// `max_wait` elapses. Other requests finishing in the meantime stay
    /// queued for the next step.
    pub fn wait_for(
        &mut self,
        invoke_id: InvokeId,
        max_wait: Duration,
    ) -> io::Result<Option<Request>> {
        let give_up = Instant::now() + max_wait;
        let mut deferred: Vec<Request> = Vec::new();
        let mut found = None;
        while found.is_none() && Instant::now() < give_up {
            for request in self.step()? {
                if request.invoke_id() == Some(invoke_id) {
                    found = Some(request);
                } else {
                    deferred.push(request);
                }
            }
        }
        self.ready.append(&mut deferred);
        Ok(found)
    }

    /// Completion handle for producer threads.
    pub fn waker(&self) -> HubWaker {
        HubWaker {
            tx: self.completions_tx.clone(),
            notifier: self.mux.notifier(),
        }
    }

    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    /// Number of requests currently tracked by the ledger.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn wait_timeout(&self) -> Option<Duration> {
        if !self.ready.is_empty() {
            return Some(Duration::ZERO);
        }
        let nearest = self
            .pending
            .values()
            .filter_map(|pending| pending.request.deadline())
            .min();
        match nearest {
            // The idle bound caps the wait even with a distant deadline, so
            // externally injected wake-ups are observed promptly.
            Some(deadline) => Some(
                deadline
                    .saturating_duration_since(Instant::now())
                    .min(self.cfg.idle_wait),
            ),
            None => Some(self.cfg.idle_wait),
        }
    }

    fn step_handler(&mut self, key: usize, readiness: Readiness) {
        let (result, completions) = {
            let entry = match self.handlers.get_mut(key) {
                Some(entry) => entry,
                None => {
                    debug!(key, "Readiness for retired handler ignored");
                    return;
                }
            };
            let mut completions = StepCompletions::new();
            let result = entry.stepper.step(readiness, &mut completions);
            (result, completions)
        };

        match result {
            Ok(()) => {
                for (tag, outcome) in completions {
                    self.resolve_completion(key, tag, outcome);
                }
                if let Some(entry) = self.handlers.get(key) {
                    if let Err(err) = self.mux.rearm(key, entry.stepper.interest()) {
                        warn!(handler = %HandlerId(key), error = %err, "Failed to re-arm handler interest");
                    }
                }
            }
            Err(err) => {
                warn!(
                    handler = %HandlerId(key),
                    error = %err,
                    "Connection-level failure - failing in-flight requests"
                );
                self.fail_handler(key, err);
            }
        }
    }

    fn resolve_completion(&mut self, key: usize, tag: Tag, outcome: Outcome) {
        let invoke_id = {
            let entry = match self.handlers.get_mut(key) {
                Some(entry) => entry,
                None => return,
            };
            if entry.discarded.remove(&tag) {
                debug!(handler = %HandlerId(key), tag = %tag, "Late reply for detached request discarded");
                self.metrics.record_discarded();
                return;
            }
            match entry.in_flight.front() {
                Some(&(front_tag, invoke_id)) if front_tag == tag => {
                    entry.in_flight.pop_front();
                    invoke_id
                }
                _ => match entry.in_flight.iter().position(|&(t, _)| t == tag) {
                    Some(pos) => {
                        warn!(
                            handler = %HandlerId(key),
                            tag = %tag,
                            "Completion arrived out of submission order"
                        );
                        match entry.in_flight.remove(pos) {
                            Some((_, invoke_id)) => invoke_id,
                            None => return,
                        }
                    }
                    None => {
                        warn!(handler = %HandlerId(key), tag = %tag, "Completion for unknown tag dropped");
                        self.metrics.record_discarded();
                        return;
                    }
                },
            }
        };

        match self.pending.remove(&invoke_id) {
            Some(mut pending) => {
                match pending.request.complete(outcome) {
                    Ok(()) => self.metrics.record_terminal(pending.request.state()),
                    Err(dropped) => {
                        debug!(invoke_id = %invoke_id, dropped = %dropped.kind(), "Duplicate completion dropped");
                        self.metrics.record_discarded();
                    }
                }
                self.finish(pending.request);
            }
            None => {
                debug!(invoke_id = %invoke_id, "Completion for unknown request dropped");
                self.metrics.record_discarded();
            }
        }
    }

    fn fail_handler(&mut self, key: usize, err: BackendError) {
        let in_flight: Vec<(Tag, InvokeId)> = match self.handlers.get_mut(key) {
            Some(entry) => entry.in_flight.drain(..).collect(),
            None => return,
        };
        for (_tag, invoke_id) in in_flight {
            if let Some(mut pending) = self.pending.remove(&invoke_id) {
                if pending.request.complete(Outcome::Error(err.clone())).is_ok() {
                    self.metrics.record_terminal(pending.request.state());
                }
                self.finish(pending.request);
            }
        }
        // The connection is unusable; retire the handler. The host decides
        // whether to reconnect and register a replacement.
        if self.stepping {
            self.retired.push(HandlerId(key));
        } else {
            self.remove_handler(HandlerId(key));
        }
    }

    fn remove_handler(&mut self, id: HandlerId) {
        if !self.handlers.contains(id.0) {
            return;
        }
        let entry = self.handlers.remove(id.0);
        self.mux.remove(id.0);
        let target = entry.stepper.target();
        for (_tag, invoke_id) in entry.in_flight {
            if let Some(mut pending) = self.pending.remove(&invoke_id) {
                let err =
                    BackendError::shutdown(target, "handler unregistered with request in flight");
                if pending.request.complete(Outcome::Error(err)).is_ok() {
                    self.metrics.record_terminal(pending.request.state());
                }
                self.finish(pending.request);
            }
        }
        info!(handler = %id, target = %target, "Handler unregistered");
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            let Completion { invoke_id, outcome } = completion;
            if self.discarded_jobs.remove(&invoke_id) {
                debug!(invoke_id = %invoke_id, "Late offload completion discarded");
                self.metrics.record_discarded();
                continue;
            }
            match self.pending.remove(&invoke_id) {
                Some(mut pending) => {
                    match pending.request.complete(outcome) {
                        Ok(()) => self.metrics.record_terminal(pending.request.state()),
                        Err(dropped) => {
                            debug!(invoke_id = %invoke_id, dropped = %dropped.kind(), "Duplicate completion dropped");
                            self.metrics.record_discarded();
                        }
                    }
                    self.finish(pending.request);
                }
                None => {
                    debug!(invoke_id = %invoke_id, "Completion for unknown request dropped");
                    self.metrics.record_discarded();
                }
            }
        }
    }

    fn reap_timeouts(&mut self) {
        let now = Instant::now();
        let expired: Vec<InvokeId> = self
            .pending
            .iter()
            .filter(|(_, pending)| {
                pending
                    .request
                    .deadline()
                    .is_some_and(|deadline| deadline <= now)
            })
            .map(|(invoke_id, _)| *invoke_id)
            .collect();

        for invoke_id in expired {
            let Some(mut pending) = self.pending.remove(&invoke_id) else {
                continue;
            };
            // Detach the request's bookkeeping so a late reply is dropped
            // instead of pairing with the wrong request.
            match pending.route {
                Route::Handler(id) => {
                    if let (Some(entry), Some(tag)) =
                        (self.handlers.get_mut(id.0), pending.request.tag())
                    {
                        if let Some(pos) = entry
                            .in_flight
                            .iter()
                            .position(|&(_, in_flight)| in_flight == invoke_id)
                        {
                            entry.in_flight.remove(pos);
                        }
                        entry.discarded.insert(tag);
                    }
                }
                Route::Offloaded => {
                    self.discarded_jobs.insert(invoke_id);
                }
            }

            let timeout_ms = pending.request.timeout().as_millis() as u64;
            let err = BackendError::timeout(
                pending.request.target(),
                format!("no completion within {}ms", timeout_ms),
            );
            warn!(
                invoke_id = %invoke_id,
                target = %pending.request.target(),
                timeout_ms,
                "Request timed out"
            );
            if pending.request.complete(Outcome::Error(err)).is_ok() {
                self.metrics.record_terminal(pending.request.state());
            }
            self.finish(pending.request);
        }
    }

    fn finish(&mut self, request: Request) {
        if request.is_cancelled() {
            debug!(
                invoke_id = ?request.invoke_id(),
                state = %request.state(),
                "Cancelled request dropped after its completion fired"
            );
            return;
        }
        match request.mode() {
            DeliveryMode::Post => {
                if let Some(outcome) = request.result() {
                    if outcome.is_error() {
                        warn!(
                            invoke_id = ?request.invoke_id(),
                            target = %request.target(),
                            detail = %outcome.describe(),
                            "Fire-and-forget request failed"
                        );
                    }
                }
            }
            DeliveryMode::Wait => self.ready.push(request),
        }
    }
}
