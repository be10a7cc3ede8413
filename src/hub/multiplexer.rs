use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;
use std::os::fd::{BorrowedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use polling::{Event, Events, Poller};

/// Readiness interest for a registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub const READ: Interest = Interest {
        readable: true,
        writable: false,
    };

    pub const WRITE: Interest = Interest {
        readable: false,
        writable: true,
    };

    pub const BOTH: Interest = Interest {
        readable: true,
        writable: true,
    };
}

/// Readiness reported by the OS for a registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

struct Source {
    raw_fd: RawFd,
}

/// Ready-set multiplexer: wraps the OS poller, tracks registered file
/// descriptors by caller-chosen key, and exposes a cross-thread wake-up
/// handle.
///
/// Interest is oneshot: after an event is delivered for a source, the caller
/// re-arms it with [`Multiplexer::rearm`].
pub(crate) struct Multiplexer {
    poller: Arc<Poller>,
    sources: HashMap<usize, Source>,
    events: Events,
}

impl Multiplexer {
    /// `max_events` bounds how many readiness events one wait retrieves;
    /// anything beyond it stays pending at the OS level for the next wait.
    pub(crate) fn new(max_events: usize) -> io::Result<Self> {
        let capacity = NonZeroUsize::new(max_events.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Multiplexer {
            poller: Arc::new(Poller::new()?),
            sources: HashMap::new(),
            events: Events::with_capacity(capacity),
        })
    }

    /// Wake handle usable from other threads.
    pub(crate) fn notifier(&self) -> Notifier {
        Notifier {
            poller: self.poller.clone(),
        }
    }

    /// Register a file descriptor under the given event key.
    pub(crate) fn add(&mut self, raw_fd: RawFd, key: usize, interest: Interest) -> io::Result<()> {
        if self.sources.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "source key already registered",
            ));
        }
        // SAFETY: the fd stays open for the lifetime of the registration;
        // remove() deletes it from the poller before the owner closes it.
        unsafe {
            self.poller
                .add(raw_fd, Event::new(key, interest.readable, interest.writable))?;
        }
        self.sources.insert(key, Source { raw_fd });
        Ok(())
    }

    /// Re-arm oneshot interest after an event delivery.
    pub(crate) fn rearm(&self, key: usize, interest: Interest) -> io::Result<()> {
        let source = self.sources.get(&key).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "source key not registered")
        })?;
        let borrowed = unsafe { BorrowedFd::borrow_raw(source.raw_fd) };
        self.poller.modify(
            &borrowed,
            Event::new(key, interest.readable, interest.writable),
        )
    }

    /// Deregister a source. The fd may already be closed by its owner.
    pub(crate) fn remove(&mut self, key: usize) {
        if let Some(source) = self.sources.remove(&key) {
            let borrowed = unsafe { BorrowedFd::borrow_raw(source.raw_fd) };
            let _ = self.poller.delete(&borrowed);
        }
    }

    /// Wait for readiness or an injected wake-up, up to `timeout`.
    ///
    /// A wake-up injected via [`Notifier::notify`] makes the wait return with
    /// no events. Ready keys are appended to `out`.
    pub(crate) fn wait(
        &mut self,
        timeout: Option<Duration>,
        out: &mut Vec<(usize, Readiness)>,
    ) -> io::Result<usize> {
        self.events.clear();
        let n = self.poller.wait(&mut self.events, timeout)?;
        out.extend(self.events.iter().map(|ev| {
            (
                ev.key,
                Readiness {
                    readable: ev.readable,
                    writable: ev.writable,
                },
            )
        }));
        Ok(n)
    }
}

/// Cross-thread wake-up handle for the multiplexer.
///
/// Producer threads call [`notify`](Notifier::notify) after publishing a
/// completion so the hub thread leaves its wait and drains the channel.
#[derive(Clone)]
pub struct Notifier {
    poller: Arc<Poller>,
}

impl Notifier {
    pub fn notify(&self) -> io::Result<()> {
        self.poller.notify()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Notifier")
    }
}
