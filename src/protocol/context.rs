use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Opaque caller-supplied logging handle.
///
/// The dispatch core never inspects its contents; it only forwards the
/// handle to backend adapters so their diagnostics correlate with the host's
/// own logging. Cloning shares the same underlying handle.
#[derive(Clone)]
pub struct LogContext {
    inner: Arc<dyn fmt::Display + Send + Sync>,
}

impl LogContext {
    pub fn new(handle: impl fmt::Display + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(handle),
        }
    }

    /// Register the context with a component for the duration of the
    /// returned guard. Registration is logged on creation, unregistration on
    /// drop: exactly once each, in that order.
    pub fn attach(&self, component: &'static str) -> AttachedContext {
        debug!(component, ctx = %self, "log context attached");
        AttachedContext {
            ctx: self.clone(),
            component,
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogContext({})", self.inner)
    }
}

/// RAII registration of a [`LogContext`] within one component.
pub struct AttachedContext {
    ctx: LogContext,
    component: &'static str,
}

impl AttachedContext {
    pub fn context(&self) -> &LogContext {
        &self.ctx
    }
}

impl Drop for AttachedContext {
    fn drop(&mut self) {
        debug!(component = self.component, ctx = %self.ctx, "log context detached");
    }
}
