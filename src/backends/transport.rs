use serde::Serialize;
use tracing::debug;

use crate::offload::{Job, JobExecutor, Payload};
use crate::protocol::{BackendError, NativeStatus, Outcome, Reply, Target};

/// An HTTP exchange request, already composed by the caller.
///
/// The transport's wire implementation lives in the native client; this
/// layer only carries the call to a producer thread and maps the result
/// into the common object model.
#[derive(Debug, Clone, Serialize)]
pub struct TransportCall {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportCall {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut call = Self::new("POST", url);
        call.body = body;
        call
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A completed HTTP exchange as reported by the native client.
#[derive(Debug, Clone)]
pub struct TransportExchange {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Native transport client contract. `perform` blocks for the whole
/// exchange, so transport work routes through the offloader.
///
/// Transport-level failures (resolution, connect, TLS) are returned as
/// errors; an HTTP error status is a completed exchange and is classified
/// here instead.
pub trait TransportClient: Send {
    fn perform(&mut self, call: &TransportCall) -> Result<TransportExchange, BackendError>;
}

/// Runs transport jobs on a producer thread.
pub struct TransportExecutor<C: TransportClient> {
    client: C,
}

impl<C: TransportClient> TransportExecutor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: TransportClient> JobExecutor for TransportExecutor<C> {
    fn target(&self) -> Target {
        Target::Transport
    }

    fn execute(&mut self, job: &Job) -> Outcome {
        let call = match &job.payload {
            Payload::Transport(call) => call,
            other => {
                return Outcome::Error(BackendError::protocol(
                    Target::Transport,
                    format!("transport producer received a {} payload", other.target()),
                ))
            }
        };
        debug!(invoke_id = %job.invoke_id, method = %call.method, url = %call.url, "Performing exchange");
        match self.client.perform(call) {
            Ok(exchange) if exchange.status < 400 => Outcome::Reply(
                Reply::new(Target::Transport)
                    .with_code(exchange.status as u64)
                    .with_body(exchange.body),
            ),
            Ok(exchange) => Outcome::Error(
                BackendError::backend(
                    Target::Transport,
                    format!("exchange returned status {}", exchange.status),
                )
                .with_status(NativeStatus::Http(exchange.status)),
            ),
            Err(err) => Outcome::Error(err),
        }
    }
}
