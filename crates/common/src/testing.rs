//! Scripted HTTP transport for tests
//!
//! `ScriptedClient` answers GET requests from a queue of [`Reply`] values
//! and records every call together with the cancellation token it was
//! given, so tests can assert on what reached the transport.

use crate::http::{HttpClient, HttpResponse};
use crate::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;

type Delivery = Result<HttpResponse, TransportError>;

/// How the scripted transport answers one request
#[derive(Debug, Clone)]
pub enum Reply {
    /// JSON body with the given status
    Json { status: u16, body: serde_json::Value },
    /// Status with an empty body
    Status(u16),
    /// Raw body with the given status
    Body { status: u16, body: Bytes },
    /// Transport failure
    NetworkError(String),
    /// Never answers; aborts once the request is cancelled
    Hang,
    /// Waits for [`ScriptedClient::resolve`]; aborts if cancelled first
    Deferred,
    /// Panics inside the transport
    Panic(String),
}

impl Reply {
    /// 200 with a JSON body
    pub fn ok(body: serde_json::Value) -> Self {
        Reply::Json { status: 200, body }
    }

    fn into_delivery(self) -> Delivery {
        match self {
            Reply::Json { status, body } => Ok(HttpResponse::new(
                status,
                serde_json::to_vec(&body).unwrap_or_default(),
            )),
            Reply::Status(status) => Ok(HttpResponse::new(status, Bytes::new())),
            Reply::Body { status, body } => Ok(HttpResponse::new(status, body)),
            Reply::NetworkError(message) => Err(TransportError::Network(message)),
            Reply::Hang | Reply::Deferred | Reply::Panic(_) => Err(TransportError::Network(
                format!("{:?} cannot be delivered as a response", self),
            )),
        }
    }
}

/// One request seen by the transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub token: CancellationToken,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Reply>,
    fallback: Option<Reply>,
    calls: Vec<RecordedCall>,
    deferred: HashMap<usize, oneshot::Sender<Delivery>>,
}

/// Programmable [`HttpClient`]
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<Script>,
    calls_changed: Notify,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every request not covered by a queued reply
    pub fn always(&self, reply: Reply) -> &Self {
        self.script.lock().fallback = Some(reply);
        self
    }

    /// Queue a reply for the next unanswered request
    pub fn once(&self, reply: Reply) -> &Self {
        self.script.lock().queue.push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    /// Wait until at least `count` requests reached the transport
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.calls_changed.notified();
            if self.call_count() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Answer the deferred request with index `call`.
    ///
    /// Returns false if the request was not deferred, was already answered,
    /// or stopped waiting because it was cancelled.
    pub fn resolve(&self, call: usize, reply: Reply) -> bool {
        let sender = self.script.lock().deferred.remove(&call);
        match sender {
            Some(sender) => sender.send(reply.into_delivery()).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn get(&self, url: &str, cancel: &CancellationToken) -> Delivery {
        let (reply, deferred) = {
            let mut script = self.script.lock();
            let index = script.calls.len();
            script.calls.push(RecordedCall {
                url: url.to_string(),
                token: cancel.clone(),
            });

            let reply = script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or_else(|| Reply::NetworkError(format!("no reply scripted for {}", url)));

            let deferred = if matches!(reply, Reply::Deferred) {
                let (tx, rx) = oneshot::channel();
                script.deferred.insert(index, tx);
                Some(rx)
            } else {
                None
            };
            (reply, deferred)
        };
        self.calls_changed.notify_waiters();

        if let Some(rx) = deferred {
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::Aborted),
                delivery = rx => delivery.unwrap_or(Err(TransportError::Aborted)),
            };
        }

        match reply {
            Reply::Hang => {
                cancel.cancelled().await;
                Err(TransportError::Aborted)
            }
            Reply::Panic(message) => panic!("{}", message),
            reply => reply.into_delivery(),
        }
    }
}
