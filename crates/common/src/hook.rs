//! Fetch hook
//!
//! Wraps a single-URL GET with a timeout and cancellation, and exposes the
//! outcome as a [`RequestState`].
//!
//! ```text
//!            execute()                 response / failure / timeout
//!   Idle ──────────────▶ Pending ─────────────────────────────────▶ Succeeded | Failed
//!    ▲                    │   ▲                                          │
//!    │                    └───┘ execute(): old token cancelled,          │
//!    │                          new generation minted                    │
//!    └───────────────────────────── reset() ─────────────────────────────┘
//! ```
//!
//! Every `execute()` mints a new generation and cancellation token. A
//! settling attempt only mutates state if its generation is still current
//! and the hook has not been torn down.

use crate::http::HttpClient;
use crate::timer::{Timer, TokioTimer};
use crate::{Error, FetchError, RequestPhase, RequestState, Result, TransportError};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Construction options for a [`FetchHook`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Run the first request as soon as the hook is created
    pub immediate: bool,

    /// Wall-clock budget for each attempt
    pub timeout_ms: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            immediate: true,
            timeout_ms: 5000,
        }
    }
}

impl FetchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Options for a hook that waits for an explicit `execute()`
    pub fn manual() -> Self {
        Self {
            immediate: false,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Cancellable, timeout-bounded GET of a single URL.
///
/// Dropping the hook cancels any in-flight attempt; nothing settles into
/// its state afterwards.
pub struct FetchHook<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    url: RwLock<String>,
    options: FetchOptions,
    client: Arc<dyn HttpClient>,
    timer: Arc<dyn Timer>,
    runtime: Handle,
    control: Mutex<Control>,
    state: watch::Sender<RequestState<T>>,
}

/// Bookkeeping for which attempt may mutate state
#[derive(Default)]
struct Control {
    generation: u64,
    active: Option<CancellationToken>,
    torn_down: bool,
}

enum Attempt<T> {
    Settled(std::result::Result<T, FetchError>),
    Cancelled,
}

impl<T> FetchHook<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a hook using the tokio timer.
    ///
    /// Must be called from within a tokio runtime; attempts are spawned on it.
    pub fn new(
        url: impl Into<String>,
        options: FetchOptions,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        Self::with_timer(url, options, client, Arc::new(TokioTimer))
    }

    /// Create a hook with an explicit timer capability
    pub fn with_timer(
        url: impl Into<String>,
        options: FetchOptions,
        client: Arc<dyn HttpClient>,
        timer: Arc<dyn Timer>,
    ) -> Result<Self> {
        let url = validate_url(url.into())?;
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        let initial = if options.immediate {
            RequestState::pending()
        } else {
            RequestState::default()
        };
        let (state, _) = watch::channel(initial);

        let hook = Self {
            inner: Arc::new(Inner {
                url: RwLock::new(url),
                options,
                client,
                timer,
                runtime,
                control: Mutex::new(Control::default()),
                state,
            }),
        };

        if options.immediate {
            hook.inner.launch();
        }

        Ok(hook)
    }

    /// Start a new attempt, superseding any attempt still in flight.
    ///
    /// The transition to `loading` happens before this returns. The returned
    /// [`Execution`] resolves once the attempt settled or was discarded;
    /// dropping it does not cancel the attempt.
    pub fn execute(&self) -> Execution {
        Execution {
            handle: self.inner.launch(),
        }
    }

    /// Return to the empty state. An in-flight attempt keeps running.
    pub fn reset(&self) {
        let _control = self.inner.control.lock();
        self.inner.state.send_replace(RequestState::default());
    }

    /// Point the hook at a different URL.
    ///
    /// With `immediate` set, a changed URL is fetched right away.
    pub fn set_url(&self, url: impl Into<String>) -> Result<()> {
        let url = validate_url(url.into())?;
        {
            let mut current = self.inner.url.write();
            if *current == url {
                return Ok(());
            }
            debug!("URL changed: {} -> {}", current, url);
            *current = url;
        }

        if self.inner.options.immediate {
            self.inner.launch();
        }
        Ok(())
    }
}

impl<T: Clone> FetchHook<T> {
    /// Snapshot of the current state
    pub fn state(&self) -> RequestState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn error(&self) -> Option<FetchError> {
        self.inner.state.borrow().error.clone()
    }

    pub fn phase(&self) -> RequestPhase {
        self.inner.state.borrow().phase()
    }

    pub fn url(&self) -> String {
        self.inner.url.read().clone()
    }

    pub fn options(&self) -> FetchOptions {
        self.inner.options
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.inner.state.subscribe()
    }
}

impl<T> Drop for FetchHook<T> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<T> Inner<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn launch(self: &Arc<Self>) -> JoinHandle<()> {
        let (generation, url, token) = self.begin();
        // The budget runs from here, not from when the task is first polled
        let deadline = self.timer.sleep(self.options.timeout());
        let inner = Arc::clone(self);

        self.runtime.spawn(async move {
            let attempt = AssertUnwindSafe(inner.attempt(&url, &token, deadline))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    warn!("Request {} to {} panicked", generation, url);
                    Attempt::Settled(Err(FetchError::Unknown))
                });
            inner.settle(generation, attempt);
        })
    }

    /// Mint a new generation for the current URL and move to `loading`
    fn begin(&self) -> (u64, String, CancellationToken) {
        let mut control = self.control.lock();
        let url = self.url.read().clone();
        if let Some(previous) = control.active.take() {
            debug!("Superseding request {}", control.generation);
            previous.cancel();
        }

        control.generation += 1;
        let token = CancellationToken::new();
        control.active = Some(token.clone());
        self.state.send_modify(RequestState::begin);

        (control.generation, url, token)
    }

    async fn attempt(
        &self,
        url: &str,
        token: &CancellationToken,
        deadline: BoxFuture<'static, ()>,
    ) -> Attempt<T> {
        // Superseded before the task got to run
        if token.is_cancelled() {
            return Attempt::Cancelled;
        }

        let timeout = self.options.timeout();
        debug!("GET {} (timeout {:?})", url, timeout);

        let response = tokio::select! {
            // A due timer wins over a response that is ready in the same poll
            biased;
            _ = deadline => {
                token.cancel();
                warn!("Request to {} timed out after {:?}", url, timeout);
                return Attempt::Settled(Err(FetchError::Timeout));
            }
            _ = token.cancelled() => return Attempt::Cancelled,
            response = self.client.get(url, token) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(TransportError::Aborted) if token.is_cancelled() => return Attempt::Cancelled,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                return Attempt::Settled(Err(FetchError::network(e)));
            }
        };

        if !response.is_ok() {
            warn!("Request to {} returned HTTP {}", url, response.status);
            return Attempt::Settled(Err(FetchError::Http {
                status: response.status,
            }));
        }

        Attempt::Settled(response.json::<T>().map_err(|e| {
            warn!("Failed to decode response from {}: {}", url, e);
            FetchError::decode(e)
        }))
    }

    fn settle(&self, generation: u64, attempt: Attempt<T>) {
        let mut control = self.control.lock();
        if control.torn_down {
            trace!("Discarding request {} settled after teardown", generation);
            return;
        }
        if control.generation != generation {
            trace!(
                "Discarding request {} superseded by {}",
                generation,
                control.generation
            );
            return;
        }

        control.active = None;
        match attempt {
            Attempt::Settled(Ok(data)) => {
                debug!("Request {} succeeded", generation);
                self.state.send_modify(|state| state.succeed(data));
            }
            Attempt::Settled(Err(error)) => {
                debug!("Request {} failed: {}", generation, error);
                self.state.send_modify(|state| state.fail(error));
            }
            Attempt::Cancelled => {
                // Current token cancelled without supersession or teardown
                self.state.send_modify(|state| state.loading = false);
            }
        }
    }
}

impl<T> Inner<T> {
    fn teardown(&self) {
        let mut control = self.control.lock();
        control.torn_down = true;
        if let Some(token) = control.active.take() {
            debug!("Cancelling request {} on teardown", control.generation);
            token.cancel();
        }
    }
}

/// Completion of one [`FetchHook::execute`] call
pub struct Execution {
    handle: JoinHandle<()>,
}

impl Future for Execution {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(()),
            Poll::Ready(Err(e)) => {
                error!("Fetch task failed: {}", e);
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn validate_url(url: String) -> Result<String> {
    if url.trim().is_empty() {
        return Err(Error::InvalidConfig("url is required".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedClient};
    use futures::future::BoxFuture;
    use serde_json::{json, Value};

    const URL: &str = "https://api.example.com/data";

    async fn settled(hook: &FetchHook<Value>) -> RequestState<Value> {
        let mut rx = hook.subscribe();
        let state = rx.wait_for(|s| !s.loading).await.unwrap();
        (*state).clone()
    }

    /// Timer whose deadline has always already passed
    struct ElapsedTimer;

    impl Timer for ElapsedTimer {
        fn sleep(&self, _duration: Duration) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn test_manual_hook_starts_idle() {
        let client = ScriptedClient::new();
        client.always(Reply::ok(json!({"data": "test"})));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        assert_eq!(hook.state(), RequestState::default());
        assert_eq!(hook.phase(), RequestPhase::Idle);

        tokio::task::yield_now().await;
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_immediate_hook_fetches_once() {
        let data = json!({"id": 1, "name": "Test"});
        let client = ScriptedClient::new();
        client.always(Reply::ok(data.clone()));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client.clone()).unwrap();
        assert!(hook.loading());
        assert_eq!(hook.data(), None);
        assert_eq!(hook.error(), None);

        let state = settled(&hook).await;
        assert_eq!(state.data, Some(data));
        assert_eq!(state.error, None);

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, URL);
    }

    #[tokio::test]
    async fn test_manual_execute() {
        let client = ScriptedClient::new();
        client.always(Reply::ok(json!({"message": "Hello World"})));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        let execution = hook.execute();
        assert!(hook.loading());
        assert_eq!(hook.error(), None);

        execution.await;
        assert_eq!(
            hook.state(),
            RequestState {
                data: Some(json!({"message": "Hello World"})),
                loading: false,
                error: None,
            }
        );
        assert_eq!(hook.phase(), RequestPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_typed_payload() {
        #[derive(Debug, Clone, PartialEq, Deserialize)]
        struct Item {
            id: u32,
        }

        let client = ScriptedClient::new();
        client.always(Reply::ok(json!({"id": 1})));

        let hook = FetchHook::<Item>::new(URL, FetchOptions::manual(), client).unwrap();
        hook.execute().await;
        assert_eq!(hook.data(), Some(Item { id: 1 }));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let client = ScriptedClient::new();
        client.always(Reply::Status(404));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client).unwrap();
        let state = settled(&hook).await;

        assert_eq!(state.data, None);
        assert_eq!(state.error, Some(FetchError::Http { status: 404 }));
        assert_eq!(
            state.error.unwrap().to_string(),
            "HTTP error! status: 404"
        );
    }

    #[tokio::test]
    async fn test_network_error() {
        let client = ScriptedClient::new();
        client.always(Reply::NetworkError("Network error".to_string()));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client).unwrap();
        let state = settled(&hook).await;

        assert_eq!(state.data, None);
        assert_eq!(state.error, Some(FetchError::network("Network error")));
    }

    #[tokio::test]
    async fn test_decode_error() {
        let client = ScriptedClient::new();
        client.always(Reply::Body {
            status: 200,
            body: "not json".into(),
        });

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client).unwrap();
        let state = settled(&hook).await;

        assert_eq!(state.data, None);
        assert!(matches!(state.error, Some(FetchError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_panicking_transport_is_unknown_error() {
        let client = ScriptedClient::new();
        client.always(Reply::Panic("string error".to_string()));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client).unwrap();
        let state = settled(&hook).await;

        assert_eq!(state.error, Some(FetchError::Unknown));
        assert_eq!(state.error.unwrap().to_string(), "Unknown error occurred");
    }

    #[tokio::test]
    async fn test_error_keeps_previous_data() {
        let client = ScriptedClient::new();
        client
            .once(Reply::ok(json!({"id": 1})))
            .once(Reply::Status(500));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client).unwrap();
        hook.execute().await;
        hook.execute().await;

        assert_eq!(hook.data(), Some(json!({"id": 1})));
        assert_eq!(hook.error(), Some(FetchError::Http { status: 500 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_request() {
        let client = ScriptedClient::new();
        client.always(Reply::Hang);

        let options = FetchOptions::default().with_timeout_ms(1000);
        let hook = FetchHook::<Value>::new(URL, options, client.clone()).unwrap();
        client.wait_for_calls(1).await;

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(hook.loading());

        tokio::time::advance(Duration::from_millis(1)).await;
        let state = settled(&hook).await;

        assert!(!state.loading);
        assert_eq!(state.error, Some(FetchError::Timeout));
        assert!(client.calls()[0].token.is_cancelled());
    }

    #[tokio::test]
    async fn test_timeout_wins_over_ready_response() {
        let client = ScriptedClient::new();
        client.always(Reply::ok(json!({"late": true})));

        let hook = FetchHook::<Value>::with_timer(
            URL,
            FetchOptions::manual(),
            client,
            Arc::new(ElapsedTimer),
        )
        .unwrap();
        hook.execute().await;

        assert_eq!(hook.data(), None);
        assert_eq!(hook.error(), Some(FetchError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_budget_starts_at_construction() {
        let client = ScriptedClient::new();
        client.always(Reply::Hang);
        let start = tokio::time::Instant::now();

        let options = FetchOptions::default().with_timeout_ms(1000);
        let hook = FetchHook::<Value>::new(URL, options, client).unwrap();
        assert_eq!(hook.state(), RequestState::pending());

        tokio::time::advance(Duration::from_millis(1000)).await;
        let state = settled(&hook).await;

        assert_eq!(state.error, Some(FetchError::Timeout));
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_budget_starts_at_execute() {
        let client = ScriptedClient::new();
        client.always(Reply::Hang);

        let options = FetchOptions::manual().with_timeout_ms(1000);
        let hook = FetchHook::<Value>::new(URL, options, client.clone()).unwrap();
        let start = tokio::time::Instant::now();
        let execution = hook.execute();

        // Time passes before the attempt gets to reach the transport
        tokio::time::advance(Duration::from_millis(400)).await;
        client.wait_for_calls(1).await;
        tokio::time::advance(Duration::from_millis(600)).await;
        execution.await;

        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert!(!hook.loading());
        assert_eq!(hook.error(), Some(FetchError::Timeout));
        assert!(client.calls()[0].token.is_cancelled());
    }

    #[tokio::test]
    async fn test_foreign_cancellation_only_ends_loading() {
        let client = ScriptedClient::new();
        client.once(Reply::ok(json!({"id": 1}))).always(Reply::Hang);

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        hook.execute().await;

        let execution = hook.execute();
        client.wait_for_calls(2).await;
        client.calls()[1].token.cancel();
        execution.await;

        assert_eq!(
            hook.state(),
            RequestState {
                data: Some(json!({"id": 1})),
                loading: false,
                error: None,
            }
        );
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_latest_generation_uses_latest_url() {
        let client = ScriptedClient::new();
        client.always(Reply::Hang);

        let hook = FetchHook::<Value>::new(
            "https://api.example.com/data/start",
            FetchOptions::default(),
            client.clone(),
        )
        .unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..200 {
                    hook.set_url(format!("https://api.example.com/data/{}", i))
                        .unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    drop(hook.execute());
                }
            });
        });

        let active = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let live = client
                    .calls()
                    .into_iter()
                    .find(|call| !call.token.is_cancelled());
                match live {
                    Some(call) => return call,
                    None => tokio::time::sleep(Duration::from_millis(1)).await,
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(active.url, hook.url());
        assert_eq!(active.url, "https://api.example.com/data/199");
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_request_clears_timeout() {
        let data = json!({"data": "quick response"});
        let client = ScriptedClient::new();
        client.always(Reply::ok(data.clone()));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client).unwrap();
        settled(&hook).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(hook.data(), Some(data));
        assert_eq!(hook.error(), None);
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older() {
        let client = ScriptedClient::new();
        client.always(Reply::Deferred);

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        let first = hook.execute();
        client.wait_for_calls(1).await;
        let second = hook.execute();
        client.wait_for_calls(2).await;

        let calls = client.calls();
        assert!(calls[0].token.is_cancelled());
        assert!(!calls[1].token.is_cancelled());

        client.resolve(1, Reply::ok(json!({"id": "B"})));
        second.await;
        client.resolve(0, Reply::ok(json!({"id": "A"})));
        first.await;

        assert_eq!(hook.data(), Some(json!({"id": "B"})));
        assert_eq!(hook.error(), None);
        assert!(!hook.loading());
    }

    #[tokio::test]
    async fn test_stale_resolution_is_never_visible() {
        let client = ScriptedClient::new();
        client.always(Reply::Deferred);

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        let first = hook.execute();
        client.wait_for_calls(1).await;
        let second = hook.execute();
        client.wait_for_calls(2).await;

        client.resolve(0, Reply::ok(json!({"id": "A"})));
        first.await;
        assert_eq!(hook.data(), None);
        assert!(hook.loading());

        client.resolve(1, Reply::Status(503));
        second.await;
        assert_eq!(hook.data(), None);
        assert_eq!(hook.error(), Some(FetchError::Http { status: 503 }));
    }

    #[tokio::test]
    async fn test_superseded_settlement_is_discarded() {
        let client = ScriptedClient::new();
        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client).unwrap();

        let (stale, _, stale_token) = hook.inner.begin();
        let (current, _, _token) = hook.inner.begin();
        assert!(stale_token.is_cancelled());

        // A transport that ignored cancellation still delivers its result
        hook.inner
            .settle(stale, Attempt::Settled(Ok(json!("A"))));
        assert_eq!(hook.data(), None);
        assert!(hook.loading());

        hook.inner
            .settle(current, Attempt::Settled(Ok(json!("B"))));
        assert_eq!(hook.data(), Some(json!("B")));
        assert!(!hook.loading());
    }

    #[tokio::test]
    async fn test_rapid_executes_reach_transport_once() {
        let client = ScriptedClient::new();
        client.always(Reply::ok(json!({"data": "final result"})));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        let executions = vec![hook.execute(), hook.execute(), hook.execute()];
        futures::future::join_all(executions).await;

        assert!(!hook.loading());
        assert_eq!(hook.data(), Some(json!({"data": "final result"})));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_after_success_and_error() {
        let client = ScriptedClient::new();
        client
            .once(Reply::ok(json!({"data": "test"})))
            .once(Reply::Status(500));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client).unwrap();

        hook.execute().await;
        assert!(hook.data().is_some());
        hook.reset();
        assert_eq!(hook.state(), RequestState::default());

        hook.execute().await;
        assert!(hook.error().is_some());
        hook.reset();
        assert_eq!(hook.state(), RequestState::default());
    }

    #[tokio::test]
    async fn test_reset_does_not_cancel_in_flight_request() {
        let client = ScriptedClient::new();
        client.always(Reply::Deferred);

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        let execution = hook.execute();
        client.wait_for_calls(1).await;

        hook.reset();
        assert_eq!(hook.state(), RequestState::default());
        assert!(!client.calls()[0].token.is_cancelled());

        client.resolve(0, Reply::ok(json!({"id": 1})));
        execution.await;
        assert_eq!(hook.data(), Some(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_drop_cancels_pending_request() {
        let client = ScriptedClient::new();
        client.always(Reply::Hang);

        let hook = FetchHook::<Value>::new(URL, FetchOptions::default(), client.clone()).unwrap();
        client.wait_for_calls(1).await;
        let token = client.calls()[0].token.clone();
        let rx = hook.subscribe();
        assert!(!token.is_cancelled());

        drop(hook);
        assert!(token.is_cancelled());

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        // Nothing settles into the state after teardown
        assert!(rx.borrow().loading);
        assert_eq!(rx.borrow().error, None);
    }

    #[tokio::test]
    async fn test_drop_without_pending_request() {
        let client = ScriptedClient::new();
        client.always(Reply::ok(json!(null)));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        drop(hook);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_not_retried() {
        let client = ScriptedClient::new();
        client.always(Reply::NetworkError("connection refused".to_string()));

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        hook.execute().await;
        assert!(hook.error().is_some());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_changed_url_refetches() {
        let client = ScriptedClient::new();
        client
            .once(Reply::ok(json!({"id": 1})))
            .once(Reply::ok(json!({"id": 2})));

        let hook = FetchHook::<Value>::new(
            "https://api.example.com/data/1",
            FetchOptions::default(),
            client.clone(),
        )
        .unwrap();
        assert_eq!(settled(&hook).await.data, Some(json!({"id": 1})));

        hook.set_url("https://api.example.com/data/2").unwrap();
        assert!(hook.loading());
        assert_eq!(settled(&hook).await.data, Some(json!({"id": 2})));

        hook.set_url("https://api.example.com/data/2").unwrap();
        assert!(!hook.loading());

        let urls: Vec<_> = client.calls().into_iter().map(|c| c.url).collect();
        assert_eq!(
            urls,
            vec!["https://api.example.com/data/1", "https://api.example.com/data/2"]
        );
    }

    #[tokio::test]
    async fn test_subscriber_sees_transitions() {
        let client = ScriptedClient::new();
        client.always(Reply::Deferred);

        let hook = FetchHook::<Value>::new(URL, FetchOptions::manual(), client.clone()).unwrap();
        let mut rx = hook.subscribe();

        let execution = hook.execute();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().phase(), RequestPhase::Pending);

        client.wait_for_calls(1).await;
        client.resolve(0, Reply::ok(json!([1, 2, 3])));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().phase(), RequestPhase::Succeeded);

        execution.await;
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let client = ScriptedClient::new();
        let result = FetchHook::<Value>::new("  ", FetchOptions::manual(), client);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_requires_runtime() {
        let client = ScriptedClient::new();
        let result = FetchHook::<Value>::new(URL, FetchOptions::manual(), client);
        assert!(matches!(result, Err(Error::Runtime(_))));
    }

    #[test]
    fn test_default_options() {
        let options = FetchOptions::default();
        assert!(options.immediate);
        assert_eq!(options.timeout(), Duration::from_millis(5000));

        let parsed: FetchOptions = serde_json::from_str(r#"{"timeout_ms": 1000}"#).unwrap();
        assert!(parsed.immediate);
        assert_eq!(parsed.timeout_ms, 1000);
    }
}
