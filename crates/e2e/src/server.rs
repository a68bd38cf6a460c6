//! Mock API server - in-process axum server with request recording

use axum::{
    extract::{Path, Query, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use fetchkit_common::{NewUser, User, UserPatch};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Configuration for spawning the mock API
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (0 = ephemeral)
    pub port: u16,

    /// Bearer token accepted by `/private`
    pub valid_token: String,

    /// Start with the three sample users
    pub seed_users: bool,

    /// Timeout for server startup
    pub startup_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            valid_token: "valid-token".to_string(),
            seed_users: true,
            startup_timeout: Duration::from_secs(5),
        }
    }
}

struct Store {
    users: BTreeMap<u64, User>,
    next_id: u64,
}

impl Store {
    fn new(seed: bool) -> Self {
        let mut users = BTreeMap::new();
        if seed {
            for (id, name, email) in [
                (1, "Leanne Graham", "sincere@april.biz"),
                (2, "Ervin Howell", "shanna@melissa.tv"),
                (3, "Clementine Bauch", "nathan@yesenia.net"),
            ] {
                users.insert(
                    id,
                    User {
                        id,
                        name: name.to_string(),
                        email: email.to_string(),
                        avatar: None,
                        is_active: Some(true),
                    },
                );
            }
        }
        let next_id = users.keys().max().copied().unwrap_or(0) + 1;
        Self { users, next_id }
    }
}

#[derive(Default)]
struct Recorder {
    hits: HashMap<String, usize>,
    authorization: Vec<Option<String>>,
}

struct ServerState {
    config: ServerConfig,
    store: Mutex<Store>,
    recorder: Mutex<Recorder>,
    flaky: Mutex<HashMap<u32, u32>>,
}

/// Handle to a running mock API; stops the server when dropped
pub struct MockServer {
    base_url: String,
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Start a server with the default configuration
    pub async fn start() -> E2eResult<Self> {
        Self::spawn(ServerConfig::default()).await
    }

    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port))
            .await
            .map_err(|e| {
                E2eError::ServerStartup(format!("Failed to bind port {}: {}", config.port, e))
            })?;
        let addr = listener.local_addr()?;
        let base_url = format!("http://{}", addr);
        let startup_timeout = config.startup_timeout;

        let state = Arc::new(ServerState {
            store: Mutex::new(Store::new(config.seed_users)),
            recorder: Mutex::new(Recorder::default()),
            flaky: Mutex::new(HashMap::new()),
            config,
        });
        let app = router(state.clone());

        info!("Starting mock API on {}", base_url);

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!("Mock API stopped with error: {}", e);
            }
        });

        let server = Self {
            base_url,
            addr,
            state,
            shutdown: Some(tx),
        };
        server.wait_for_healthy(startup_timeout).await?;
        Ok(server)
    }

    /// Wait for the server to respond to health checks
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        let health_url = self.url("/health");

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("Health check returned {}", resp.status()),
                Err(e) if !e.is_connect() => warn!("Health check error: {}", e),
                Err(_) => {}
            }

            sleep(Duration::from_millis(50)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Requests received for exactly `path` (query string excluded)
    pub fn hits(&self, path: &str) -> usize {
        self.state
            .recorder
            .lock()
            .hits
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// `Authorization` header of every request, in arrival order
    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.state.recorder.lock().authorization.clone()
    }

    pub fn user_count(&self) -> usize {
        self.state.store.lock().users.len()
    }

    /// Stop accepting connections
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            info!("Stopping mock API on {}", self.base_url);
            let _ = tx.send(());
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/json/:id", get(json_item))
        .route("/status/:code", get(status))
        .route("/slow/:ms", get(slow))
        .route("/invalid-json", get(invalid_json))
        .route("/flaky/:failures", get(flaky))
        .route("/private", get(private))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    debug!("{} {}", request.method(), path);

    {
        let mut recorder = state.recorder.lock();
        *recorder.hits.entry(path).or_default() += 1;
        recorder.authorization.push(authorization);
    }

    next.run(request).await
}

async fn health() -> &'static str {
    "ok"
}

async fn json_item(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({ "id": id, "title": format!("item {}", id) }))
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    sleep(Duration::from_millis(ms)).await;
    Json(json!({ "slept_ms": ms }))
}

async fn invalid_json() -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/json")], "{not json")
}

async fn flaky(State(state): State<Arc<ServerState>>, Path(failures): Path<u32>) -> Response {
    let attempt = {
        let mut counters = state.flaky.lock();
        let counter = counters.entry(failures).or_default();
        *counter += 1;
        *counter
    };

    if attempt <= failures {
        (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response()
    } else {
        Json(json!({ "attempts": attempt })).into_response()
    }
}

async fn private(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let expected = format!("Bearer {}", state.config.valid_token);
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Json(json!({ "secret": "granted" })).into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn list_users(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<User>> {
    let needle = params.q.map(|q| q.to_lowercase());
    let store = state.store.lock();
    let users = store
        .users
        .values()
        .filter(|user| match &needle {
            Some(needle) => {
                user.name.to_lowercase().contains(needle)
                    || user.email.to_lowercase().contains(needle)
            }
            None => true,
        })
        .cloned()
        .collect();
    Json(users)
}

async fn create_user(
    State(state): State<Arc<ServerState>>,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), StatusCode> {
    if new_user.name.trim().is_empty() || !new_user.email.contains('@') {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let mut store = state.store.lock();
    let id = store.next_id;
    store.next_id += 1;

    let user = User {
        id,
        name: new_user.name,
        email: new_user.email,
        avatar: new_user.avatar,
        is_active: new_user.is_active,
    };
    store.users.insert(id, user.clone());
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> Result<Json<User>, StatusCode> {
    state
        .store
        .lock()
        .users
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_user(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, StatusCode> {
    let mut store = state.store.lock();
    let user = store.users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;

    if let Some(name) = patch.name {
        user.name = name;
    }
    if let Some(email) = patch.email {
        user.email = email;
    }
    if let Some(avatar) = patch.avatar {
        user.avatar = Some(avatar);
    }
    if let Some(is_active) = patch.is_active {
        user.is_active = Some(is_active);
    }

    Ok(Json(user.clone()))
}

async fn delete_user(State(state): State<Arc<ServerState>>, Path(id): Path<u64>) -> StatusCode {
    match state.store.lock().users.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}
