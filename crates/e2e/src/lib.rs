//! Fetchkit E2E Test Framework
//!
//! Runs an in-process mock REST API so the fetch hook and the API client
//! can be exercised over real sockets.
//!
//! # Routes
//!
//! ```text
//! GET    /health              liveness probe
//! GET    /json/:id            {"id": id, "title": "item <id>"}
//! GET    /status/:code        empty body with the given status
//! GET    /slow/:ms            answers after sleeping `ms` milliseconds
//! GET    /invalid-json        200 with a body that is not JSON
//! GET    /flaky/:failures     503 for the first `failures` calls, then 200
//! GET    /private             401 unless "Authorization: Bearer <token>" matches
//! GET    /users[?q=]          list or search users
//! POST   /users               create a user
//! GET    /users/:id           fetch a user
//! PUT    /users/:id           patch a user
//! DELETE /users/:id           delete a user
//! ```

pub mod error;
pub mod server;

pub use error::{E2eError, E2eResult};
pub use server::{MockServer, ServerConfig};

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
