//! Fetchkit Common Library
//!
//! Request state, the cancellable fetch hook, its HTTP and timer
//! capabilities, retry composition and the REST API client.

pub mod api;
pub mod error;
pub mod hook;
pub mod http;
pub mod retry;
pub mod state;
pub mod timer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use api::{ApiClient, ApiConfig, NewUser, User, UserPatch, UserService};
pub use error::{Error, FetchError, Result, TransportError};
pub use hook::{Execution, FetchHook, FetchOptions};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use state::{RequestPhase, RequestState};
pub use timer::{Timer, TokioTimer};

pub use tokio_util::sync::CancellationToken;

/// Fetchkit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration directory
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".fetchkit")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
