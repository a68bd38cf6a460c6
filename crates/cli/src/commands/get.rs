//! Get Command
//!
//! Drives a fetch hook against a single URL and prints the settled state.

use anyhow::Result;
use clap::Args;
use fetchkit_common::{FetchHook, FetchOptions, ReqwestClient, RequestPhase, RequestState};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::output::{print_item, truncate, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct GetArgs {
    /// URL to fetch
    pub url: String,

    /// Timeout in milliseconds (defaults to the configured value)
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,
}

/// Request state display wrapper for serialization
#[derive(Serialize)]
pub struct StateDisplay {
    pub url: String,
    pub phase: RequestPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: Option<Value>,
}

impl StateDisplay {
    fn new(url: &str, state: RequestState<Value>) -> Self {
        Self {
            url: url.to_string(),
            phase: state.phase(),
            error: state.error.map(|e| e.to_string()),
            data: state.data,
        }
    }
}

impl TableDisplay for StateDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["URL", "Phase", "Error", "Data"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            self.phase.to_string(),
            self.error.clone().unwrap_or_default(),
            self.data
                .as_ref()
                .map(|d| truncate(&d.to_string(), 60))
                .unwrap_or_default(),
        ]
    }
}

pub async fn execute(args: GetArgs, defaults: FetchOptions, format: OutputFormat) -> Result<()> {
    let options = FetchOptions {
        immediate: true,
        timeout_ms: args.timeout_ms.unwrap_or(defaults.timeout_ms),
    };
    let hook = FetchHook::<Value>::new(&args.url, options, Arc::new(ReqwestClient::new()))?;
    let mut changes = hook.subscribe();

    tokio::select! {
        settled = changes.wait_for(|state| !state.loading) => {
            settled?;
        }
        _ = tokio::signal::ctrl_c() => {
            // Dropping the hook on return cancels the request
            info!("Interrupted, cancelling request to {}", args.url);
            anyhow::bail!("Request to {} cancelled", args.url);
        }
    }

    let state = hook.state();
    let failure = state.error.clone();
    print_item(&StateDisplay::new(&args.url, state), format);

    match failure {
        Some(error) => anyhow::bail!("GET {} failed: {}", args.url, error),
        None => Ok(()),
    }
}
