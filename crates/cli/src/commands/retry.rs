//! Retry Command

use anyhow::Result;
use clap::Args;
use fetchkit_common::{ApiClient, RetryPolicy};
use serde_json::Value;

use crate::output::{print_value, OutputFormat};

#[derive(Args)]
pub struct RetryArgs {
    /// Path relative to the API base URL, or an absolute URL
    pub path: String,

    /// Retries after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay before the first retry in milliseconds, doubled per retry
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

impl RetryArgs {
    fn policy(&self, defaults: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay_ms: self.delay_ms.unwrap_or(defaults.initial_delay_ms),
        }
    }
}

pub async fn execute(
    args: RetryArgs,
    api: ApiClient,
    defaults: RetryPolicy,
    format: OutputFormat,
) -> Result<()> {
    let policy = args.policy(defaults);
    let value: Value = api.fetch_with_retry(&args.path, &policy).await?;
    print_value(&value, format);
    Ok(())
}
