//! Request state observed by fetch hook callers

use crate::FetchError;
use serde::{Deserialize, Serialize};

/// Observable state of a single-URL request.
///
/// `data` and `error` describe the most recently completed attempt. Starting
/// a new attempt clears `error` but keeps `data` until the attempt resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> RequestState<T> {
    /// State of a hook that starts its first request immediately
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> RequestPhase {
        if self.loading {
            RequestPhase::Pending
        } else if self.error.is_some() {
            RequestPhase::Failed
        } else if self.data.is_some() {
            RequestPhase::Succeeded
        } else {
            RequestPhase::Idle
        }
    }

    /// True once the latest attempt has settled, successfully or not
    pub fn is_settled(&self) -> bool {
        matches!(self.phase(), RequestPhase::Succeeded | RequestPhase::Failed)
    }

    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub(crate) fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.loading = false;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, error: FetchError) {
        self.loading = false;
        self.error = Some(error);
    }
}

/// Coarse phase of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

impl Default for RequestPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestPhase::Idle => write!(f, "idle"),
            RequestPhase::Pending => write!(f, "pending"),
            RequestPhase::Succeeded => write!(f, "succeeded"),
            RequestPhase::Failed => write!(f, "failed"),
        }
    }
}
