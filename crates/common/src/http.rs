//! HTTP transport capability consumed by the fetch hook

use crate::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Fully received HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Cancellable GET transport.
///
/// Implementations must stop work promptly once `cancel` is signalled and
/// report that as [`TransportError::Aborted`], so an abort is
/// distinguishable from other failures.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] backed by reqwest
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, headers)
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };

        // Dropping the request future closes the connection
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!("Aborting GET {}", url);
                Err(TransportError::Aborted)
            }
            result = request => result.map_err(TransportError::from),
        }
    }
}
