//! REST API client and user service

use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::{Error, Result};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// API client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    pub base_url: String,

    /// Per-request timeout
    pub timeout_ms: u64,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jsonplaceholder.typicode.com".to_string(),
            timeout_ms: 5000,
            auth_token: None,
        }
    }
}

/// JSON REST client.
///
/// A `401 Unauthorized` answer drops the stored auth token.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("base_url is required".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: RwLock::new(config.auth_token.clone()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path`
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.read().clone()
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write() = token;
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.send(self.client.get(self.url(path)).query(query)).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.client.post(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.client.put(self.url(path)).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.client.delete(self.url(path))).await?;
        Ok(())
    }

    /// GET `path`, with failures reported against the full URL
    pub async fn fetch_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json(path).await.map_err(|e| {
            Error::api(format!("Failed to fetch data from {}", self.url(path)), &e)
        })
    }

    /// [`fetch_data`](Self::fetch_data) under a retry policy
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        policy: &RetryPolicy,
    ) -> Result<T> {
        fetch_with_retry(policy, |_| self.fetch_data(path)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.auth_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        debug!("{} {}", response.status(), response.url());

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Unauthorized response from {}; clearing auth token", response.url());
            self.set_auth_token(None);
        }

        response.error_for_status().map_err(Error::from)
    }
}

/// A user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Fields for creating a user; the server assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Partial update of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// User endpoints of the REST API
pub struct UserService<'a> {
    api: &'a ApiClient,
}

impl<'a> UserService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        self.api
            .get_json("/users")
            .await
            .map_err(|e| Error::api("Failed to fetch users", &e))
    }

    pub async fn get_user_by_id(&self, id: u64) -> Result<User> {
        self.api
            .get_json(&format!("/users/{}", id))
            .await
            .map_err(|e| Error::api(format!("Failed to fetch user with id {}", id), &e))
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.api
            .post_json("/users", user)
            .await
            .map_err(|e| Error::api("Failed to create user", &e))
    }

    pub async fn update_user(&self, id: u64, patch: &UserPatch) -> Result<User> {
        self.api
            .put_json(&format!("/users/{}", id), patch)
            .await
            .map_err(|e| Error::api(format!("Failed to update user with id {}", id), &e))
    }

    pub async fn delete_user(&self, id: u64) -> Result<()> {
        self.api
            .delete(&format!("/users/{}", id))
            .await
            .map_err(|e| Error::api(format!("Failed to delete user with id {}", id), &e))
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        self.api
            .get_json_with_query("/users", &[("q", query)])
            .await
            .map_err(|e| Error::api("Failed to search users", &e))
    }
}
