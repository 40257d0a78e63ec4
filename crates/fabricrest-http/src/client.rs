//! HTTP API executor backed by `reqwest`.
//!
//! One executor per controller. It owns transport and auth only: no retry,
//! no response caching — callers see either decoded JSON or a structured
//! error, with controller-side failures passed through unmodified.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use fabricrest_core::error::ApiError;
use fabricrest_core::executor::{ApiExecutor, ApiRequest, HttpMethod};

/// Configuration for `HttpApiExecutor`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
    /// Session token sent as the `AuthToken` header on every request.
    pub auth_token: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }
}

/// HTTP executor for a single controller.
pub struct HttpApiExecutor {
    base_url: String,
    http: reqwest::Client,
    auth_token: Option<String>,
}

impl HttpApiExecutor {
    /// Create a new executor for the given controller base URL.
    pub fn new(base_url: impl Into<String>, config: HttpClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build reqwest client");

        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            auth_token: config.auth_token,
        }
    }

    /// Create with default configuration.
    pub fn default_for(base_url: impl Into<String>) -> Self {
        Self::new(base_url, HttpClientConfig::default())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_once(&self, req: &ApiRequest) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, req.path);
        let mut builder = match req.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Put => self.http.put(&url),
            HttpMethod::Patch => self.http.patch(&url),
            HttpMethod::Delete => self.http.delete(&url),
        };
        if let Some(token) = &self.auth_token {
            builder = builder.header("AuthToken", token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        // Bodyless success (e.g. 204 on DELETE) decodes to null.
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(ApiError::Deserialization)
    }
}

#[async_trait]
impl ApiExecutor for HttpApiExecutor {
    async fn call(&self, req: ApiRequest, cancel: &CancellationToken) -> Result<Value, ApiError> {
        tracing::debug!(method = %req.method, path = %req.path, "api call");
        tokio::select! {
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.send_once(&req) => result,
        }
    }
}
