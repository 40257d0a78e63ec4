//! The `ApiExecutor` trait — the core abstraction over the controller's REST API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single API request: method, controller-relative path, optional JSON body.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }
}

/// The central async trait every API executor must implement.
///
/// Executors own transport, auth and any transport-level retry; callers get
/// back decoded JSON or a structured error, nothing in between.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn ApiExecutor>`;
/// the typed convenience methods live on `dyn ApiExecutor` itself.
#[async_trait]
pub trait ApiExecutor: Send + Sync + 'static {
    /// Execute a single request and return the decoded response body.
    ///
    /// Bodyless responses (e.g. 204 on DELETE) decode to `Value::Null`.
    /// The cancellation token must abort an in-flight request promptly.
    async fn call(&self, req: ApiRequest, cancel: &CancellationToken) -> Result<Value, ApiError>;
}

impl dyn ApiExecutor {
    /// Convenience: GET a path and deserialize the response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let value = self
            .call(ApiRequest::new(HttpMethod::Get, path, None), cancel)
            .await?;
        serde_json::from_value(value).map_err(ApiError::Deserialization)
    }

    /// Convenience: POST a body and deserialize the response.
    pub async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError>
    where
        B: Serialize + Send + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let value = self
            .call(ApiRequest::new(HttpMethod::Post, path, Some(body)), cancel)
            .await?;
        serde_json::from_value(value).map_err(ApiError::Deserialization)
    }

    /// Convenience: PUT a body, discarding any response payload.
    pub async fn put<B: Serialize + Send + Sync>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(body)?;
        self.call(ApiRequest::new(HttpMethod::Put, path, Some(body)), cancel)
            .await?;
        Ok(())
    }

    /// Convenience: DELETE a path, discarding any response payload.
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.call(ApiRequest::new(HttpMethod::Delete, path, None), cancel)
            .await?;
        Ok(())
    }
}
