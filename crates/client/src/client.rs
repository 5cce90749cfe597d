// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher: attaches the session credential to every request and
//! routes authorization failures through the [`RefreshCoordinator`].

use std::sync::{Arc, Once};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::coordinator::RefreshCoordinator;
use crate::credential::CredentialStore;
use crate::error::ClientError;
use crate::model::{PageQuery, PaginatedResponse};
use crate::session::SessionHook;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Descriptor of one API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/employees`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Send without a credential and report 401 as an ordinary status error.
    pub public: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            public: false,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Mark the request as already replayed: a 401 will not trigger a refresh.
    pub fn mark_retried(mut self) -> Self {
        self.retried = true;
        self
    }

    pub fn retried(&self) -> bool {
        self.retried
    }
}

/// A 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Body as JSON, `Null` when empty.
    pub fn value(&self) -> Result<serde_json::Value, ClientError> {
        if self.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        self.json()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Authenticated HTTP client for the workforce API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Build a client and its refresh coordinator for one session.
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        hook: Arc<dyn SessionHook>,
    ) -> Result<Self, ClientError> {
        ensure_crypto();
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let coordinator =
            RefreshCoordinator::new(http.clone(), config.refresh_url(), Arc::clone(&store), hook);
        Ok(Self::with_parts(http, config.base_url().to_owned(), store, coordinator))
    }

    /// Assemble a client from an existing coordinator.
    pub fn with_parts(
        http: reqwest::Client,
        base_url: String,
        store: Arc<dyn CredentialStore>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self { http, base_url, store, coordinator }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a request, transparently refreshing the credential once on 401.
    ///
    /// Returns the 2xx response, or an error for any other outcome.
    pub async fn send(&self, mut req: ApiRequest) -> Result<ApiResponse, ClientError> {
        let mut replay_with: Option<String> = None;
        loop {
            let token = match replay_with.take() {
                Some(t) => Some(t),
                None if req.public => None,
                None => self.store.access_token(),
            };
            let resp = self.dispatch(&req, token.as_deref()).await?;
            if resp.status() != StatusCode::UNAUTHORIZED || req.public {
                return finish(&req, resp).await;
            }
            if req.retried {
                tracing::debug!(method = %req.method, path = %req.path, "401 after retry, giving up");
                return Err(ClientError::Unauthorized {
                    method: req.method.to_string(),
                    path: req.path.clone(),
                });
            }
            req.retried = true;
            tracing::debug!(method = %req.method, path = %req.path, "401, recovering credential");
            replay_with = Some(self.coordinator.recover(token).await?);
        }
    }

    async fn dispatch(
        &self,
        req: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut url = reqwest::Url::parse(&self.url(&req.path))
            .map_err(|e| ClientError::InvalidRequest(format!("{}: {e}", req.path)))?;
        if !req.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&req.query);
        }
        let mut builder = self.http.request(req.method.clone(), url);
        for (name, value) in &req.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| ClientError::InvalidRequest(format!("header {name}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| ClientError::InvalidRequest(format!("header value: {e}")))?;
            builder = builder.header(name, value);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder.send().await.map_err(|e| ClientError::transport(&e))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// Fetch one page of a list endpoint.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: &PageQuery,
    ) -> Result<PaginatedResponse<T>, ClientError> {
        self.send(ApiRequest::get(path).query_pairs(page.to_pairs())).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::patch(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.send(ApiRequest::delete(path)).await
    }
}

/// Read the body and map non-2xx statuses to [`ClientError::Status`].
async fn finish(req: &ApiRequest, resp: reqwest::Response) -> Result<ApiResponse, ClientError> {
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.bytes().await.map_err(|e| ClientError::transport(&e))?.to_vec();
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            method: req.method.to_string(),
            path: req.path.clone(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(ApiResponse { status: status.as_u16(), headers, body })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
