// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a mock workforce backend and assertion helpers.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::credential::{CredentialPair, CredentialStore, MemoryStore};
use crate::session::SessionHook;

/// Assert that an expression is `Err` and its message contains a substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// How the mock refresh endpoint answers.
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Issue `token` (and optionally rotate the refresh token).
    Issue { token: String, refresh_token: Option<String> },
    /// Issue `token` without ever accepting it on resource routes.
    IssueRejected { token: String },
    /// Reply with a bare status code.
    Status(u16),
    /// Reply 200 with a body that lacks `token`.
    MissingToken,
    /// Never answer within any sane client timeout.
    Hang,
}

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Backend {
    valid_tokens: Mutex<HashSet<String>>,
    refresh: Mutex<Option<RefreshBehavior>>,
    refresh_delay: Mutex<Duration>,
    refresh_bodies: Mutex<Vec<Value>>,
    refresh_calls: AtomicU32,
    logout_status: Mutex<u16>,
    seen: Mutex<Vec<SeenRequest>>,
}

/// A mock workforce API bound to `127.0.0.1:0`.
///
/// Resource routes accept any bearer token in the valid set and answer 401
/// otherwise. Paths ending in `/page` answer with a paginated envelope and
/// paths ending in `/missing` with 404; everything else echoes the request. `/auth/refresh` answers per [`RefreshBehavior`] after an
/// optional delay; a successful refresh adds the issued token to the valid
/// set.
pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<Backend>,
}

impl MockBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(Backend::default());
        *state.logout_status.lock() = 200;

        let app = Router::new()
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/login", post(login))
            .route("/api/auth/logout", post(logout))
            .route("/api/users/me", get(me))
            .fallback(resource)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(Self { addr, state })
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn config(&self) -> Config {
        Config::test(self.api_url())
    }

    pub fn accept_token(&self, token: &str) {
        self.state.valid_tokens.lock().insert(token.to_owned());
    }

    /// Expire every token the backend currently accepts.
    pub fn expire_all(&self) {
        self.state.valid_tokens.lock().clear();
    }

    pub fn on_refresh(&self, behavior: RefreshBehavior) {
        *self.state.refresh.lock() = Some(behavior);
    }

    pub fn issue_on_refresh(&self, token: &str) {
        self.on_refresh(RefreshBehavior::Issue { token: token.to_owned(), refresh_token: None });
    }

    pub fn refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock() = delay;
    }

    pub fn logout_status(&self, status: u16) {
        *self.state.logout_status.lock() = status;
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_bodies(&self) -> Vec<Value> {
        self.state.refresh_bodies.lock().clone()
    }

    /// Requests seen on any route other than `/auth/refresh`.
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().clone()
    }

    pub fn seen_on(&self, path: &str) -> Vec<SeenRequest> {
        self.seen().into_iter().filter(|r| r.path == path).collect()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

async fn record(state: &Backend, req: Request) -> SeenRequest {
    let method = req.method().to_string();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().map(str::to_owned);
    let bearer = bearer(req.headers());
    let bytes = axum::body::to_bytes(req.into_body(), 1 << 20).await.unwrap_or_default();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let seen = SeenRequest { method, path, query, bearer, body };
    state.seen.lock().push(seen.clone());
    seen
}

fn is_valid(state: &Backend, token: Option<&str>) -> bool {
    token.is_some_and(|t| state.valid_tokens.lock().contains(t))
}

async fn resource(State(state): State<Arc<Backend>>, req: Request) -> Response {
    let seen = record(&state, req).await;
    if !is_valid(&state, seen.bearer.as_deref()) {
        return unauthorized();
    }
    if seen.path.ends_with("/page") {
        return Json(json!({
            "data": [{ "query": seen.query }],
            "total": 3,
            "page": 1,
            "limit": 1,
            "totalPages": 3
        }))
        .into_response();
    }
    if seen.path.ends_with("/missing") {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response();
    }
    Json(json!({
        "method": seen.method,
        "path": seen.path,
        "query": seen.query,
        "token": seen.bearer,
        "body": seen.body,
    }))
    .into_response()
}

async fn refresh(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    state.refresh_bodies.lock().push(body);

    let delay = *state.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let behavior = state.refresh.lock().clone();
    match behavior {
        Some(RefreshBehavior::Issue { token, refresh_token }) => {
            state.valid_tokens.lock().insert(token.clone());
            let mut body = json!({ "message": "Token refreshed", "token": token });
            if let Some(rt) = refresh_token {
                body["refreshToken"] = Value::String(rt);
            }
            Json(body).into_response()
        }
        Some(RefreshBehavior::IssueRejected { token }) => {
            Json(json!({ "token": token })).into_response()
        }
        Some(RefreshBehavior::Status(code)) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
        Some(RefreshBehavior::MissingToken) => {
            Json(json!({ "message": "Token refreshed" })).into_response()
        }
        Some(RefreshBehavior::Hang) => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        None => unauthorized(),
    }
}

pub fn sample_user() -> Value {
    json!({
        "id": "u-1",
        "email": "ada@example.com",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "role": "ADMIN",
        "department": { "id": "d-1", "name": "Engineering" },
        "position": { "id": "p-1", "title": "Lead" }
    })
}

async fn login(State(state): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    state.seen.lock().push(SeenRequest {
        method: "POST".into(),
        path: "/api/auth/login".into(),
        query: None,
        bearer: None,
        body: body.clone(),
    });
    if body["email"] != "ada@example.com" || body["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid credentials" })))
            .into_response();
    }
    state.valid_tokens.lock().insert("login-access".into());
    Json(json!({
        "message": "Login successful",
        "user": sample_user(),
        "token": "login-access",
        "refreshToken": "login-refresh"
    }))
    .into_response()
}

async fn logout(State(state): State<Arc<Backend>>, req: Request) -> Response {
    record(&state, req).await;
    let status = *state.logout_status.lock();
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({ "message": "Logged out" })),
    )
        .into_response()
}

async fn me(State(state): State<Arc<Backend>>, req: Request) -> Response {
    let seen = record(&state, req).await;
    if !is_valid(&state, seen.bearer.as_deref()) {
        return unauthorized();
    }
    Json(json!({ "message": "ok", "data": sample_user() })).into_response()
}

/// Session hook test double that counts notifications and, like the real
/// hook, clears the store on invalidation.
pub struct CountingHook {
    store: Arc<dyn CredentialStore>,
    pub invalidations: AtomicU32,
    pub refreshes: AtomicU32,
}

impl CountingHook {
    pub fn new(store: Arc<dyn CredentialStore>) -> Arc<Self> {
        Arc::new(Self { store, invalidations: AtomicU32::new(0), refreshes: AtomicU32::new(0) })
    }

    pub fn invalidations(&self) -> u32 {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl SessionHook for CountingHook {
    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.store.clear();
    }

    fn refreshed(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store pre-seeded with an access token and an optional refresh token.
pub fn seeded_store(access: &str, refresh: Option<&str>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_pair(CredentialPair::new(access, refresh.map(str::to_owned))))
}
