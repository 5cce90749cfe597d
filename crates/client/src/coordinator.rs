// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh coordinator: turns authorization failures into at most one
//! concurrent credential refresh.
//!
//! The first request to observe a 401 while the coordinator is idle starts a
//! refresh episode. Requests that fail while the episode is running queue
//! behind it and are released in FIFO order once it settles: with the new
//! access credential on success, or with the refresh error on failure. A
//! failed episode notifies the [`SessionHook`] exactly once.
//!
//! The refresh itself runs on a spawned task, so a caller that stops waiting
//! cannot leave the coordinator stuck in the refreshing state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::credential::refresh::do_refresh;
use crate::credential::{CredentialPair, CredentialStore};
use crate::error::ClientError;
use crate::session::SessionHook;

/// Outcome of a refresh episode as seen by each waiting request: the access
/// credential to replay with, or the error to fail with.
pub type RefreshOutcome = Result<String, ClientError>;

/// Continuation for a request parked behind an in-flight refresh.
type Waiter = oneshot::Sender<RefreshOutcome>;

enum Phase {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

/// Externally visible coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

struct Inner {
    phase: Phase,
    /// Access credential of the most recently invalidated session and the
    /// error it ended with. Late 401s for that credential fail with the same
    /// error instead of opening a new episode.
    invalidated: Option<(Option<String>, ClientError)>,
}

struct Shared {
    inner: Mutex<Inner>,
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    hook: Arc<dyn SessionHook>,
    episodes: AtomicU64,
    refresh_calls: AtomicU64,
}

/// Arbitrates credential refreshes for one session. Cheap to clone; clones
/// share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        refresh_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        hook: Arc<dyn SessionHook>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { phase: Phase::Idle, invalidated: None }),
                http,
                refresh_url: refresh_url.into(),
                store,
                hook,
                episodes: AtomicU64::new(0),
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        match self.shared.inner.lock().phase {
            Phase::Idle => RefreshState::Idle,
            Phase::Refreshing { .. } => RefreshState::Refreshing,
        }
    }

    /// Number of refresh episodes started (including ones that ended without
    /// calling the endpoint because no refresh token was stored).
    pub fn episodes(&self) -> u64 {
        self.shared.episodes.load(Ordering::Relaxed)
    }

    /// Number of calls made to the refresh endpoint.
    pub fn refresh_calls(&self) -> u64 {
        self.shared.refresh_calls.load(Ordering::Relaxed)
    }

    /// Recover from an authorization failure.
    ///
    /// `failed_with` is the access credential the rejected request carried.
    /// Returns the access credential to replay with, or the error that ended
    /// the session.
    pub async fn recover(&self, failed_with: Option<String>) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            match inner.phase {
                Phase::Refreshing { ref mut waiters } => {
                    tracing::debug!(queued = waiters.len() + 1, "refresh in flight, queueing request");
                    waiters.push_back(tx);
                }
                Phase::Idle => {
                    // The credential was already replaced after this request
                    // was sent: replay with the current one.
                    if let Some(current) = self.shared.store.access_token() {
                        if failed_with.as_deref() != Some(current.as_str()) {
                            tracing::debug!("credential already renewed, replaying");
                            return Ok(current);
                        }
                    }
                    if let Some((ref token, ref err)) = inner.invalidated {
                        if *token == failed_with {
                            return Err(err.clone());
                        }
                    }
                    let mut waiters = VecDeque::new();
                    waiters.push_back(tx);
                    inner.phase = Phase::Refreshing { waiters };
                    self.shared.episodes.fetch_add(1, Ordering::Relaxed);
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        run_episode(shared, failed_with).await;
                    });
                }
            }
        }
        rx.await.unwrap_or(Err(ClientError::RefreshAbandoned))
    }
}

/// Run one refresh episode to completion and release every waiter.
async fn run_episode(shared: Arc<Shared>, failed_with: Option<String>) {
    let previous = shared.store.get();
    let outcome = match previous.as_ref().and_then(|p| p.refresh_token.clone()) {
        None => {
            tracing::warn!("authorization failed and no refresh token is stored");
            Err(ClientError::NoRefreshToken)
        }
        Some(refresh_token) => {
            shared.refresh_calls.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %shared.refresh_url, "refreshing access credential");
            do_refresh(&shared.http, &shared.refresh_url, &refresh_token).await
        }
    };

    let outcome = match outcome {
        Ok(grant) => {
            let pair = match previous {
                Some(ref p) => p.rotated(grant.access_token.clone(), grant.refresh_token),
                None => CredentialPair::new(grant.access_token.clone(), grant.refresh_token),
            };
            // File-backed stores do blocking I/O.
            let store = Arc::clone(&shared.store);
            if let Err(e) = tokio::task::spawn_blocking(move || store.set(pair)).await {
                tracing::warn!(err = %e, "credential write task failed");
            }
            tracing::info!("access credential refreshed");
            shared.hook.refreshed();
            Ok(grant.access_token)
        }
        Err(e) => {
            tracing::warn!(err = %e, "session invalidated");
            shared.hook.invalidate();
            Err(e)
        }
    };

    let waiters = {
        let mut inner = shared.inner.lock();
        if let Err(ref e) = outcome {
            inner.invalidated = Some((failed_with, e.clone()));
        }
        match std::mem::replace(&mut inner.phase, Phase::Idle) {
            Phase::Refreshing { waiters } => waiters,
            Phase::Idle => VecDeque::new(),
        }
    };

    tracing::debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh episode settled");
    for waiter in waiters {
        // A waiter whose request was dropped is simply skipped.
        let _ = waiter.send(outcome.clone());
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
