// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session state and the invalidation hook the refresh coordinator reports to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::credential::CredentialStore;
use crate::model::User;

/// Message shown to the user when the session ends involuntarily.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// Fallback error when a login fails without a server message.
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Fallback error when the current user cannot be fetched.
pub const VERIFY_FAILED_MESSAGE: &str = "Failed to verify session";

/// Collaborator notified by the refresh coordinator.
///
/// `invalidate` is called synchronously, at most once per failed refresh
/// episode, and owns clearing the credential store.
pub trait SessionHook: Send + Sync {
    fn invalidate(&self);

    /// Called after a successful refresh. No-op by default.
    fn refreshed(&self) {}
}

/// Session lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Authenticated { user_id: Option<String> },
    Refreshed,
    /// The session ended because its credential could not be renewed.
    Invalidated { message: String },
    /// Login or session verification failed; the credential is kept.
    Unverified { message: String },
    LoggedOut,
}

/// Application-facing session state: the authenticated flag, the current
/// user, and an event stream for anything that must react to logout.
pub struct SessionState {
    store: Arc<dyn CredentialStore>,
    authenticated: AtomicBool,
    user: RwLock<Option<User>>,
    error: RwLock<Option<String>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    /// A session is considered authenticated at startup when the store holds
    /// a credential from a previous run.
    pub fn new(store: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        let authenticated = store.get().is_some();
        Arc::new(Self {
            store,
            authenticated: AtomicBool::new(authenticated),
            user: RwLock::new(None),
            error: RwLock::new(None),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    /// Last session-level error message, cleared on login.
    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Record a successful login or session verification.
    pub fn mark_authenticated(&self, user: Option<User>) {
        let user_id = user.as_ref().map(|u| u.id.clone());
        if user.is_some() {
            *self.user.write() = user;
        }
        *self.error.write() = None;
        self.authenticated.store(true, Ordering::Release);
        let _ = self.event_tx.send(SessionEvent::Authenticated { user_id });
    }

    /// Record a failed login or session check: the session is no longer
    /// considered authenticated, but stored credentials are left alone.
    pub fn verification_failed(&self, message: impl Into<String>) {
        let message = message.into();
        *self.user.write() = None;
        self.authenticated.store(false, Ordering::Release);
        *self.error.write() = Some(message.clone());
        let _ = self.event_tx.send(SessionEvent::Unverified { message });
    }

    /// Local half of logout: always clears credentials and user state.
    pub fn logged_out(&self) {
        self.reset();
        *self.error.write() = None;
        let _ = self.event_tx.send(SessionEvent::LoggedOut);
    }

    fn reset(&self) {
        self.store.clear();
        *self.user.write() = None;
        self.authenticated.store(false, Ordering::Release);
    }
}

impl SessionHook for SessionState {
    fn invalidate(&self) {
        self.reset();
        *self.error.write() = Some(SESSION_EXPIRED_MESSAGE.to_owned());
        let _ = self
            .event_tx
            .send(SessionEvent::Invalidated { message: SESSION_EXPIRED_MESSAGE.to_owned() });
    }

    fn refreshed(&self) {
        let _ = self.event_tx.send(SessionEvent::Refreshed);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
