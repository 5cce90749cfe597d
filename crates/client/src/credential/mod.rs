// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential storage: the access/refresh token pair for the active session.
//!
//! The store is read on every outgoing request and written only by login,
//! logout, the refresh coordinator, and the session invalidation hook.

pub mod persist;
pub mod refresh;

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use persist::FileStore;

/// The active access credential and, when the backend issued one, the
/// credential used to mint a new access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token }
    }

    /// Apply a refresh result: the access token is always replaced; the refresh
    /// token only when the backend rotated it.
    pub fn rotated(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
        }
    }
}

/// Synchronous key-value storage for the session's credential pair.
///
/// Implementations never fail: an unavailable backing medium behaves as if no
/// credential is stored.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<CredentialPair>;
    fn set(&self, pair: CredentialPair);
    fn clear(&self);

    fn access_token(&self) -> Option<String> {
        self.get().map(|p| p.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get().and_then(|p| p.refresh_token)
    }
}

/// Process-local store. Used in tests and when persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pair: Mutex<Option<CredentialPair>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self { pair: Mutex::new(Some(pair)) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Option<CredentialPair> {
        self.pair.lock().clone()
    }

    fn set(&self, pair: CredentialPair) {
        *self.pair.lock() = Some(pair);
    }

    fn clear(&self) {
        *self.pair.lock() = None;
    }
}

/// Resolve the state directory for persisted client data.
///
/// Checks `STAFFLINE_STATE_DIR`, then `$XDG_STATE_HOME/staffline`,
/// then `$HOME/.local/state/staffline`.
pub fn state_dir() -> PathBuf {
    state_dir_with(|name| std::env::var(name).ok())
}

fn state_dir_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env("STAFFLINE_STATE_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = env("XDG_STATE_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(xdg).join("staffline");
    }
    if let Some(home) = env("HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(home).join(".local/state/staffline");
    }
    PathBuf::from(".staffline")
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
