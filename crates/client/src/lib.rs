// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod model;
pub mod session;
#[cfg(test)]
pub mod test_support;

use std::sync::Arc;

use crate::auth::AuthApi;
use crate::client::ApiClient;
use crate::config::Config;
use crate::credential::{CredentialStore, FileStore, MemoryStore};
use crate::session::{SessionHook, SessionState};

/// One authenticated session against the workforce API: the credential
/// store, the session state it reports to, and the client that uses both.
pub struct Staffline {
    pub api: Arc<ApiClient>,
    pub auth: AuthApi,
    pub session: Arc<SessionState>,
}

impl Staffline {
    /// Wire up a session from configuration. Persisted credentials from a
    /// previous run are picked up unless `no_persist` is set.
    pub fn connect(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn CredentialStore> = if config.no_persist {
            Arc::new(MemoryStore::new())
        } else {
            let dir = config.resolved_state_dir();
            tracing::debug!(dir = %dir.display(), "using persisted session");
            Arc::new(FileStore::in_dir(&dir))
        };
        let session = SessionState::new(Arc::clone(&store));
        let hook: Arc<dyn SessionHook> = Arc::clone(&session) as Arc<dyn SessionHook>;
        let api = Arc::new(ApiClient::new(config, store, hook)?);
        let auth = AuthApi::new(Arc::clone(&api), Arc::clone(&session));
        Ok(Self { api, auth, session })
    }
}
