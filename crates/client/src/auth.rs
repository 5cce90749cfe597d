// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login, logout and current-user calls layered on [`ApiClient`].

use std::sync::Arc;

use crate::client::{ApiClient, ApiRequest};
use crate::credential::CredentialPair;
use crate::error::ClientError;
use crate::model::{AuthResponse, LoginCredentials, SuccessResponse, User};
use crate::session::{SessionState, LOGIN_FAILED_MESSAGE, VERIFY_FAILED_MESSAGE};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/users/me";

/// Session lifecycle operations for one [`ApiClient`].
#[derive(Clone)]
pub struct AuthApi {
    client: Arc<ApiClient>,
    session: Arc<SessionState>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>, session: Arc<SessionState>) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Exchange email and password for a credential pair and store it.
    ///
    /// Sent without a credential; a 401 here means bad credentials, not an
    /// expired session.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, ClientError> {
        match self.exchange(credentials).await {
            Ok(user) => Ok(user),
            Err(e) => {
                tracing::warn!(err = %e, "login failed");
                self.fail(&e, LOGIN_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    async fn exchange(&self, credentials: &LoginCredentials) -> Result<User, ClientError> {
        let req = ApiRequest::post(LOGIN_PATH).public().json(credentials)?;
        let resp: AuthResponse = self.client.send(req).await?.json()?;
        let token = resp
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::Decode("login response missing token".to_owned()))?;

        let refresh_token = resp.refresh_token.filter(|t| !t.is_empty());
        if refresh_token.is_none() {
            tracing::warn!("login issued no refresh token; session cannot be renewed");
        }
        self.client.store().set(CredentialPair::new(token, refresh_token));
        tracing::info!(user = %resp.user.id, "logged in");
        self.session.mark_authenticated(Some(resp.user.clone()));
        Ok(resp.user)
    }

    /// End the session. The remote call is best-effort; local state is
    /// always cleared.
    pub async fn logout(&self) {
        if self.client.store().get().is_some() {
            let req = ApiRequest::post(LOGOUT_PATH).mark_retried();
            if let Err(e) = self.client.send(req).await {
                tracing::warn!(err = %e, "logout request failed");
            }
        }
        self.session.logged_out();
        tracing::info!("logged out");
    }

    /// Fetch the authenticated user and record it on the session.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        match self.client.get_json::<SuccessResponse<User>>(ME_PATH).await {
            Ok(resp) => {
                self.session.mark_authenticated(Some(resp.data.clone()));
                Ok(resp.data)
            }
            Err(e) => {
                tracing::warn!(err = %e, "session verification failed");
                self.fail(&e, VERIFY_FAILED_MESSAGE);
                Err(e)
            }
        }
    }

    /// Session failures were already reported by the invalidation hook.
    fn fail(&self, err: &ClientError, fallback: &str) {
        if err.is_session_failure() {
            return;
        }
        let message = err.server_message().unwrap_or_else(|| fallback.to_owned());
        self.session.verification_failed(message);
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
