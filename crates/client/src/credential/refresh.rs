// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh endpoint call: trade a refresh credential for a new access credential.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Path of the refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Request body sent to the refresh endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Raw refresh endpoint response. `token` is optional here so a 2xx body
/// without it is reported as [`ClientError::MalformedRefresh`] rather than a
/// decode error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Credentials minted by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Present only when the backend rotated the refresh credential.
    pub refresh_token: Option<String>,
}

/// Perform a single refresh request. Never retried: a refresh token may be
/// single-use, so a failed attempt ends the session.
pub async fn do_refresh(
    client: &reqwest::Client,
    refresh_url: &str,
    refresh_token: &str,
) -> Result<RefreshGrant, ClientError> {
    let resp = client
        .post(refresh_url)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await
        .map_err(|e| ClientError::Refresh { status: None, message: e.to_string() })?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ClientError::Refresh { status: Some(status.as_u16()), message: text });
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ClientError::Refresh { status: None, message: e.to_string() })?;
    let body: RefreshResponse =
        serde_json::from_slice(&bytes).map_err(|_| ClientError::MalformedRefresh)?;

    match body.token.filter(|t| !t.is_empty()) {
        Some(access_token) => Ok(RefreshGrant {
            access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
        }),
        None => Err(ClientError::MalformedRefresh),
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
