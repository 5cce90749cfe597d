// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, machine-readable error codes for every [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    SessionExpired,
    RefreshFailed,
    HttpStatus,
    Transport,
    Decode,
    BadRequest,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::HttpStatus => "HTTP_STATUS",
            Self::Transport => "TRANSPORT",
            Self::Decode => "DECODE",
            Self::BadRequest => "BAD_REQUEST",
        }
    }

    /// Process exit code used by the CLI for this class of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unauthorized | Self::SessionExpired | Self::RefreshFailed => 3,
            Self::HttpStatus => 4,
            Self::Transport => 5,
            Self::Decode | Self::BadRequest => 2,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the API client.
///
/// `Clone` so that a single refresh outcome can be delivered to every request
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The backend rejected a request that was already replayed after a refresh.
    Unauthorized { method: String, path: String },
    /// No refresh credential is stored; the session cannot be recovered.
    NoRefreshToken,
    /// The refresh endpoint was unreachable, timed out, or returned non-2xx.
    Refresh { status: Option<u16>, message: String },
    /// The refresh endpoint answered 2xx without a `token` field.
    MalformedRefresh,
    /// The refresh task ended without reporting an outcome.
    RefreshAbandoned,
    /// A non-2xx response on an ordinary request.
    Status { status: u16, method: String, path: String, body: String },
    /// Connection, TLS or timeout failure on an ordinary request.
    Transport(String),
    /// A response body could not be decoded.
    Decode(String),
    /// The request could not be built (bad path, header or URL).
    InvalidRequest(String),
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::NoRefreshToken => ErrorCode::SessionExpired,
            Self::Refresh { .. } | Self::MalformedRefresh | Self::RefreshAbandoned => {
                ErrorCode::RefreshFailed
            }
            Self::Status { .. } => ErrorCode::HttpStatus,
            Self::Transport(_) => ErrorCode::Transport,
            Self::Decode(_) => ErrorCode::Decode,
            Self::InvalidRequest(_) => ErrorCode::BadRequest,
        }
    }

    /// True when the error ended the session and the user must log in again.
    pub fn is_session_failure(&self) -> bool {
        matches!(self.code(), ErrorCode::SessionExpired | ErrorCode::RefreshFailed)
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Refresh { status, .. } => *status,
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided `message` from a JSON error body, when present.
    pub fn server_message(&self) -> Option<String> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value.get("message").and_then(|m| m.as_str()).map(str::to_owned)
    }

    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized { method, path } => {
                write!(f, "{method} {path}: unauthorized after credential refresh")
            }
            Self::NoRefreshToken => f.write_str("no refresh token: session cannot be renewed"),
            Self::Refresh { status: Some(status), message } => {
                write!(f, "refresh failed ({status}): {message}")
            }
            Self::Refresh { status: None, message } => write!(f, "refresh failed: {message}"),
            Self::MalformedRefresh => f.write_str("refresh response missing token"),
            Self::RefreshAbandoned => f.write_str("refresh ended without a result"),
            Self::Status { status, method, path, body } => {
                if body.is_empty() {
                    write!(f, "{method} {path} failed ({status})")
                } else {
                    write!(f, "{method} {path} failed ({status}): {body}")
                }
            }
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
