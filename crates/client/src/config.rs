// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::credential::refresh::REFRESH_PATH;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5002/api";

/// Client configuration shared by the library and the CLI.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Base URL of the workforce API.
    #[arg(long, default_value = DEFAULT_API_URL, env = "STAFFLINE_API_URL")]
    pub api_url: String,

    /// Refresh endpoint URL. Defaults to `<api-url>/auth/refresh`.
    #[arg(long, env = "STAFFLINE_REFRESH_URL")]
    pub refresh_url: Option<String>,

    /// Directory holding the persisted session.
    #[arg(long, env = "STAFFLINE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Keep credentials in memory only.
    #[arg(long, env = "STAFFLINE_NO_PERSIST")]
    pub no_persist: bool,

    /// Per-request network timeout in milliseconds (also bounds refresh calls).
    #[arg(long, default_value_t = 15_000, env = "STAFFLINE_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "STAFFLINE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "STAFFLINE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| anyhow::anyhow!("invalid --api-url {:?}: {e}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--api-url must be http or https, got {}", url.scheme());
        }
        if let Some(ref refresh) = self.refresh_url {
            reqwest::Url::parse(refresh)
                .map_err(|e| anyhow::anyhow!("invalid --refresh-url {refresh:?}: {e}"))?;
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn refresh_url(&self) -> String {
        match self.refresh_url {
            Some(ref url) => url.clone(),
            None => format!("{}{REFRESH_PATH}", self.base_url()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Directory for persisted state: `--state-dir`, else the resolved default.
    pub fn resolved_state_dir(&self) -> PathBuf {
        match self.state_dir {
            Some(ref dir) => dir.clone(),
            None => crate::credential::state_dir(),
        }
    }

    /// Build a `Config` for tests against `api_url` (in-memory credentials,
    /// short timeout).
    #[doc(hidden)]
    pub fn test(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            refresh_url: None,
            state_dir: None,
            no_persist: true,
            timeout_ms: 2_000,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
