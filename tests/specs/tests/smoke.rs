// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `staffline` binary against a
//! mock workforce API and check session persistence across invocations.

use staffline::error::ErrorCode;
use staffline_specs::{free_port, MockApi, StafflineCli};

async fn logged_in() -> anyhow::Result<(MockApi, StafflineCli)> {
    let api = MockApi::start().await?;
    let cli = StafflineCli::new(api.api_url())?;
    let out = cli.run(&["login", "--email", "ada@example.com", "--password", "secret"]).await?;
    anyhow::ensure!(out.code == Some(0), "login failed: {}", out.stderr);
    Ok((api, cli))
}

#[tokio::test]
async fn login_persists_session() -> anyhow::Result<()> {
    let (_api, cli) = logged_in().await?;

    assert!(cli.state_dir().join("session.json").exists());
    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["refresh_token"], true);
    Ok(())
}

#[tokio::test]
async fn bad_password_exits_with_http_status_code() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let cli = StafflineCli::new(api.api_url())?;

    let out = cli.run(&["login", "--email", "ada@example.com", "--password", "wrong"]).await?;

    assert_eq!(out.code, Some(ErrorCode::HttpStatus.exit_code()));
    assert!(out.stderr.contains("Invalid credentials"), "stderr: {}", out.stderr);
    assert_eq!(api.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn request_uses_persisted_credential() -> anyhow::Result<()> {
    let (api, cli) = logged_in().await?;

    let out = cli.run(&["request", "GET", "/employees", "--query", "page=2"]).await?;

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    let body = out.json()?;
    assert_eq!(body["path"], "/api/employees");
    assert_eq!(body["query"], "page=2");
    assert_eq!(body["token"], "access-1");
    assert_eq!(api.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_persisted() -> anyhow::Result<()> {
    let (api, cli) = logged_in().await?;
    api.expire_access();

    let me = cli.run(&["whoami"]).await?;
    assert_eq!(me.code, Some(0), "stderr: {}", me.stderr);
    assert_eq!(me.json()?["email"], "ada@example.com");
    assert_eq!(api.refresh_calls(), 1);

    // The renewed credential was written back, so the next run needs no refresh.
    let body = cli.run(&["request", "GET", "/schedules"]).await?.json()?;
    assert_eq!(body["token"], "access-2");
    assert_eq!(api.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn revoked_refresh_ends_session() -> anyhow::Result<()> {
    let (api, cli) = logged_in().await?;
    api.expire_access();
    api.revoke_refresh();

    let out = cli.run(&["whoami"]).await?;

    assert_eq!(out.code, Some(ErrorCode::RefreshFailed.exit_code()));
    assert!(!cli.state_dir().join("session.json").exists());
    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["authenticated"], false);
    Ok(())
}

#[tokio::test]
async fn logout_clears_persisted_session() -> anyhow::Result<()> {
    let (api, cli) = logged_in().await?;

    let out = cli.run(&["logout"]).await?;

    assert_eq!(out.code, Some(0));
    assert_eq!(api.logout_calls(), 1);
    assert!(!cli.state_dir().join("session.json").exists());
    Ok(())
}

#[tokio::test]
async fn logout_succeeds_when_backend_is_down() -> anyhow::Result<()> {
    let (_api, cli) = logged_in().await?;
    let down = StafflineCli::new(format!("http://127.0.0.1:{}/api", free_port()?))?;
    std::fs::copy(cli.state_dir().join("session.json"), down.state_dir().join("session.json"))?;

    let out = down.run(&["logout"]).await?;

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(!down.state_dir().join("session.json").exists());
    Ok(())
}

#[tokio::test]
async fn invalid_config_exits_two() -> anyhow::Result<()> {
    let cli = StafflineCli::new("ftp://example.com/api")?;

    let out = cli.run(&["status"]).await?;

    assert_eq!(out.code, Some(2));
    Ok(())
}
