// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::error;

use staffline::client::ApiRequest;
use staffline::config::Config;
use staffline::error::ClientError;
use staffline::model::LoginCredentials;
use staffline::Staffline;

#[derive(Debug, Parser)]
#[command(name = "staffline", version, about = "Authenticated client for the workforce API")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and persist the session.
    Login {
        #[arg(long, env = "STAFFLINE_EMAIL")]
        email: String,
        #[arg(long, env = "STAFFLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session.
    Logout,
    /// Print the authenticated user.
    Whoami,
    /// Print local session state without contacting the backend.
    Status,
    /// Send an authenticated request and print the JSON response.
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE).
        method: String,
        /// Path relative to the API base URL.
        path: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
        /// Query parameter as `key=value` (repeatable).
        #[arg(long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.config);

    match run(cli).await {
        Ok(output) => {
            println!("{output}");
        }
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            let code = e.downcast_ref::<ClientError>().map_or(1, |c| c.code().exit_code());
            std::process::exit(code);
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Value> {
    let app = Staffline::connect(&cli.config)?;

    match cli.command {
        Command::Login { email, password } => {
            let user = app.auth.login(&LoginCredentials { email, password }).await?;
            Ok(json!({ "authenticated": true, "user": user }))
        }
        Command::Logout => {
            app.auth.logout().await;
            Ok(json!({ "authenticated": false }))
        }
        Command::Whoami => {
            let user = app.auth.current_user().await?;
            Ok(serde_json::to_value(user)?)
        }
        Command::Status => {
            let pair = app.session.store().get();
            Ok(json!({
                "authenticated": app.session.is_authenticated(),
                "api_url": app.api.base_url(),
                "refresh_token": pair.as_ref().is_some_and(|p| p.refresh_token.is_some()),
            }))
        }
        Command::Request { method, path, body, query } => {
            let req = build_request(&method, path, body.as_deref(), &query)?;
            let resp = app.api.send(req).await?;
            Ok(resp.value()?)
        }
    }
}

fn build_request(
    method: &str,
    path: String,
    body: Option<&str>,
    query: &[String],
) -> anyhow::Result<ApiRequest> {
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ClientError::InvalidRequest(format!("invalid method: {method}")))?;
    let mut req = ApiRequest::new(method, path);
    for pair in query {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ClientError::InvalidRequest(format!("invalid --query {pair:?}")))?;
        req = req.query(key, value);
    }
    if let Some(raw) = body {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid --body: {e}")))?;
        req = req.json(&value)?;
    }
    Ok(req)
}
