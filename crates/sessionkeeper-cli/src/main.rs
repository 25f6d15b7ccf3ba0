//! SessionKeeper CLI - log in, inspect, refresh and drop a persisted session.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use sessionkeeper_core::auth::expiry::{is_expired, parse_expiry, seconds_until_expiry};
use sessionkeeper_core::auth::AuthenticationRequest;
use sessionkeeper_core::{Config, SessionClient};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "Usage: sessionkeeper <login [email] | status | refresh [--force] | logout>";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Load config and apply environment overrides.
fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    if let Ok(url) = std::env::var("SESSIONKEEPER_SERVER_URL") {
        config.server_url = url;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let mut config = load_config()?;
    let client = SessionClient::from_config(&config)?;
    info!(command = %command, "sessionkeeper starting");

    match command.as_str() {
        "login" => login(&client, &mut config, args.get(1).cloned()).await,
        "status" => status(&client),
        "refresh" => refresh(&client, args.iter().any(|a| a == "--force")).await,
        "logout" => {
            client.logout().await.context("Logout failed")?;
            eprintln!("Logged out.");
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n{}", other, USAGE);
            Ok(())
        }
    }
}

async fn login(client: &SessionClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email
        .or_else(|| std::env::var("SESSIONKEEPER_USERNAME").ok())
        .or_else(|| config.last_username.clone())
    {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = match std::env::var("SESSIONKEEPER_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password(format!("Password for {}: ", email))
            .context("Failed to read password")?,
    };

    let result = client
        .authenticate(Some(AuthenticationRequest::local(&email, &password)))
        .await
        .context("Login failed")?;

    config.last_username = Some(email);
    config.save()?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn status(client: &SessionClient) -> Result<()> {
    let record = client.session().credentials()?;
    let exp = parse_expiry(record.exp.as_deref());
    let now = Utc::now();

    match exp {
        Some(exp) => {
            let state = if is_expired(now, Some(exp)) { "expired" } else { "valid" };
            let left = seconds_until_expiry(now, Some(exp)).unwrap_or(0);
            println!("Access token:  {} ({}s left, expires at {})", state, left, exp);
        }
        None => println!("Access token:  no expiry stored"),
    }
    println!(
        "Refresh token: {}",
        if record.refresh_token.is_some() { "stored" } else { "none" }
    );
    println!("Device id:     {}", record.device_id.as_deref().unwrap_or("none"));
    Ok(())
}

async fn refresh(client: &SessionClient, force: bool) -> Result<()> {
    let result = client
        .session()
        .reauthenticate(force, None)
        .await
        .context("Re-authentication failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
