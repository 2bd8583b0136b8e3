//! Command-line surface and command execution.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{debug, warn};

use stockroom_core::auth::Keychain;
use stockroom_core::health::HealthSnapshot;
use stockroom_core::{ApiClient, ConfigPatch, Orchestrator, Session, SessionStatus};

const ENV_HELP: &str = "\
Environment:
  STOCKROOM_BASE_URL   Override the backend URL for this run
  STOCKROOM_DATA_DIR   Where session, config and cache files live
  RUST_LOG             Log filter (default: warn)";

#[derive(Debug, Parser)]
#[command(name = "stockroom", version)]
#[command(about = "Sign in to the inventory backend, watch its health and browse dashboard stats")]
#[command(after_help = ENV_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Sign in (prompts for missing values)
    Login {
        /// Account email
        email: Option<String>,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },

    /// Sign out
    Logout {
        /// Also forget the remembered password
        #[arg(long)]
        forget: bool,
        /// Account whose password to forget (defaults to the signed-in user)
        #[arg(requires = "forget")]
        email: Option<String>,
    },

    /// Show session, connection and config
    Status,

    /// Poll backend health until Ctrl-C
    Watch,

    /// Show admin dashboard stats
    Dashboard,

    /// Show or change the backend config
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Send an authenticated request
    Call {
        #[arg(ignore_case = true)]
        method: HttpMethod,
        /// Request path, e.g. /api/products
        #[arg(value_parser = parse_path)]
        path: String,
        /// JSON request body
        #[arg(value_parser = parse_json)]
        body: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum ConfigAction {
    /// Show the saved config
    Show,
    /// Turn backend access on
    Enable,
    /// Turn backend access off
    Disable,
    /// Point at a different backend
    BaseUrl { url: String },
    /// Reset config and disable backend access
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

fn parse_path(s: &str) -> Result<String, String> {
    if s.starts_with('/') {
        Ok(s.to_string())
    } else {
        Err(format!("path must start with '/': {}", s))
    }
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("request body is not valid JSON: {}", e))
}

impl Command {
    /// Commands that keep running and get a log file as well as stderr.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Command::Watch)
    }
}

pub async fn run(command: Command, orchestrator: &Arc<Orchestrator>, client: &ApiClient) -> Result<()> {
    match command {
        Command::Login { email, remember } => login(orchestrator, email, remember).await,
        Command::Logout { forget, email } => {
            logout(orchestrator, forget, email);
            Ok(())
        }
        Command::Status => status(orchestrator).await,
        Command::Watch => watch(orchestrator).await,
        Command::Dashboard => dashboard(orchestrator).await,
        Command::Config { action } => config(orchestrator, action.unwrap_or(ConfigAction::Show)),
        Command::Call { method, path, body } => call(orchestrator, client, method, &path, body).await,
    }
}

// ============================================================================
// Session
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(orchestrator: &Orchestrator, email: Option<String>, remember: bool) -> Result<()> {
    if orchestrator.is_authenticated() {
        let session = orchestrator.session();
        let who = session.user.map(|u| u.email).unwrap_or_default();
        println!("Already signed in as {}. Run `stockroom logout` first.", who);
        return Ok(());
    }
    if !orchestrator.is_configured() {
        bail!("Backend access is disabled. Run `stockroom config enable` first.");
    }

    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };

    let (password, from_keychain) = match Keychain::get_password(&email) {
        Ok(password) => {
            debug!("Using remembered password");
            (password, true)
        }
        Err(_) => (rpassword::prompt_password("Password: ")?, false),
    };

    if orchestrator.login(&email, &password).await {
        let session = orchestrator.session();
        if let Some(user) = session.user {
            println!("Signed in as {} ({})", user.display_name, user.role);
        }
        if remember && !from_keychain {
            if let Err(e) = Keychain::store(&email, &password) {
                warn!(error = %e, "Could not remember password");
            }
        }
        Ok(())
    } else {
        let message = orchestrator
            .session()
            .error_message
            .unwrap_or_else(|| "Login failed".to_string());
        if from_keychain {
            eprintln!(
                "Used the remembered password; run `stockroom logout --forget {}` to clear it.",
                email
            );
        }
        bail!(message)
    }
}

fn logout(orchestrator: &Orchestrator, forget: bool, email: Option<String>) {
    let email = email.or_else(|| orchestrator.session().user.map(|u| u.email));
    orchestrator.logout();
    if forget {
        if let Some(email) = email {
            if let Err(e) = Keychain::delete(&email) {
                debug!(error = %e, "No remembered password to forget");
            }
        }
    }
    println!("Signed out");
}

fn describe_session(session: &Session) -> String {
    match (&session.status, &session.user) {
        (SessionStatus::Authenticated | SessionStatus::Refreshing, Some(user)) => {
            format!("signed in as {} <{}> [{}]", user.display_name, user.email, user.role)
        }
        (SessionStatus::Error, _) => format!(
            "error: {}",
            session.error_message.as_deref().unwrap_or("unknown")
        ),
        (status, _) => format!("{:?}", status).to_lowercase(),
    }
}

fn describe_health(snapshot: &HealthSnapshot) -> String {
    let status = &snapshot.status;
    let metrics = &snapshot.metrics;
    if status.last_check_at.is_none() {
        return "not checked".to_string();
    }
    let latency = metrics
        .latency_ms
        .map(|ms| format!("{:.0}ms", ms))
        .unwrap_or_else(|| "-".to_string());
    match (status.online, metrics.healthy) {
        (true, true) => format!("online, healthy ({})", latency),
        (true, false) => format!("online, slow ({})", latency),
        (false, _) => format!(
            "offline ({}), {} consecutive failures",
            status.error.as_deref().unwrap_or("unknown error"),
            metrics.consecutive_failures
        ),
    }
}

async fn status(orchestrator: &Orchestrator) -> Result<()> {
    orchestrator.test_connection().await;
    let snapshot = orchestrator.snapshot();

    println!("Session:    {}", describe_session(&snapshot.session));
    if snapshot.is_configured() {
        let health = HealthSnapshot {
            status: snapshot.connection_status.clone(),
            metrics: snapshot.connection_metrics.clone(),
        };
        println!("Backend:    {}", describe_health(&health));
    } else {
        println!("Backend:    disabled");
    }
    println!("Base URL:   {}", snapshot.config.base_url);
    Ok(())
}

async fn watch(orchestrator: &Arc<Orchestrator>) -> Result<()> {
    if !orchestrator.is_configured() {
        bail!("Backend access is disabled. Run `stockroom config enable` first.");
    }

    let mut sessions = orchestrator.subscribe_session();
    let mut health = orchestrator.subscribe_health();
    let _mount = orchestrator.mount();

    println!("Session: {}", describe_session(&sessions.borrow_and_update()));
    eprintln!("Watching backend health, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = sessions.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("Session: {}", describe_session(&sessions.borrow_and_update()));
            }
            changed = health.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("Backend: {}", describe_health(&health.borrow_and_update()));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Dashboard
// ============================================================================

async fn dashboard(orchestrator: &Orchestrator) -> Result<()> {
    if orchestrator.is_configured() {
        orchestrator.test_connection().await;
    }
    let snapshot = orchestrator.dashboard().await;
    let data = &snapshot.data;

    if !snapshot.live {
        match snapshot.age_display() {
            Some(age) if snapshot.is_stale() => {
                eprintln!("Backend unavailable, showing stale data cached {}", age)
            }
            Some(age) => eprintln!("Backend unavailable, showing data cached {}", age),
            None => eprintln!("Backend unavailable and nothing cached yet"),
        }
    }

    println!("API keys      {} active / {} total, {} requests, {:.1}% errors",
        data.api_management.active_keys,
        data.api_management.total_keys,
        data.api_management.total_requests,
        data.api_management.error_rate);
    println!("Security      {} alerts, {} threats, {} vulnerabilities",
        data.security.alerts, data.security.threats, data.security.vulnerabilities);
    println!("Database      {:?}, {} connections, {:.0}ms, {:.1}% disk",
        data.database.status, data.database.connections,
        data.database.response_time, data.database.disk_usage);
    println!("System        {} pending updates, backup {:?}{}",
        data.settings.pending_updates, data.settings.backup_status,
        if data.settings.maintenance_mode { ", maintenance mode" } else { "" });
    println!("Stock moves   {} today, {} this week, {} this month",
        data.stock_movements.today_count,
        data.stock_movements.weekly_count,
        data.stock_movements.monthly_count);
    println!("Users         {} online, {} active, {} total",
        data.users.online_count, data.users.active_count, data.users.total_count);
    println!("Reports       {} pending, {} completed today, {} failed",
        data.reports.pending_count, data.reports.completed_today, data.reports.failed_count);
    Ok(())
}

// ============================================================================
// Config
// ============================================================================

fn config(orchestrator: &Orchestrator, action: ConfigAction) -> Result<()> {
    let updated = match action {
        ConfigAction::Show => orchestrator.config(),
        ConfigAction::Enable => orchestrator.set_config(ConfigPatch::api_enabled(true)),
        ConfigAction::Disable => orchestrator.set_config(ConfigPatch::api_enabled(false)),
        ConfigAction::BaseUrl { url } => orchestrator.set_config(ConfigPatch::base_url(url)),
        ConfigAction::Clear => {
            orchestrator.clear_config();
            orchestrator.config()
        }
    };
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}

// ============================================================================
// Raw requests
// ============================================================================

async fn call(
    orchestrator: &Orchestrator,
    client: &ApiClient,
    method: HttpMethod,
    path: &str,
    body: Option<Value>,
) -> Result<()> {
    if !orchestrator.is_configured() {
        bail!("Backend access is disabled. Run `stockroom config enable` first.");
    }
    if !orchestrator.is_authenticated() {
        warn!("Not signed in, sending request without a token");
    }

    let body = body.unwrap_or(Value::Null);
    let response: Value = match method {
        HttpMethod::Get => client.get(path).await,
        HttpMethod::Post => client.post(path, &body).await,
        HttpMethod::Put => client.put(path, &body).await,
        HttpMethod::Delete => client.delete(path).await,
    }
    .map_err(|e| anyhow!("{} {} failed: {}", format!("{:?}", method).to_uppercase(), path, e))?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        let args = std::iter::once("stockroom").chain(line.split_whitespace());
        Cli::try_parse_from(args).map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login_variants() {
        assert_eq!(
            parse("login").unwrap(),
            Command::Login { email: None, remember: false }
        );
        assert_eq!(
            parse("login a@x.com --remember").unwrap(),
            Command::Login { email: Some("a@x.com".to_string()), remember: true }
        );
        assert!(parse("login a@x.com b@x.com").is_err());
        assert!(parse("login --bogus").is_err());
    }

    #[test]
    fn test_parse_logout() {
        assert_eq!(
            parse("logout").unwrap(),
            Command::Logout { forget: false, email: None }
        );
        assert_eq!(
            parse("logout --forget a@x.com").unwrap(),
            Command::Logout { forget: true, email: Some("a@x.com".to_string()) }
        );
        assert!(parse("logout a@x.com").is_err());
    }

    #[test]
    fn test_parse_config_actions() {
        assert_eq!(parse("config").unwrap(), Command::Config { action: None });
        assert_eq!(
            parse("config base-url http://inventory:4000").unwrap(),
            Command::Config {
                action: Some(ConfigAction::BaseUrl { url: "http://inventory:4000".to_string() })
            }
        );
        assert!(parse("config base-url").is_err());
    }

    #[test]
    fn test_parse_call() {
        let parsed = parse(r#"call post /api/items {"sku":"A1"}"#).unwrap();
        match parsed {
            Command::Call { method, path, body } => {
                assert_eq!(method, HttpMethod::Post);
                assert_eq!(path, "/api/items");
                assert_eq!(body, Some(serde_json::json!({"sku": "A1"})));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(
            parse("call GET /api/items").unwrap(),
            Command::Call { method: HttpMethod::Get, path: "/api/items".to_string(), body: None }
        );
        assert!(parse("call PATCH /api/items").is_err());
        assert!(parse("call GET api/items").is_err());
        assert!(parse("call GET /api/items {not").is_err());
    }

    #[test]
    fn test_missing_or_unknown_command_is_rejected() {
        assert!(parse("").is_err());
        assert!(parse("frobnicate").is_err());
        assert!(Command::Watch.is_long_running());
        assert!(!Command::Status.is_long_running());
    }
}
