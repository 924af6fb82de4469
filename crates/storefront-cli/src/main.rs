use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use storefront_sdk::{AccessToken, ClientConfig, LoginRequest, Role, SdkError, SessionClient};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "storefront-cli")]
#[command(about = "Storefront API command-line client")]
#[command(author, version, long_about = None)]
struct Cli {
    /// Storefront API base URL
    #[arg(long, env = "STOREFRONT_API_URL", default_value = "http://localhost:3001")]
    api_url: String,

    /// Account email
    #[arg(long, env = "STOREFRONT_EMAIL")]
    email: String,

    /// Account password
    #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_seconds: u64,

    /// Refuse to run the command unless the account has this role
    #[arg(long)]
    expect_role: Option<Role>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the subject, role and expiry of the session's access token
    Whoami,
    /// GET a path and print the JSON body
    Get { path: String },
    /// Issue concurrent GETs through one session
    Burst {
        path: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

#[derive(Debug, Default, PartialEq)]
struct BurstReport {
    ok: usize,
    expired: usize,
    failed: usize,
    latencies_ms: Vec<u64>,
}

impl BurstReport {
    fn record(&mut self, outcome: &Result<serde_json::Value, SdkError>, elapsed: Duration) {
        match outcome {
            Ok(_) => self.ok += 1,
            Err(e) if e.is_unauthenticated() => self.expired += 1,
            Err(_) => self.failed += 1,
        }
        self.latencies_ms
            .push(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }

    fn percentile(&self, q: f64) -> u64 {
        if self.latencies_ms.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies_ms.clone();
        sorted.sort_unstable();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
        sorted[idx]
    }
}

/// What the access token says about the session.  Read without
/// verification, for display and the role guard only.
#[derive(Debug, PartialEq)]
struct SessionSummary {
    subject: String,
    role: Role,
    expires_at: Option<DateTime<Utc>>,
    expired: bool,
}

impl SessionSummary {
    fn from_token(token: &AccessToken, now: DateTime<Utc>) -> Result<Self> {
        let claims = token
            .peek_claims()
            .context("access token carries no readable claims")?;
        Ok(Self {
            expires_at: claims.expires_at(),
            expired: claims.is_expired_at(now),
            subject: claims.sub,
            role: claims.role,
        })
    }

    fn require_role(&self, expected: Role) -> Result<()> {
        if self.role != expected {
            bail!("signed in as {} but --expect-role is {expected}", self.role);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::new(&cli.api_url)?
        .with_timeout(Duration::from_secs(cli.timeout_seconds));
    let client = SessionClient::new(config)?;
    run_session(&client, &cli).await
}

/// Log in, run the command, and log out again whatever the command did.
async fn run_session(client: &SessionClient, cli: &Cli) -> Result<()> {
    let token = client
        .login(&LoginRequest {
            email: cli.email.clone(),
            password: cli.password.clone(),
        })
        .await
        .context("login failed")?;
    info!(email = %cli.email, "session opened");

    let outcome = run_command(client, &token, cli).await;
    let logout = client.logout().await.context("logout failed");
    finish(outcome, logout)
}

/// The command's error wins over a logout error, which is only logged.
fn finish(outcome: Result<()>, logout: Result<()>) -> Result<()> {
    match (outcome, logout) {
        (Err(e), Err(logout_err)) => {
            warn!(error = %logout_err, "logout after failed command also failed");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), logout) => logout,
    }
}

async fn run_command(client: &SessionClient, token: &AccessToken, cli: &Cli) -> Result<()> {
    let summary = match SessionSummary::from_token(token, Utc::now()) {
        Ok(s) => {
            info!(
                sub = %s.subject,
                role = %s.role,
                expires_at = ?s.expires_at,
                expired = s.expired,
                "access token claims"
            );
            Some(s)
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "access token is opaque");
            None
        }
    };
    if let Some(expected) = cli.expect_role {
        summary
            .as_ref()
            .context("cannot check the role of an opaque access token")?
            .require_role(expected)?;
    }

    match &cli.command {
        Command::Whoami => {
            let s = summary.context("access token carries no readable claims")?;
            let expires = s
                .expires_at
                .map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339());
            println!(
                "sub={} role={} expires_at={expires} expired={}",
                s.subject, s.role, s.expired
            );
        }
        Command::Get { path } => {
            let body: serde_json::Value = client
                .get_json(path)
                .await
                .with_context(|| format!("GET {path} failed"))?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Burst { path, count } => {
            let report = burst(client, path, *count).await;
            println!(
                "burst: path={path} count={count} ok={} expired={} failed={} refreshes={}",
                report.ok,
                report.expired,
                report.failed,
                client.refresh_count(),
            );
            println!(
                "latency_ms: p50={} p95={} max={}",
                report.percentile(0.50),
                report.percentile(0.95),
                report.latencies_ms.iter().max().copied().unwrap_or(0),
            );
        }
    }
    Ok(())
}

async fn burst(client: &SessionClient, path: &str, count: usize) -> BurstReport {
    let calls = (0..count).map(|_| async {
        let started = Instant::now();
        let outcome = client.get_json::<serde_json::Value>(path).await;
        (outcome, started.elapsed())
    });

    let mut report = BurstReport::default();
    for (outcome, elapsed) in join_all(calls).await {
        if let Err(e) = &outcome {
            info!(error = %e, "call failed");
        }
        report.record(&outcome, elapsed);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_issuer::{
        serve_ephemeral, IssuerConfig, IssuerState, SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD,
        SEED_CUSTOMER_EMAIL, SEED_CUSTOMER_PASSWORD,
    };
    use std::sync::Arc;

    #[test]
    fn parses_burst() {
        let cli = Cli::try_parse_from([
            "storefront-cli",
            "--email",
            "a@b.c",
            "--password",
            "pw",
            "burst",
            "/api/cart",
            "--count",
            "25",
        ])
        .unwrap();
        assert_eq!(cli.api_url, "http://localhost:3001");
        match cli.command {
            Command::Burst { path, count } => {
                assert_eq!(path, "/api/cart");
                assert_eq!(count, 25);
            }
            Command::Get { .. } | Command::Whoami => panic!("expected burst"),
        }
    }

    #[test]
    fn parses_expected_role() {
        let cli = Cli::try_parse_from([
            "storefront-cli",
            "--email",
            "a@b.c",
            "--password",
            "pw",
            "--expect-role",
            "Admin",
            "whoami",
        ])
        .unwrap();
        assert_eq!(cli.expect_role, Some(Role::Admin));
        assert!(matches!(cli.command, Command::Whoami));

        let bad = Cli::try_parse_from([
            "storefront-cli",
            "--email",
            "a@b.c",
            "--password",
            "pw",
            "--expect-role",
            "root",
            "whoami",
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn summary_reads_issued_claims() {
        let issuer = IssuerState::new(IssuerConfig::default());
        let pair = issuer.login(SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD).unwrap();
        let token = AccessToken::new(pair.access_token).unwrap();

        let summary = SessionSummary::from_token(&token, Utc::now()).unwrap();
        assert_eq!(summary.subject, pair.claims.sub);
        assert_eq!(summary.role, Role::Admin);
        assert_eq!(summary.expires_at.unwrap().timestamp(), pair.claims.exp);
        assert!(!summary.expired);
        assert!(summary.require_role(Role::Admin).is_ok());
        assert!(summary.require_role(Role::Customer).is_err());

        let later = summary.expires_at.unwrap();
        assert!(SessionSummary::from_token(&token, later).unwrap().expired);
    }

    #[test]
    fn summary_rejects_opaque_token() {
        let token = AccessToken::new("opaque").unwrap();
        assert!(SessionSummary::from_token(&token, Utc::now()).is_err());
    }

    #[test]
    fn command_error_wins_over_logout_error() {
        let err = finish(Err(anyhow::anyhow!("command")), Err(anyhow::anyhow!("logout")))
            .unwrap_err();
        assert_eq!(err.to_string(), "command");

        let err = finish(Ok(()), Err(anyhow::anyhow!("logout"))).unwrap_err();
        assert_eq!(err.to_string(), "logout");
        assert!(finish(Ok(()), Ok(())).is_ok());
    }

    async fn live_issuer() -> (Arc<IssuerState>, String) {
        let issuer = Arc::new(IssuerState::new(
            IssuerConfig::default().with_insecure_cookies(),
        ));
        let addr = serve_ephemeral(issuer.clone()).await.unwrap();
        (issuer, format!("http://{addr}"))
    }

    fn cli_for(api_url: &str, extra: &[&str]) -> Cli {
        let mut args = vec![
            "storefront-cli",
            "--api-url",
            api_url,
            "--email",
            SEED_CUSTOMER_EMAIL,
            "--password",
            SEED_CUSTOMER_PASSWORD,
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    async fn run(cli: &Cli) -> Result<()> {
        let config = ClientConfig::new(&cli.api_url).unwrap();
        let client = SessionClient::new(config).unwrap();
        run_session(&client, cli).await
    }

    #[tokio::test]
    async fn failed_command_still_logs_out() {
        let (issuer, url) = live_issuer().await;
        let cli = cli_for(&url, &["get", "/api/admin/dashboard"]);

        let err = run(&cli).await.unwrap_err();
        assert!(err.to_string().contains("/api/admin/dashboard"));
        assert_eq!(issuer.session_count(), 0);
    }

    #[tokio::test]
    async fn role_mismatch_stops_before_the_command() {
        let (issuer, url) = live_issuer().await;
        let cli = cli_for(&url, &["--expect-role", "admin", "get", "/api/cart"]);
        issuer.fail_path("/api/cart");

        let err = run(&cli).await.unwrap_err();
        assert!(err.to_string().contains("--expect-role is admin"));
        assert_eq!(issuer.session_count(), 0);
    }

    #[tokio::test]
    async fn successful_command_logs_out() {
        let (issuer, url) = live_issuer().await;
        let cli = cli_for(&url, &["--expect-role", "customer", "whoami"]);

        run(&cli).await.unwrap();
        assert_eq!(issuer.session_count(), 0);
        assert_eq!(issuer.refresh_calls(), 0);
    }

    #[test]
    fn report_classifies_outcomes() {
        let mut report = BurstReport::default();
        report.record(&Ok(serde_json::json!({})), Duration::from_millis(5));
        report.record(
            &Err(SdkError::Expired {
                path: "/api/cart".into(),
            }),
            Duration::from_millis(20),
        );
        report.record(
            &Err(SdkError::Config("boom".into())),
            Duration::from_millis(10),
        );

        assert_eq!((report.ok, report.expired, report.failed), (1, 1, 1));
        assert_eq!(report.percentile(0.5), 10);
        assert_eq!(report.percentile(1.0), 20);
        assert_eq!(BurstReport::default().percentile(0.5), 0);
    }
}
