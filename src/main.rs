mod driver;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use recal_core::config::AppConfig;
use recal_core::{CancelFlag, CleanupOutcome, Engine, RunOutcome, RunPace};
use recal_google::{GoogleCalendar, Session, SessionData};
use recal_ledger::LedgerClient;

#[derive(Parser)]
#[command(name = "recal")]
#[command(about = "Reconcile ledger scheduling records with Google Calendar")]
struct Cli {
    /// Print outcomes as JSON instead of colored text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process unprocessed ledger records against the calendar
    Sync {
        /// Insert the inter-record delay used during bulk population
        #[arg(long)]
        bulk: bool,
    },
    /// Compare all records (including processed) against calendar state
    /// and detach records whose events were deleted or changed externally
    FullSync,
    /// Remove duplicate events from the calendar
    Dedupe,
    /// Run sync periodically until interrupted
    Watch {
        /// Interval between runs (e.g. "10m", "1h")
        #[arg(long, default_value = "10m")]
        every: String,
    },
    /// Store a provisioned Google access token for an account
    Auth {
        /// Account the token belongs to
        account: String,
        /// Token lifetime (e.g. "55m"); omit if the token does not expire
        #[arg(long)]
        expires_in: Option<String>,
    },
}

/// The concrete engine the CLI drives.
type CliEngine = Engine<LedgerClient, GoogleCalendar<Session>>;

struct Runtime {
    engine: CliEngine,
    calendar_id: String,
    calendar_key: Option<String>,
    cancel: CancelFlag,
}

fn build_runtime() -> Result<Runtime> {
    let config = AppConfig::load().context("failed to load configuration")?;
    let cancel = CancelFlag::new();

    let session = Session::load(&config.calendar.account)?;
    let calendar = GoogleCalendar::new(session, &config.engine)?;
    let ledger = LedgerClient::new(&config.ledger, &config.engine)?;
    let engine = Engine::new(ledger, calendar, config.engine, cancel.clone());

    Ok(Runtime {
        engine,
        calendar_id: config.calendar.calendar_id,
        calendar_key: config.calendar.calendar_key,
        cancel,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Commands::Auth {
        account,
        expires_in,
    } = &cli.command
    {
        return auth(account, expires_in.as_deref());
    }

    let runtime = build_runtime()?;
    driver::install_ctrl_c(runtime.cancel.clone());

    match cli.command {
        Commands::Sync { bulk } => {
            let pace = if bulk {
                RunPace::Bulk
            } else {
                RunPace::Incremental
            };
            let outcome = runtime
                .engine
                .run(&runtime.calendar_id, runtime.calendar_key.as_deref(), pace)
                .await?;
            render_outcome(&outcome, cli.json);
            if !outcome.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::FullSync => {
            let outcome = runtime.engine.full_sync(&runtime.calendar_id).await?;
            render_outcome(&outcome, cli.json);
            if !outcome.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::Dedupe => {
            let outcome = runtime
                .engine
                .remove_duplicates(&runtime.calendar_id)
                .await?;
            render_cleanup(&outcome, cli.json);
            if !outcome.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::Watch { every } => {
            let every = humantime::parse_duration(&every)
                .with_context(|| format!("invalid interval: {every}"))?;
            driver::watch(&runtime, every, cli.json).await?;
        }
        Commands::Auth { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Store an externally-provisioned access token. Acquiring and refreshing
/// tokens is not this tool's job; it only keeps what it is given.
fn auth(account: &str, expires_in: Option<&str>) -> Result<()> {
    let expires_at = match expires_in {
        Some(text) => {
            let ttl = humantime::parse_duration(text)
                .with_context(|| format!("invalid --expires-in: {text}"))?;
            Some(Utc::now() + chrono::Duration::from_std(ttl)?)
        }
        None => None,
    };

    eprintln!("Paste the access token for {account}:");
    let mut token = String::new();
    std::io::stdin().read_line(&mut token)?;
    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("no token provided");
    }

    let session = Session::new(
        account,
        SessionData {
            access_token: token,
            refresh_token: None,
            expires_at,
        },
    );
    session.save()?;

    println!("Stored session for {}", account.bold());
    Ok(())
}

pub fn render_outcome(outcome: &RunOutcome, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(outcome).unwrap_or_default()
        );
        return;
    }

    println!(
        "{} added, {} updated, {} unchanged, {} failed",
        outcome.added.len().green(),
        outcome.updated.len().yellow(),
        outcome.unchanged.len().dimmed(),
        outcome.failed.len().red(),
    );
    for id in &outcome.failed {
        println!("  {} {}", "failed:".red(), id);
    }
}

pub fn render_cleanup(outcome: &CleanupOutcome, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(outcome).unwrap_or_default()
        );
        return;
    }

    println!(
        "{} duplicates removed, {} records reset, {} failed",
        outcome.removed.len().green(),
        outcome.reset.len().yellow(),
        outcome.failed.len().red(),
    );
    for id in &outcome.failed {
        println!("  {} {}", "failed:".red(), id);
    }
}
