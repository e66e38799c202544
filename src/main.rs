use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod completion;
mod dashboard;
mod error;
mod google;
mod leaderboard;
mod models;
mod report;
mod scan;
mod scorer;
mod sheets;
mod supervisor;
#[cfg(test)]
mod testing;

use auth::{ServiceAccountKey, TokenProvider};
use completion::OpenAIClient;
use google::GoogleSheetsClient;
use scorer::RubricScorer;
use sheets::SpreadsheetBackend;

#[derive(Parser)]
#[command(name = "sheet-rubric-scorer")]
#[command(about = "Scores form responses in a spreadsheet against a rubric and keeps a team dashboard", long_about = None)]
struct Cli {
    #[command(flatten)]
    sheets: SheetsArgs,

    #[command(flatten)]
    scoring: ScoringArgs,

    /// Seconds between scans
    #[arg(long, env = "SCAN_INTERVAL_SECS", default_value_t = 30, global = true)]
    interval_secs: u64,

    /// Defaults to `run`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SheetsArgs {
    /// Spreadsheet holding the form responses
    #[arg(long, env = "SPREADSHEET_ID", global = true)]
    spreadsheet_id: Option<String>,

    /// Service-account key file
    #[arg(
        long,
        env = "GOOGLE_APPLICATION_CREDENTIALS",
        default_value = "credentials.json",
        global = true
    )]
    credentials: PathBuf,

    /// Pre-issued OAuth access token; skips the key file when set
    #[arg(long, env = "SHEETS_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    #[arg(
        long,
        env = "SHEETS_BASE_URL",
        default_value = google::DEFAULT_SHEETS_BASE_URL,
        global = true
    )]
    sheets_base_url: String,

    /// Per-request timeout for both backends
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 60, global = true)]
    http_timeout_secs: u64,
}

#[derive(Args)]
struct ScoringArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    #[arg(
        long,
        env = "OPENAI_MODEL",
        default_value = completion::DEFAULT_MODEL,
        global = true
    )]
    model: String,

    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = completion::DEFAULT_OPENAI_BASE_URL,
        global = true
    )]
    openai_base_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity, write headers, rebuild the dashboard, then scan forever
    Run,
    /// Verify the spreadsheet is reachable
    Check,
    /// Write the score column headers and first total formula
    Headers,
    /// Rebuild the dashboard sheet once
    Dashboard,
    /// Score any unscored answers once
    Scan,
    /// Write a markdown leaderboard computed from the response sheet
    Report {
        #[arg(long, default_value = "leaderboard.md")]
        out: PathBuf,
    },
}

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

fn sheets_client(
    args: &SheetsArgs,
    http: reqwest::Client,
) -> anyhow::Result<Arc<dyn SpreadsheetBackend>> {
    let spreadsheet_id = args
        .spreadsheet_id
        .clone()
        .context("SPREADSHEET_ID must be set to the target spreadsheet")?;
    let tokens = match &args.access_token {
        Some(token) => TokenProvider::static_token(token.clone()),
        None => {
            let key = ServiceAccountKey::from_file(&args.credentials)?;
            TokenProvider::service_account(key, http.clone())
        }
    };
    let client = GoogleSheetsClient::new(&args.sheets_base_url, spreadsheet_id, tokens, http)?;
    Ok(Arc::new(client))
}

fn rubric_scorer(args: ScoringArgs, http: reqwest::Client) -> anyhow::Result<RubricScorer> {
    let api_key = args
        .openai_api_key
        .context("OPENAI_API_KEY must be set to score responses")?;
    let client = OpenAIClient::new(args.model, api_key, args.openai_base_url, http);
    Ok(RubricScorer::new(Arc::new(client)))
}

async fn run(
    sheets: &dyn SpreadsheetBackend,
    scorer: &RubricScorer,
    interval: Duration,
) -> anyhow::Result<()> {
    supervisor::check_connection(sheets)
        .await
        .context("error connecting to the spreadsheet")?;

    if let Err(e) = supervisor::ensure_headers(sheets).await {
        tracing::error!(error = %e, "Error adding headers");
    }
    if let Err(e) = dashboard::build_dashboard(sheets).await {
        tracing::error!(error = %e, "Error setting up dashboard");
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    supervisor::run_loop(sheets, scorer, interval, &cancel).await?;
    Ok(())
}

/// Cancel `cancel` on the first ctrl-c. The listener lives for the whole
/// run so a signal during a scan or backoff is not lost.
async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
            cancel.cancel();
        }
        Err(e) => tracing::error!(error = %e, "Failed to install Ctrl-C handler"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_rubric_scorer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let http = http_client(cli.sheets.http_timeout_secs)?;
    let sheets = sheets_client(&cli.sheets, http.clone())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let scorer = rubric_scorer(cli.scoring, http)?;
            let interval = Duration::from_secs(cli.interval_secs.max(1));
            run(sheets.as_ref(), &scorer, interval).await?;
        }
        Commands::Check => {
            let header = supervisor::check_connection(sheets.as_ref()).await?;
            println!("Connected. Header row: {}", header.join(", "));
        }
        Commands::Headers => {
            supervisor::ensure_headers(sheets.as_ref()).await?;
            println!("Headers written.");
        }
        Commands::Dashboard => {
            let summary = dashboard::build_dashboard(sheets.as_ref()).await?;
            println!(
                "Dashboard rebuilt for {} teams (sheet id {}{}).",
                summary.teams,
                summary.sheet_id,
                if summary.created { ", created" } else { "" }
            );
        }
        Commands::Scan => {
            let scorer = rubric_scorer(cli.scoring, http)?;
            let report = scan::run_scan(sheets.as_ref(), &scorer).await?;
            println!(
                "Scored {} answers across {} rows ({} failed writes).",
                report.scored, report.rows_seen, report.failed_writes
            );
        }
        Commands::Report { out } => {
            let table = sheets.read_range(&scan::responses_range()).await?;
            let board = leaderboard::compute_leaderboard(&models::data_rows(table));
            let report = report::build_report(&board, chrono::Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Leaderboard written to {}.", out.display());
        }
    }

    Ok(())
}
