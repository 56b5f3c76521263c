mod config;
mod diagnostics;
mod error;
mod known_ids;
mod ledger;
mod notifier;
mod orchestrator;
mod recency;
mod search;
mod seen;
mod settings;
mod store;
#[cfg(test)]
mod stub_server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use reqwest::Client;
use shared::MessageFormatter;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::{DedupStrategy, NotifierConfig};
use crate::known_ids::KnownIdStore;
use crate::ledger::Ledger;
use crate::notifier::LineNotifier;
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::search::ConnpassClient;
use crate::settings::{load_credentials, Credentials};
use crate::store::{CsvWorkbook, JsonPropertyStore};

#[derive(Parser)]
#[command(name = "event-notifier")]
#[command(about = "Notify a messaging channel about recently updated connpass events")]
#[command(
    long_about = "Searches connpass for the keywords in the settings sheet, keeps events \
    updated within the recency window, skips the ones already notified and broadcasts \
    the rest.\n\nMeant to be run periodically (cron, systemd timer). Runs must not overlap."
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// A missing file is fine; defaults and EVENT_NOTIFIER__* environment
    /// variables are used instead.
    #[arg(
        short,
        long,
        global = true,
        default_value = "event-notifier.toml",
        env = "EVENT_NOTIFIER_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run one notification pass (default)
    Run,

    /// Send a test message and the unfiltered results for the first keyword
    ///
    /// Validates the token format first and aborts without sending if it
    /// looks malformed.
    TestConnection,

    /// Print the resolved configuration and credential status
    ///
    /// Secrets are shown by length only.
    CheckConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_notifier=info,shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
            run(&cli.config).instrument(span).await
        }
        Commands::TestConnection => test_connection(&cli.config).await,
        Commands::CheckConfig => check_config(&cli.config),
    };

    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }

    result
}

struct Session {
    config: NotifierConfig,
    workbook: CsvWorkbook,
    credentials: Credentials,
    formatter: MessageFormatter,
    http: Client,
}

/// Load configuration and credentials. Nothing touches the network before
/// this succeeds.
fn open_session(config_path: &Path) -> Result<Session> {
    let config = NotifierConfig::load(config_path)?;
    let timezone = config.display_timezone()?;

    let workbook = CsvWorkbook::new(&config.workbook_dir);
    tracing::debug!("Workbook: {}", workbook.dir().display());

    let credentials = load_credentials(
        &workbook,
        &config.settings.sheet,
        &config.settings.schema_version.layout(),
    )
    .context("Failed to load settings")?;
    tracing::info!("Loaded settings: {:?}", credentials);

    let http = Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let formatter = MessageFormatter::new(timezone, config.max_events_per_message);

    Ok(Session {
        config,
        workbook,
        credentials,
        formatter,
        http,
    })
}

async fn run(config_path: &Path) -> Result<()> {
    let Session {
        config,
        workbook,
        credentials,
        formatter,
        http,
    } = open_session(config_path)?;

    tracing::info!("Starting notification run");

    let timezone = formatter.timezone();
    let source = Arc::new(ConnpassClient::new(
        http.clone(),
        &config.events_api_url,
        &credentials.api_key,
    ));
    let notifier = Arc::new(LineNotifier::new(
        http,
        &config.messaging_api_url,
        &credentials.messaging_token,
    ));
    let orchestrator = Orchestrator::new(source, notifier, formatter, config.recency_window())
        .with_delay(config.api_call_delay());

    let now = Utc::now();
    let summary: RunSummary = match config.dedup.strategy {
        DedupStrategy::Ledger => {
            let mut ledger = Ledger::new(workbook, timezone);
            orchestrator
                .run(&mut ledger, &credentials.keywords, now)
                .await
                .context("Failed to prepare the notification ledger")?
        }
        DedupStrategy::KnownIds => {
            let properties = JsonPropertyStore::open(&config.dedup.properties_path)
                .context("Failed to open the property store")?;
            tracing::debug!("Property store: {}", properties.path().display());
            let mut known = KnownIdStore::new(properties, config.dedup.max_known_event_ids);
            orchestrator
                .run(&mut known, &credentials.keywords, now)
                .await
                .context("Failed to prepare the known event id store")?
        }
    };

    println!("{}", summary);
    Ok(())
}

async fn test_connection(config_path: &Path) -> Result<()> {
    let session = open_session(config_path)?;

    let source = ConnpassClient::new(
        session.http.clone(),
        &session.config.events_api_url,
        &session.credentials.api_key,
    );
    let notifier = LineNotifier::new(
        session.http.clone(),
        &session.config.messaging_api_url,
        &session.credentials.messaging_token,
    );

    let report = diagnostics::test_connection(
        &source,
        &notifier,
        &session.formatter,
        &session.credentials,
    )
    .await
    .context("Connection test failed")?;

    println!(
        "Connection test succeeded: {} event(s) found for \"{}\", {} sent.",
        report.events_found, report.keyword, report.events_sent
    );
    Ok(())
}

fn check_config(config_path: &Path) -> Result<()> {
    let config = NotifierConfig::load(config_path)?;
    let workbook = CsvWorkbook::new(&config.workbook_dir);
    let credentials = load_credentials(
        &workbook,
        &config.settings.sheet,
        &config.settings.schema_version.layout(),
    );

    println!(
        "{}",
        diagnostics::config_report(config_path, &config, &credentials, Utc::now())
    );

    credentials
        .map(|_| ())
        .context("Settings sheet is incomplete")
}
