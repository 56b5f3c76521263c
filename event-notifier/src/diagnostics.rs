//! Operator commands that check the setup without running a notification pass.

use std::path::Path;

use chrono::{DateTime, Utc};
use shared::{describe_window, Heading, MessageFormatter};

use crate::config::{DedupStrategy, NotifierConfig};
use crate::error::NotifierResult;
use crate::ledger::BucketKey;
use crate::notifier::{validate_token_format, Notifier};
use crate::search::EventSource;
use crate::settings::Credentials;

pub const TEST_MESSAGE: &str = "✅ Connection test: the messaging channel is reachable.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub keyword: String,
    pub events_found: usize,
    pub events_sent: usize,
}

/// Send a test message, then the unfiltered results for the first keyword.
pub async fn test_connection(
    source: &dyn EventSource,
    notifier: &dyn Notifier,
    formatter: &MessageFormatter,
    credentials: &Credentials,
) -> NotifierResult<ConnectionReport> {
    validate_token_format(&credentials.messaging_token)?;

    notifier.send(TEST_MESSAGE).await?;
    tracing::info!("Test message sent");

    // Credentials always carry at least one keyword
    let keyword = credentials.keywords.first().cloned().unwrap_or_default();
    let events = source.search(&keyword).await?;
    tracing::info!("\"{}\": {} event(s) found", keyword, events.len());

    let message = formatter.format_events(&events, &keyword, Heading::AllResults);
    notifier.send(&message).await?;

    Ok(ConnectionReport {
        keyword,
        events_found: events.len(),
        events_sent: events.len().min(formatter.max_events()),
    })
}

/// Human-readable summary of the resolved configuration. Secrets are
/// reported by length only.
pub fn config_report(
    config_path: &Path,
    config: &NotifierConfig,
    credentials: &NotifierResult<Credentials>,
    now: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        format!("Config file:        {}", config_path.display()),
        format!("Workbook directory: {}", config.workbook_dir.display()),
        format!(
            "Settings sheet:     {} (schema {:?})",
            config.settings.sheet, config.settings.schema_version
        ),
        format!("Events API:         {}", config.events_api_url),
        format!("Messaging API:      {}", config.messaging_api_url),
    ];

    let dedup = match config.dedup.strategy {
        DedupStrategy::Ledger => "monthly ledger".to_string(),
        DedupStrategy::KnownIds => format!(
            "known event ids in {} (cap {})",
            config.dedup.properties_path.display(),
            config.dedup.max_known_event_ids
        ),
    };
    lines.push(format!("Dedup strategy:     {}", dedup));
    lines.push(format!(
        "Recency window:     {}",
        describe_window(config.recency_window())
    ));
    lines.push(format!("Keyword delay:      {} ms", config.api_call_delay_ms));

    match config.display_timezone() {
        Ok(tz) => {
            lines.push(format!("Timezone:           {}", config.timezone));
            lines.push(format!(
                "Current bucket:     {}",
                BucketKey::from_instant(now, tz)
            ));
        }
        Err(e) => lines.push(format!("Timezone:           invalid ({})", e)),
    }

    match credentials {
        Ok(creds) => {
            let verdict = match validate_token_format(&creds.messaging_token) {
                Ok(()) => "valid".to_string(),
                Err(e) => format!("invalid: {}", e),
            };
            lines.push(format!("Keywords:           {}", creds.keywords.join(", ")));
            lines.push(format!("API key:            {} characters", creds.api_key.len()));
            lines.push(format!(
                "Messaging token:    {} characters",
                creds.messaging_token.len()
            ));
            lines.push(format!("Token format:       {}", verdict));
        }
        Err(e) => lines.push(format!("Credentials:        {}", e)),
    }

    lines.join("\n")
}
