use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::settings::SchemaVersion;

/// Longest accepted recency window (one year)
pub const MAX_RECENCY_WINDOW_MINUTES: u64 = 525_600;

/// Operational settings for the notifier.
///
/// Read from an optional TOML file, then overridden by
/// `EVENT_NOTIFIER__*` environment variables (`__` separates nested keys,
/// e.g. `EVENT_NOTIFIER__DEDUP__STRATEGY=known_ids`). Credentials are not
/// part of this file; they live in the settings sheet of the workbook.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// connpass search endpoint
    #[serde(default = "default_events_api_url")]
    pub events_api_url: String,

    /// Messaging broadcast endpoint
    #[serde(default = "default_messaging_api_url")]
    pub messaging_api_url: String,

    /// Directory holding the settings sheet and the monthly ledger sheets
    #[serde(default = "default_workbook_dir")]
    pub workbook_dir: PathBuf,

    #[serde(default)]
    pub settings: SettingsSheetConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    /// Only events updated within this many minutes are notified
    #[serde(default = "default_recency_window_minutes")]
    pub recency_window_minutes: u64,

    /// IANA zone used for bucket keys and displayed times
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Pause between keywords (milliseconds)
    #[serde(default = "default_api_call_delay_ms")]
    pub api_call_delay_ms: u64,

    #[serde(default = "default_max_events_per_message")]
    pub max_events_per_message: usize,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSheetConfig {
    /// Sheet name inside the workbook
    #[serde(default = "default_settings_sheet")]
    pub sheet: String,

    /// Cell layout revision of the settings sheet
    #[serde(default = "default_schema_version")]
    pub schema_version: SchemaVersion,
}

impl Default for SettingsSheetConfig {
    fn default() -> Self {
        Self {
            sheet: default_settings_sheet(),
            schema_version: default_schema_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Month-bucketed ledger sheets keyed by event URL
    Ledger,
    /// Bounded list of event ids in the property store
    KnownIds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_strategy")]
    pub strategy: DedupStrategy,

    /// JSON property file used by the known-id strategy
    #[serde(default = "default_properties_path")]
    pub properties_path: PathBuf,

    #[serde(default = "default_max_known_event_ids")]
    pub max_known_event_ids: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            strategy: default_dedup_strategy(),
            properties_path: default_properties_path(),
            max_known_event_ids: default_max_known_event_ids(),
        }
    }
}

fn default_events_api_url() -> String {
    "https://connpass.com/api/v2/events/".to_string()
}

fn default_messaging_api_url() -> String {
    "https://api.line.me/v2/bot/message/broadcast".to_string()
}

fn default_workbook_dir() -> PathBuf {
    PathBuf::from("./workbook")
}

fn default_settings_sheet() -> String {
    "settings".to_string()
}

fn default_schema_version() -> SchemaVersion {
    SchemaVersion::V1
}

fn default_dedup_strategy() -> DedupStrategy {
    DedupStrategy::Ledger
}

fn default_properties_path() -> PathBuf {
    PathBuf::from("./workbook/properties.json")
}

fn default_max_known_event_ids() -> usize {
    crate::known_ids::DEFAULT_MAX_KNOWN_EVENT_IDS
}

fn default_recency_window_minutes() -> u64 {
    60
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_api_call_delay_ms() -> u64 {
    1000
}

fn default_max_events_per_message() -> usize {
    shared::DEFAULT_MAX_EVENTS_PER_MESSAGE
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            events_api_url: default_events_api_url(),
            messaging_api_url: default_messaging_api_url(),
            workbook_dir: default_workbook_dir(),
            settings: SettingsSheetConfig::default(),
            dedup: DedupConfig::default(),
            recency_window_minutes: default_recency_window_minutes(),
            timezone: default_timezone(),
            api_call_delay_ms: default_api_call_delay_ms(),
            max_events_per_message: default_max_events_per_message(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl NotifierConfig {
    /// Load from `path` (missing file is fine) plus environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("EVENT_NOTIFIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let config: NotifierConfig = settings
            .try_deserialize()
            .context("Invalid notifier configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.display_timezone()?;

        if self.recency_window_minutes == 0 {
            anyhow::bail!("recency_window_minutes must be at least 1");
        }
        if self.recency_window_minutes > MAX_RECENCY_WINDOW_MINUTES {
            anyhow::bail!(
                "recency_window_minutes must be at most {}",
                MAX_RECENCY_WINDOW_MINUTES
            );
        }
        if self.max_events_per_message == 0 {
            anyhow::bail!("max_events_per_message must be at least 1");
        }
        if self.dedup.max_known_event_ids == 0 {
            anyhow::bail!("dedup.max_known_event_ids must be at least 1");
        }
        if self.events_api_url.trim().is_empty() || self.messaging_api_url.trim().is_empty() {
            anyhow::bail!("events_api_url and messaging_api_url cannot be empty");
        }

        Ok(())
    }

    pub fn display_timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone '{}': {}", self.timezone, e))
    }

    /// Clamped to [`MAX_RECENCY_WINDOW_MINUTES`] for unvalidated configs.
    pub fn recency_window(&self) -> chrono::Duration {
        let minutes = self.recency_window_minutes.min(MAX_RECENCY_WINDOW_MINUTES);
        chrono::Duration::minutes(i64::try_from(minutes).unwrap_or(i64::MAX / 60_000))
    }

    pub fn api_call_delay(&self) -> Duration {
        Duration::from_millis(self.api_call_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
