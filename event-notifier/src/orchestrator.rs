//! One notification run: search, filter, dedup, notify, record.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::{ConnpassEvent, Heading, MessageFormatter};

use crate::error::NotifierResult;
use crate::notifier::Notifier;
use crate::recency::filter_recently_updated;
use crate::search::EventSource;
use crate::seen::SeenEventStore;

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub keywords: usize,
    pub new_events: usize,
    pub already_recorded: usize,
    pub failed_keywords: Vec<String>,
}

impl RunSummary {
    /// Nothing was found, new or old
    pub fn is_empty(&self) -> bool {
        self.new_events == 0 && self.already_recorded == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "New events: {}, already recorded: {} ({} keyword(s) processed)",
            self.new_events, self.already_recorded, self.keywords
        )?;
        if !self.failed_keywords.is_empty() {
            write!(f, "\nFailed keywords: {}", self.failed_keywords.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct KeywordOutcome {
    new_events: usize,
    already_recorded: usize,
    /// Notified events that could not be recorded
    unrecorded: usize,
}

pub struct Orchestrator {
    source: Arc<dyn EventSource>,
    notifier: Arc<dyn Notifier>,
    formatter: MessageFormatter,
    window: chrono::Duration,
    delay: Duration,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn EventSource>,
        notifier: Arc<dyn Notifier>,
        formatter: MessageFormatter,
        window: chrono::Duration,
    ) -> Self {
        Self {
            source,
            notifier,
            formatter,
            window,
            delay: Duration::from_millis(1000),
        }
    }

    /// Pause inserted between consecutive keywords
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Process every keyword in order.
    ///
    /// Preparing the seen-store is fatal to the run; any other failure only
    /// skips the keyword it happened in.
    pub async fn run(
        &self,
        seen: &mut dyn SeenEventStore,
        keywords: &[String],
        now: DateTime<Utc>,
    ) -> NotifierResult<RunSummary> {
        seen.prepare(now)?;
        tracing::info!("Dedup store: {}", seen.describe());

        let mut summary = RunSummary::default();

        for (index, keyword) in keywords.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            summary.keywords += 1;
            match self.process_keyword(seen, keyword, now).await {
                Ok(outcome) => {
                    summary.new_events += outcome.new_events;
                    summary.already_recorded += outcome.already_recorded;
                    if outcome.unrecorded > 0 {
                        tracing::error!(
                            "Keyword \"{}\": {} notified event(s) were not recorded",
                            keyword,
                            outcome.unrecorded
                        );
                        summary.failed_keywords.push(keyword.clone());
                    }
                }
                Err(e) => {
                    tracing::error!("Keyword \"{}\" failed: {}", keyword, e);
                    summary.failed_keywords.push(keyword.clone());
                }
            }
        }

        if summary.is_empty() {
            tracing::info!("No recently updated events found; nothing was sent");
        }
        tracing::info!("{}", summary);

        Ok(summary)
    }

    async fn process_keyword(
        &self,
        seen: &mut dyn SeenEventStore,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> NotifierResult<KeywordOutcome> {
        tracing::info!("Searching events for \"{}\"", keyword);

        let events = self.source.search(keyword).await?;
        tracing::info!("\"{}\": {} event(s) returned", keyword, events.len());

        let recent = filter_recently_updated(events, now, self.window, self.formatter.timezone());
        tracing::info!("\"{}\": {} recently updated", keyword, recent.len());

        let mut outcome = KeywordOutcome::default();
        let mut fresh: Vec<ConnpassEvent> = Vec::new();

        for event in recent {
            if seen.check_seen(&event)? {
                tracing::info!("Already notified: \"{}\" ({})", event.title, event.url);
                outcome.already_recorded += 1;
            } else {
                fresh.push(event);
            }
        }

        if fresh.is_empty() {
            return Ok(outcome);
        }

        let message = self
            .formatter
            .format_events(&fresh, keyword, Heading::RecentlyUpdated(self.window));
        self.notifier.send(&message).await?;
        tracing::info!("Notified {} new event(s) for \"{}\"", fresh.len(), keyword);

        // The message is out; keep recording past individual failures
        outcome.new_events = fresh.len();
        for event in &fresh {
            if let Err(e) = seen.record(event, keyword, now) {
                tracing::error!("Failed to record \"{}\" ({}): {}", event.title, event.url, e);
                outcome.unrecorded += 1;
            }
        }

        Ok(outcome)
    }
}
