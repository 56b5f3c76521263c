//! Rendering of events into notification text.
//!
//! Everything here is pure: the caller supplies the display timezone and
//! the per-message limit, and gets a string back.

use chrono::Duration;
use chrono_tz::Tz;

use crate::models::ConnpassEvent;

/// Maximum number of events rendered into one message
pub const DEFAULT_MAX_EVENTS_PER_MESSAGE: usize = 5;

/// Display format for event start times
pub const START_TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// What the header line of a multi-event message says about the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    /// Events updated inside a trailing window
    RecentlyUpdated(Duration),
    /// Unfiltered search results
    AllResults,
}

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    timezone: Tz,
    max_events: usize,
}

impl MessageFormatter {
    pub fn new(timezone: Tz, max_events: usize) -> Self {
        Self {
            timezone,
            max_events: max_events.max(1),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Render one event: title, start, place, participants, url.
    pub fn format_event(&self, event: &ConnpassEvent) -> String {
        let start = event
            .started_at
            .with_timezone(&self.timezone)
            .format(START_TIME_FORMAT);

        let mut lines = vec![format!("📅 {}", event.title), format!("🕐 {}", start)];

        if let Some(place) = &event.place {
            lines.push(format!("📍 {}", place));
        }

        if let (Some(accepted), Some(limit)) = (event.accepted, event.limit) {
            lines.push(format!("👥 Participants: {}/{}", accepted, limit));
        }

        lines.push(format!("🔗 {}", event.url));
        lines.join("\n")
    }

    /// Render a batch of events for one keyword into a single message.
    pub fn format_events(&self, events: &[ConnpassEvent], keyword: &str, heading: Heading) -> String {
        if events.is_empty() {
            return not_found_message(keyword, heading);
        }

        let header = match heading {
            Heading::RecentlyUpdated(window) => format!(
                "🔍 Results for \"{}\" (updated in the last {}: {})",
                keyword,
                describe_window(window),
                events.len()
            ),
            Heading::AllResults => {
                format!("🔍 Results for \"{}\" (all results: {})", keyword, events.len())
            }
        };

        let entries: Vec<String> = events
            .iter()
            .take(self.max_events)
            .enumerate()
            .map(|(index, event)| format!("{}. {}", index + 1, self.format_event(event)))
            .collect();

        let mut message = format!("{}\n\n{}", header, entries.join("\n\n"));

        let remaining = events.len().saturating_sub(self.max_events);
        if remaining > 0 {
            let noun = if remaining == 1 { "event" } else { "events" };
            message.push_str(&format!("\n\n...and {} more {}.", remaining, noun));
        }

        message
    }
}

fn not_found_message(keyword: &str, heading: Heading) -> String {
    match heading {
        Heading::RecentlyUpdated(window) => format!(
            "No events updated in the last {} were found for \"{}\".",
            describe_window(window),
            keyword
        ),
        Heading::AllResults => format!("🔍 Results for \"{}\": no events found.", keyword),
    }
}

/// Human wording for a window, e.g. "1 hour", "90 minutes".
pub fn describe_window(window: Duration) -> String {
    let minutes = window.num_minutes();
    if minutes > 0 && minutes % 60 == 0 {
        match minutes / 60 {
            1 => "1 hour".to_string(),
            hours => format!("{} hours", hours),
        }
    } else if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}
