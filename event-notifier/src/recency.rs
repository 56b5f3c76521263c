use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use shared::ConnpassEvent;

const LOG_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Keep events whose `updated_at` lies in `[now - window, now]`.
///
/// The comparison is on absolute instants; `timezone` only affects the log
/// lines. Input order is preserved.
pub fn filter_recently_updated(
    events: Vec<ConnpassEvent>,
    now: DateTime<Utc>,
    window: Duration,
    timezone: Tz,
) -> Vec<ConnpassEvent> {
    let since = now - window;

    tracing::debug!(
        "Recency window: {} - {}",
        since.with_timezone(&timezone).format(LOG_TIME_FORMAT),
        now.with_timezone(&timezone).format(LOG_TIME_FORMAT)
    );

    events
        .into_iter()
        .filter(|event| {
            let recent = event.updated_at >= since && event.updated_at <= now;
            if recent {
                tracing::debug!(
                    "  Candidate: \"{}\" (updated {})",
                    event.title,
                    event.updated_at.with_timezone(&timezone).format(LOG_TIME_FORMAT)
                );
            }
            recent
        })
        .collect()
}
