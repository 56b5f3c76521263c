use chrono::{DateTime, Utc};
use shared::ConnpassEvent;

use crate::error::NotifierResult;

/// Remembers which events have already been notified.
///
/// Implemented by the month-bucketed [`Ledger`](crate::ledger::Ledger) and the
/// bounded [`KnownIdStore`](crate::known_ids::KnownIdStore). A deployment uses
/// exactly one of them.
pub trait SeenEventStore {
    /// Called once per run before any keyword is processed.
    fn prepare(&mut self, now: DateTime<Utc>) -> NotifierResult<()>;

    /// Whether `event` was notified before. May record the event as a side
    /// effect for stores that combine check and insert.
    fn check_seen(&mut self, event: &ConnpassEvent) -> NotifierResult<bool>;

    /// Record an event after it has been notified.
    fn record(
        &mut self,
        event: &ConnpassEvent,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> NotifierResult<()>;

    /// Short description for logs and the `check-config` report
    fn describe(&self) -> String;
}
