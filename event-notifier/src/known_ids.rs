use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use shared::ConnpassEvent;

use crate::error::NotifierResult;
use crate::seen::SeenEventStore;
use crate::store::PropertyStore;

/// Property key holding the comma-joined id list
pub const KNOWN_EVENT_IDS_PROPERTY: &str = "known_event_ids";

pub const DEFAULT_MAX_KNOWN_EVENT_IDS: usize = 1000;

/// Bounded FIFO list of event ids that have been seen.
pub struct KnownIdStore<P> {
    properties: P,
    cap: usize,
}

impl<P: PropertyStore> KnownIdStore<P> {
    pub fn new(properties: P, cap: usize) -> Self {
        Self {
            properties,
            cap: cap.max(1),
        }
    }

    /// Stored ids, oldest first. Unparsable entries are dropped.
    pub fn known_ids(&self) -> NotifierResult<VecDeque<i64>> {
        let raw = self
            .properties
            .get_property(KNOWN_EVENT_IDS_PROPERTY)?
            .unwrap_or_default();

        let mut ids = VecDeque::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match entry.parse::<i64>() {
                Ok(id) => ids.push_back(id),
                Err(_) => tracing::warn!("Ignoring malformed known event id '{}'", entry),
            }
        }
        Ok(ids)
    }

    /// Record `id` if it has not been seen. Returns true when it was new.
    ///
    /// Check and insert happen in one call, so an id counts as seen from its
    /// first evaluation on.
    pub fn is_new(&mut self, id: i64) -> NotifierResult<bool> {
        let mut ids = self.known_ids()?;
        if ids.contains(&id) {
            return Ok(false);
        }

        ids.push_back(id);
        while ids.len() > self.cap {
            ids.pop_front();
        }

        let joined = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.properties
            .set_property(KNOWN_EVENT_IDS_PROPERTY, &joined)?;

        Ok(true)
    }
}

impl<P: PropertyStore> SeenEventStore for KnownIdStore<P> {
    fn prepare(&mut self, _now: DateTime<Utc>) -> NotifierResult<()> {
        let count = self.known_ids()?.len();
        tracing::debug!("Known event ids: {} (cap {})", count, self.cap);
        Ok(())
    }

    fn check_seen(&mut self, event: &ConnpassEvent) -> NotifierResult<bool> {
        Ok(!self.is_new(event.event_id)?)
    }

    // Ids are stored by check_seen
    fn record(
        &mut self,
        _event: &ConnpassEvent,
        _keyword: &str,
        _now: DateTime<Utc>,
    ) -> NotifierResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("known event ids (cap {})", self.cap)
    }
}
