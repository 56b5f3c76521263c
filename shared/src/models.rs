use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Event record as returned by the connpass search API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnpassEvent {
    #[serde(rename = "event_id", alias = "id")]
    pub event_id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub catch: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub place: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub address: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub accepted: Option<u32>,
    #[serde(default)]
    pub waiting: Option<u32>,
    #[serde(default)]
    pub owner_nickname: Option<String>,
    #[serde(default)]
    pub series: Option<EventSeries>,
}

/// Group that owns an event. Carried through but not used downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSeries {
    #[serde(default)]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Envelope of a connpass search response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results_returned: Option<u32>,
    #[serde(default)]
    pub results_available: Option<u32>,
    #[serde(default)]
    pub results_start: Option<u32>,
    #[serde(default)]
    pub events: Option<Vec<ConnpassEvent>>,
}

impl SearchResponse {
    /// Events in response order; a missing or null array is empty.
    pub fn into_events(self) -> Vec<ConnpassEvent> {
        self.events.unwrap_or_default()
    }
}

/// The API sends `""` for events without a venue.
fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Unused free-text fields sometimes arrive as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_with_optional_fields_missing() {
        let json = r#"{
            "event_id": 42,
            "title": "Rust meetup",
            "url": "https://example.connpass.com/event/42/",
            "started_at": "2024-01-20T19:00:00+09:00",
            "updated_at": "2024-01-10T12:00:00+09:00",
            "place": "",
            "limit": null
        }"#;

        let event: ConnpassEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_id, 42);
        assert_eq!(event.place, None);
        assert_eq!(event.limit, None);
        assert_eq!(event.accepted, None);
        assert_eq!(event.started_at.to_rfc3339(), "2024-01-20T10:00:00+00:00");
    }

    #[test]
    fn test_parse_event_accepts_id_alias() {
        let json = r#"{
            "id": 7,
            "title": "t",
            "url": "https://example.com/7",
            "started_at": "2024-01-20T19:00:00+09:00",
            "updated_at": "2024-01-10T12:00:00+09:00",
            "series": {"id": 1, "title": "group", "url": "https://example.com"}
        }"#;

        let event: ConnpassEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_id, 7);
        assert_eq!(event.series.unwrap().title, "group");
    }

    #[test]
    fn test_missing_or_null_events_array_is_empty() {
        let missing: SearchResponse = serde_json::from_str(r#"{"results_returned": 0}"#).unwrap();
        assert!(missing.into_events().is_empty());

        let null: SearchResponse = serde_json::from_str(r#"{"events": null}"#).unwrap();
        assert!(null.into_events().is_empty());
    }

    #[test]
    fn test_null_free_text_fields_do_not_fail_the_envelope() {
        let json = r#"{"events": [{
            "event_id": 3,
            "title": "t",
            "catch": null,
            "url": "https://example.com/3",
            "started_at": "2024-01-20T19:00:00+09:00",
            "updated_at": "2024-01-10T12:00:00+09:00",
            "owner_nickname": null,
            "series": {"id": 9, "title": null, "url": null}
        }]}"#;

        let events = serde_json::from_str::<SearchResponse>(json).unwrap().into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].catch, "");
        assert_eq!(events[0].series.as_ref().unwrap().title, "");
    }
}
