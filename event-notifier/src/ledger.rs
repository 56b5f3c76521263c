//! Month-bucketed notification ledger.
//!
//! Every calendar month gets its own sheet named `YYYYMM`. A bucket is
//! created on first use and seeded with the rows of the previous month
//! whose start date falls in the new month.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use shared::ConnpassEvent;

use crate::error::{NotifierError, NotifierResult};
use crate::seen::SeenEventStore;
use crate::store::{SheetStore, StoreError};

pub const LEDGER_HEADER: [&str; 5] = ["title", "started_at", "url", "notified_at", "keyword"];

pub const STARTED_AT_FORMAT: &str = "%Y/%m/%d %H:%M";
pub const NOTIFIED_AT_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

const TITLE_COLUMN: usize = 0;
const STARTED_AT_COLUMN: usize = 1;
const URL_COLUMN: usize = 2;
const NOTIFIED_AT_COLUMN: usize = 3;
const KEYWORD_COLUMN: usize = 4;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const NAIVE_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Year and month identifying one bucket, rendered as `YYYYMM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    year: i32,
    month: u32,
}

impl BucketKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Key of the month containing `now` in `timezone`.
    pub fn from_instant(now: DateTime<Utc>, timezone: Tz) -> Self {
        let local = now.with_timezone(&timezone);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// The calendar month before this one; January wraps to December.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for BucketKey {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NotifierError::data(format!("'{}' is not a YYYYMM bucket key", s));

        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = s[..4].parse().map_err(|_| invalid())?;
        let month = s[4..].parse().map_err(|_| invalid())?;

        BucketKey::new(year, month).ok_or_else(invalid)
    }
}

/// A resolved bucket for the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub key: BucketKey,
    /// True when this run created the sheet
    pub created: bool,
    /// Rows copied from the previous bucket on creation
    pub carried_over: usize,
}

impl Bucket {
    pub fn sheet_name(&self) -> String {
        self.key.to_string()
    }
}

pub struct Ledger<S> {
    store: S,
    timezone: Tz,
    current: Option<Bucket>,
}

impl<S: SheetStore> Ledger<S> {
    pub fn new(store: S, timezone: Tz) -> Self {
        Self {
            store,
            timezone,
            current: None,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the bucket for `now`, creating and seeding it if needed.
    pub fn resolve_or_create_bucket(&mut self, now: DateTime<Utc>) -> NotifierResult<Bucket> {
        let key = BucketKey::from_instant(now, self.timezone);
        let name = key.to_string();

        if self.store.sheet_exists(&name)? {
            tracing::debug!("Using existing ledger bucket {}", name);
            return Ok(Bucket {
                key,
                created: false,
                carried_over: 0,
            });
        }

        self.store.create_sheet(&name, &LEDGER_HEADER)?;
        tracing::info!("Created ledger bucket {}", name);

        let carried_over = self.carry_forward(key.previous(), key)?;

        Ok(Bucket {
            key,
            created: true,
            carried_over,
        })
    }

    /// Copy rows of `from` whose start date lies in `to`'s month into `to`.
    ///
    /// Rows are appended without a URL check; `to` is always freshly created
    /// when this runs. Returns the number of copied rows.
    fn carry_forward(&mut self, from: BucketKey, to: BucketKey) -> NotifierResult<usize> {
        let from_name = from.to_string();
        let to_name = to.to_string();

        if !self.store.sheet_exists(&from_name)? {
            tracing::debug!("No previous bucket {}, nothing to carry over", from_name);
            return Ok(0);
        }

        let rows = self.store.rows(&from_name)?;
        if rows.len() <= 1 {
            tracing::debug!("Previous bucket {} has no data rows", from_name);
            return Ok(0);
        }

        let mut copied = 0;
        for (index, row) in rows.iter().enumerate().skip(1) {
            let started_at = field(row, STARTED_AT_COLUMN);

            let start_date = match parse_start_date(started_at, self.timezone) {
                Ok(date) => date,
                Err(e) => {
                    tracing::warn!(
                        "Skipping row {} of bucket {} during carry-over: {}",
                        index + 1,
                        from_name,
                        e
                    );
                    continue;
                }
            };

            if !to.contains(start_date) {
                continue;
            }

            let notified_at = format!(
                "{} (carried over from {})",
                field(row, NOTIFIED_AT_COLUMN),
                from_name
            );
            let carried = vec![
                field(row, TITLE_COLUMN).to_string(),
                started_at.to_string(),
                field(row, URL_COLUMN).to_string(),
                notified_at,
                field(row, KEYWORD_COLUMN).to_string(),
            ];
            self.store.append_row(&to_name, &carried)?;
            copied += 1;

            tracing::debug!("Carried over \"{}\" into {}", field(row, TITLE_COLUMN), to_name);
        }

        if copied > 0 {
            tracing::info!("Carried over {} event(s) from {} into {}", copied, from_name, to_name);
        }

        Ok(copied)
    }

    /// Whether `url` appears in the URL column of `bucket`'s data rows.
    pub fn is_already_recorded(&self, url: &str, bucket: &Bucket) -> NotifierResult<bool> {
        let rows = self.store.rows(&bucket.sheet_name())?;
        if rows.len() <= 1 {
            return Ok(false);
        }

        let url = url.trim();
        Ok(rows
            .iter()
            .skip(1)
            .any(|row| field(row, URL_COLUMN).trim() == url))
    }

    /// Append one row for `event`. Does not check for duplicates.
    pub fn append(
        &mut self,
        event: &ConnpassEvent,
        keyword: &str,
        bucket: &Bucket,
        now: DateTime<Utc>,
    ) -> NotifierResult<()> {
        let row = vec![
            event.title.clone(),
            event
                .started_at
                .with_timezone(&self.timezone)
                .format(STARTED_AT_FORMAT)
                .to_string(),
            event.url.clone(),
            now.with_timezone(&self.timezone)
                .format(NOTIFIED_AT_FORMAT)
                .to_string(),
            keyword.to_string(),
        ];

        self.store.append_row(&bucket.sheet_name(), &row)?;
        Ok(())
    }
}

impl<S: SheetStore> SeenEventStore for Ledger<S> {
    fn prepare(&mut self, now: DateTime<Utc>) -> NotifierResult<()> {
        let bucket = self.resolve_or_create_bucket(now)?;
        if bucket.created {
            tracing::info!(
                "Bucket {} is new ({} row(s) carried over)",
                bucket.key,
                bucket.carried_over
            );
        }
        self.current = Some(bucket);
        Ok(())
    }

    fn check_seen(&mut self, event: &ConnpassEvent) -> NotifierResult<bool> {
        let bucket = self.current.ok_or(StoreError::BucketNotResolved)?;
        self.is_already_recorded(&event.url, &bucket)
    }

    fn record(
        &mut self,
        event: &ConnpassEvent,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> NotifierResult<()> {
        let bucket = self.current.ok_or(StoreError::BucketNotResolved)?;
        self.append(event, keyword, &bucket, now)
    }

    fn describe(&self) -> String {
        match &self.current {
            Some(bucket) => format!("ledger bucket {}", bucket.key),
            None => "ledger (no bucket resolved)".to_string(),
        }
    }
}

fn field(row: &[String], column: usize) -> &str {
    row.get(column).map(String::as_str).unwrap_or("")
}

/// Calendar date of a stored start time, as seen in `timezone`.
pub fn parse_start_date(value: &str, timezone: Tz) -> NotifierResult<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return Err(NotifierError::data("start date is missing"));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&timezone).date_naive());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed.date());
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }

    Err(NotifierError::data(format!(
        "could not parse start date '{}'",
        value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryWorkbook;
    use chrono::TimeZone;

    const TOKYO: Tz = chrono_tz::Asia::Tokyo;

    fn event(id: i64, started_at: DateTime<Utc>) -> ConnpassEvent {
        ConnpassEvent {
            event_id: id,
            title: format!("Meetup {}", id),
            catch: String::new(),
            url: format!("https://connpass.example/event/{}/", id),
            started_at,
            ended_at: None,
            updated_at: started_at,
            place: None,
            address: None,
            limit: None,
            accepted: None,
            waiting: None,
            owner_nickname: None,
            series: None,
        }
    }

    // 2024-01-15 12:00 JST
    fn january_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_key_formatting_and_parsing() {
        let key = BucketKey::new(2024, 3).unwrap();
        assert_eq!(key.to_string(), "202403");
        assert_eq!("202403".parse::<BucketKey>().unwrap(), key);

        assert!("2024-3".parse::<BucketKey>().is_err());
        assert!("202413".parse::<BucketKey>().is_err());
        assert!(BucketKey::new(2024, 0).is_none());
    }

    #[test]
    fn test_previous_key_wraps_year() {
        let key: BucketKey = "202401".parse().unwrap();
        assert_eq!(key.previous().to_string(), "202312");

        let key: BucketKey = "202407".parse().unwrap();
        assert_eq!(key.previous().to_string(), "202406");
    }

    #[test]
    fn test_key_uses_display_timezone() {
        // 2024-01-31 16:00 UTC is already February in Tokyo
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 16, 0, 0).unwrap();
        assert_eq!(BucketKey::from_instant(now, TOKYO).to_string(), "202402");
        assert_eq!(BucketKey::from_instant(now, chrono_tz::UTC).to_string(), "202401");
    }

    #[test]
    fn test_parse_start_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();

        assert_eq!(parse_start_date("2024/01/20 19:00", TOKYO).unwrap(), expected);
        assert_eq!(parse_start_date("2024/01/20 19:00:30", TOKYO).unwrap(), expected);
        assert_eq!(parse_start_date("2024-01-20 19:00", TOKYO).unwrap(), expected);
        assert_eq!(parse_start_date("2024-01-20", TOKYO).unwrap(), expected);
        assert_eq!(parse_start_date(" 2024/01/20 ", TOKYO).unwrap(), expected);
        // 15:30 UTC on the 19th is the 20th in Tokyo
        assert_eq!(
            parse_start_date("2024-01-19T15:30:00Z", TOKYO).unwrap(),
            expected
        );

        assert!(matches!(
            parse_start_date("", TOKYO),
            Err(NotifierError::Data(_))
        ));
        assert!(matches!(
            parse_start_date("next tuesday", TOKYO),
            Err(NotifierError::Data(_))
        ));
    }

    #[test]
    fn test_existing_bucket_returned_unchanged() {
        let store = MemoryWorkbook::new().with_sheet(
            "202401",
            vec![
                LEDGER_HEADER.to_vec(),
                vec!["A", "2024/01/20 19:00", "https://a/", "2024/01/02 10:00:00", "rust"],
            ],
        );
        let mut ledger = Ledger::new(store, TOKYO);

        let bucket = ledger.resolve_or_create_bucket(january_now()).unwrap();
        assert!(!bucket.created);
        assert_eq!(bucket.carried_over, 0);
        assert_eq!(ledger.store().rows("202401").unwrap().len(), 2);
    }

    #[test]
    fn test_new_bucket_gets_header_only_without_previous() {
        let mut ledger = Ledger::new(MemoryWorkbook::new(), TOKYO);

        let bucket = ledger.resolve_or_create_bucket(january_now()).unwrap();
        assert!(bucket.created);
        assert_eq!(bucket.sheet_name(), "202401");
        assert_eq!(
            ledger.store().rows("202401").unwrap(),
            vec![LEDGER_HEADER.iter().map(|s| s.to_string()).collect::<Vec<_>>()]
        );
        assert_eq!(ledger.store().sheet_names(), vec!["202401".to_string()]);
    }

    #[test]
    fn test_carry_forward_copies_matching_rows_only() {
        let previous_rows = vec![
            LEDGER_HEADER.to_vec(),
            vec!["Dec talk", "2023/12/20 19:00", "https://e/1/", "2023/12/01 09:00:00", "rust"],
            vec!["Moved talk", "2024/01/10 19:00", "https://e/2/", "2023/12/05 09:00:00", "rust"],
            vec!["Broken", "someday", "https://e/3/", "2023/12/06 09:00:00", "rust"],
            vec!["No date", "", "https://e/4/", "2023/12/07 09:00:00", "go"],
            vec!["Late jan", "2024-01-31", "https://e/5/", "2023/12/08 09:00:00", "go"],
            vec!["Next year", "2025/01/10 19:00", "https://e/6/", "2023/12/09 09:00:00", "go"],
        ];
        let store = MemoryWorkbook::new().with_sheet("202312", previous_rows);
        let source_before = store.rows("202312").unwrap();

        let mut ledger = Ledger::new(store, TOKYO);
        let bucket = ledger.resolve_or_create_bucket(january_now()).unwrap();

        assert!(bucket.created);
        assert_eq!(bucket.carried_over, 2);

        let rows = ledger.store().rows("202401").unwrap();
        assert_eq!(rows.len(), 1 + 2);
        assert_eq!(
            rows[1],
            vec![
                "Moved talk",
                "2024/01/10 19:00",
                "https://e/2/",
                "2023/12/05 09:00:00 (carried over from 202312)",
                "rust",
            ]
        );
        assert_eq!(rows[2][2], "https://e/5/");

        // Source bucket untouched
        assert_eq!(ledger.store().rows("202312").unwrap(), source_before);
    }

    #[test]
    fn test_carry_forward_across_year_boundary_skips_header_only_source() {
        let store = MemoryWorkbook::new().with_sheet("202312", vec![LEDGER_HEADER.to_vec()]);
        let mut ledger = Ledger::new(store, TOKYO);

        let bucket = ledger.resolve_or_create_bucket(january_now()).unwrap();
        assert_eq!(bucket.carried_over, 0);
        assert_eq!(ledger.store().rows("202401").unwrap().len(), 1);
    }

    #[test]
    fn test_header_only_bucket_records_nothing() {
        let mut ledger = Ledger::new(MemoryWorkbook::new(), TOKYO);
        let bucket = ledger.resolve_or_create_bucket(january_now()).unwrap();

        assert!(!ledger.is_already_recorded("https://e/1/", &bucket).unwrap());
        // Header cell is never matched
        assert!(!ledger.is_already_recorded("url", &bucket).unwrap());
    }

    #[test]
    fn test_append_then_recorded_and_check_is_idempotent() {
        let now = january_now();
        let mut ledger = Ledger::new(MemoryWorkbook::new(), TOKYO);
        let bucket = ledger.resolve_or_create_bucket(now).unwrap();

        let e = event(42, Utc.with_ymd_and_hms(2024, 1, 20, 10, 0, 0).unwrap());
        ledger.append(&e, "python", &bucket, now).unwrap();

        let first = ledger.is_already_recorded(&e.url, &bucket).unwrap();
        let second = ledger.is_already_recorded(&e.url, &bucket).unwrap();
        assert!(first);
        assert_eq!(first, second);

        // Trimmed comparison
        let padded = format!("  {}  ", e.url);
        assert!(ledger.is_already_recorded(&padded, &bucket).unwrap());
        assert!(!ledger.is_already_recorded("https://connpass.example/event/43/", &bucket).unwrap());

        let rows = ledger.store().rows("202401").unwrap();
        assert_eq!(
            rows[1],
            vec![
                "Meetup 42",
                "2024/01/20 19:00",
                "https://connpass.example/event/42/",
                "2024/01/15 12:00:00",
                "python",
            ]
        );
    }

    #[test]
    fn test_append_does_not_dedup() {
        let now = january_now();
        let mut ledger = Ledger::new(MemoryWorkbook::new(), TOKYO);
        let bucket = ledger.resolve_or_create_bucket(now).unwrap();
        let e = event(1, now);

        ledger.append(&e, "python", &bucket, now).unwrap();
        ledger.append(&e, "python", &bucket, now).unwrap();
        assert_eq!(ledger.store().rows("202401").unwrap().len(), 3);
    }

    #[test]
    fn test_seen_store_requires_prepare() {
        let mut ledger = Ledger::new(MemoryWorkbook::new(), TOKYO);
        let e = event(1, january_now());

        let err = ledger.check_seen(&e).unwrap_err();
        assert!(matches!(
            err,
            NotifierError::Store(StoreError::BucketNotResolved)
        ));
        assert_eq!(ledger.describe(), "ledger (no bucket resolved)");

        ledger.prepare(january_now()).unwrap();
        assert!(!ledger.check_seen(&e).unwrap());
        ledger.record(&e, "python", january_now()).unwrap();
        assert!(ledger.check_seen(&e).unwrap());
        assert_eq!(ledger.describe(), "ledger bucket 202401");
    }
}
