//! Credentials and keywords read from the operator-owned settings sheet.

use std::fmt;

use serde::Deserialize;

use crate::error::{NotifierError, NotifierResult};
use crate::store::{SheetStore, StoreError};

/// Cell layout revision of the settings sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum SchemaVersion {
    /// Header on row 1; row 2 holds keyword (A), API key (B), token (C)
    V1,
    /// Row 1 holds API key (A) and token (B); keywords fill column C downward
    V2,
}

impl TryFrom<u8> for SchemaVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SchemaVersion::V1),
            2 => Ok(SchemaVersion::V2),
            other => Err(format!("unsupported settings schema_version {}", other)),
        }
    }
}

/// Where each value lives in the settings sheet. Rows and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsLayout {
    pub row: usize,
    pub keyword_column: usize,
    pub api_key_column: usize,
    pub token_column: usize,
    /// Read every non-empty keyword cell from `row` down
    pub keywords_extend_down: bool,
}

impl SchemaVersion {
    pub fn layout(self) -> SettingsLayout {
        match self {
            SchemaVersion::V1 => SettingsLayout {
                row: 2,
                keyword_column: 1,
                api_key_column: 2,
                token_column: 3,
                keywords_extend_down: false,
            },
            SchemaVersion::V2 => SettingsLayout {
                row: 1,
                keyword_column: 3,
                api_key_column: 1,
                token_column: 2,
                keywords_extend_down: true,
            },
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub keywords: Vec<String>,
    pub api_key: String,
    pub messaging_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keywords", &self.keywords)
            .field("api_key", &format_args!("<{} chars>", self.api_key.len()))
            .field(
                "messaging_token",
                &format_args!("<{} chars>", self.messaging_token.len()),
            )
            .finish()
    }
}

/// Spreadsheet-style cell name, e.g. column 3 row 2 is `C2`.
pub fn cell_name(column: usize, row: usize) -> String {
    let mut letters = Vec::new();
    let mut n = column;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &row.to_string()
}

fn clean(value: &str) -> String {
    value.trim().replace(['\r', '\n'], "")
}

fn cell(rows: &[Vec<String>], column: usize, row: usize) -> String {
    rows.get(row - 1)
        .and_then(|r| r.get(column - 1))
        .map(|v| clean(v))
        .unwrap_or_default()
}

/// Read and validate the credentials. Any missing field aborts the run.
pub fn load_credentials<S: SheetStore + ?Sized>(
    store: &S,
    sheet: &str,
    layout: &SettingsLayout,
) -> NotifierResult<Credentials> {
    let rows = store.rows(sheet).map_err(|e| match e {
        StoreError::MissingSheet(name) => {
            NotifierError::Configuration(format!("settings sheet '{}' was not found", name))
        }
        other => NotifierError::Store(other),
    })?;

    let keywords = if layout.keywords_extend_down {
        let mut keywords: Vec<String> = Vec::new();
        for row in layout.row..=rows.len().max(layout.row) {
            let keyword = cell(&rows, layout.keyword_column, row);
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        keywords
    } else {
        let keyword = cell(&rows, layout.keyword_column, layout.row);
        if keyword.is_empty() {
            Vec::new()
        } else {
            vec![keyword]
        }
    };
    let api_key = cell(&rows, layout.api_key_column, layout.row);
    let messaging_token = cell(&rows, layout.token_column, layout.row);

    tracing::debug!(
        "Settings: {} keyword(s), API key length {}, token length {}",
        keywords.len(),
        api_key.len(),
        messaging_token.len()
    );

    if keywords.is_empty() {
        return Err(NotifierError::missing_setting(
            "search keyword",
            &cell_name(layout.keyword_column, layout.row),
        ));
    }
    if api_key.is_empty() {
        return Err(NotifierError::missing_setting(
            "connpass API key",
            &cell_name(layout.api_key_column, layout.row),
        ));
    }
    if messaging_token.is_empty() {
        return Err(NotifierError::missing_setting(
            "messaging channel access token",
            &cell_name(layout.token_column, layout.row),
        ));
    }

    Ok(Credentials {
        keywords,
        api_key,
        messaging_token,
    })
}
