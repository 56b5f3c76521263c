//! Storage seams for the spreadsheet-like workbook and the property store.
//!
//! The ledger, the settings loader and the known-id store only talk to
//! these traits. Production runs use a directory of CSV sheets and a JSON
//! property file; tests use the in-memory versions.

use std::path::PathBuf;

use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod properties;
pub mod workbook;

pub use properties::JsonPropertyStore;
pub use workbook::CsvWorkbook;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Sheet '{0}' does not exist")]
    MissingSheet(String),

    #[error("Sheet '{0}' already exists")]
    SheetExists(String),

    #[error("Invalid sheet name '{0}'")]
    InvalidSheetName(String),

    #[error("No ledger bucket has been resolved for this run")]
    BucketNotResolved,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Property file error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A workbook of named sheets holding rows of text cells.
///
/// Row 0 of a sheet is whatever was written first (usually a header);
/// callers decide how to interpret it.
pub trait SheetStore {
    fn sheet_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create an empty sheet with the given header as its first row.
    fn create_sheet(&mut self, name: &str, header: &[&str]) -> Result<(), StoreError>;

    /// All rows of the sheet, header included.
    fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Append one row after the current last row.
    fn append_row(&mut self, name: &str, row: &[String]) -> Result<(), StoreError>;
}

/// Flat string key-value store.
pub trait PropertyStore {
    fn get_property(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_property(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Only `[A-Za-z0-9_-]` names are accepted so a sheet maps to one file.
pub(crate) fn validate_sheet_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSheetName(name.to_string()))
    }
}
