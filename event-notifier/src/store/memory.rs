use std::collections::{BTreeMap, HashMap};

use super::{validate_sheet_name, PropertyStore, SheetStore, StoreError};

/// In-memory workbook with the same contract as `CsvWorkbook`
#[derive(Debug, Default, Clone)]
pub struct MemoryWorkbook {
    sheets: BTreeMap<String, Vec<Vec<String>>>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a sheet with raw rows (header included).
    pub fn with_sheet(mut self, name: &str, rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect();
        self.sheets.insert(name.to_string(), rows);
        self
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }
}

impl SheetStore for MemoryWorkbook {
    fn sheet_exists(&self, name: &str) -> Result<bool, StoreError> {
        validate_sheet_name(name)?;
        Ok(self.sheets.contains_key(name))
    }

    fn create_sheet(&mut self, name: &str, header: &[&str]) -> Result<(), StoreError> {
        validate_sheet_name(name)?;
        if self.sheets.contains_key(name) {
            return Err(StoreError::SheetExists(name.to_string()));
        }
        let header = header.iter().map(|s| s.to_string()).collect();
        self.sheets.insert(name.to_string(), vec![header]);
        Ok(())
    }

    fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, StoreError> {
        self.sheets
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::MissingSheet(name.to_string()))
    }

    fn append_row(&mut self, name: &str, row: &[String]) -> Result<(), StoreError> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingSheet(name.to_string()))?
            .push(row.to_vec());
        Ok(())
    }
}

/// In-memory property store
#[derive(Debug, Default, Clone)]
pub struct MemoryPropertyStore {
    values: HashMap<String, String>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryPropertyStore {
    fn get_property(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
