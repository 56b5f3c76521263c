use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use super::{validate_sheet_name, SheetStore, StoreError};

/// Workbook backed by a directory with one `<sheet>.csv` file per sheet
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sheet_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_sheet_name(name)?;
        Ok(self.dir.join(format!("{}.csv", name)))
    }
}

impl SheetStore for CsvWorkbook {
    fn sheet_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.sheet_path(name)?.is_file())
    }

    fn create_sheet(&mut self, name: &str, header: &[&str]) -> Result<(), StoreError> {
        let path = self.sheet_path(name)?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::SheetExists(name.to_string()),
                _ => StoreError::io(&path, e),
            })?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(header)?;
        writer.flush().map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!("Created sheet {}", path.display());
        Ok(())
    }

    fn rows(&self, name: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let path = self.sheet_path(name)?;
        if !path.is_file() {
            return Err(StoreError::MissingSheet(name.to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(rows)
    }

    fn append_row(&mut self, name: &str, row: &[String]) -> Result<(), StoreError> {
        let path = self.sheet_path(name)?;

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::MissingSheet(name.to_string()),
                _ => StoreError::io(&path, e),
            })?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(row)?;
        writer.flush().map_err(|e| StoreError::io(&path, e))?;

        Ok(())
    }
}
