use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{PropertyStore, StoreError};

/// Property store persisted as a flat JSON object of strings
#[derive(Debug, Clone)]
pub struct JsonPropertyStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonPropertyStore {
    /// Open the store, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        // Replace via a sibling temp file
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        Ok(())
    }
}

impl PropertyStore for JsonPropertyStore {
    fn get_property(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPropertyStore::open(dir.path().join("props.json")).unwrap();
        assert_eq!(store.get_property("known_event_ids").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("props.json");

        let mut store = JsonPropertyStore::open(&path).unwrap();
        store.set_property("known_event_ids", "1,2,3").unwrap();

        let reopened = JsonPropertyStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_property("known_event_ids").unwrap().as_deref(),
            Some("1,2,3")
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonPropertyStore::open(&path),
            Err(StoreError::Json(_))
        ));
    }
}
