//! JSON-backed configuration store
//!
//! One document maps environment identity to its `StoredRecord`. A missing
//! file is an empty store. A corrupt file is also treated as empty so the
//! CLI keeps working, but the condition is reported back to the caller as a
//! warning instead of being silently dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FdevcError, Result};
use crate::store::record::StoredRecord;

pub struct ConfigStore {
    path: PathBuf,
}

/// A point-in-time read of the whole store.
pub struct StoreSnapshot {
    records: BTreeMap<String, StoredRecord>,
    warning: Option<String>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. Never fails: missing and unreadable stores both
    /// come back empty, the latter with a warning attached.
    pub fn snapshot(&self) -> StoreSnapshot {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return StoreSnapshot::empty(),
        };
        match serde_json::from_str(&text) {
            Ok(records) => StoreSnapshot {
                records,
                warning: None,
            },
            Err(e) => StoreSnapshot {
                records: BTreeMap::new(),
                warning: Some(format!(
                    "config store {} is unreadable ({}); treating it as empty",
                    self.path.display(),
                    e
                )),
            },
        }
    }

    /// Insert or replace the record for `id`.
    pub fn save(&self, id: &str, record: StoredRecord) -> Result<()> {
        let mut records = self.snapshot().into_records();
        records.insert(id.to_string(), record);
        self.write(&records)
    }

    /// Remove the record for `id`. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.snapshot().into_records();
        let existed = records.remove(id).is_some();
        if existed {
            self.write(&records)?;
        }
        Ok(existed)
    }

    /// Remove the store file entirely.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, records: &BTreeMap<String, StoredRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(records)
            .map_err(|e| FdevcError::ConfigInvalid(format!("could not encode store: {}", e)))?;
        fs::write(&self.path, text + "\n")?;
        Ok(())
    }
}

impl StoreSnapshot {
    fn empty() -> Self {
        StoreSnapshot {
            records: BTreeMap::new(),
            warning: None,
        }
    }

    /// Record for one identity, if saved.
    pub fn get(&self, id: &str) -> Option<&StoredRecord> {
        self.records.get(id)
    }

    /// All records, sorted by identity.
    pub fn records(&self) -> &BTreeMap<String, StoredRecord> {
        &self.records
    }

    pub fn into_records(self) -> BTreeMap<String, StoredRecord> {
        self.records
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}
