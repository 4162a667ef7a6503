//! Persistent store: cartridge records in a JSON file on disk
//!
//! One file holds the persisted globals of every cartridge played, keyed by
//! cartridge name. It is read once at start and rewritten on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use zest_engine::PersistentStore;

/// On-disk layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    records: BTreeMap<String, Json>,
}

pub struct JsonFileStore {
    path: PathBuf,
    file: StoreFile,
}

impl JsonFileStore {
    /// Open the store, loading from disk if the file exists
    pub fn open(path: &Path) -> Self {
        let file = if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<StoreFile>(&json) {
                    Ok(file) => {
                        tracing::info!("Loaded {} store record(s) from {}", file.records.len(), path.display());
                        file
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse store file: {}", e);
                        StoreFile::default()
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read store file: {}", e);
                    StoreFile::default()
                }
            }
        } else {
            tracing::info!("No store file found, starting fresh");
            StoreFile::default()
        };
        Self {
            path: path.to_path_buf(),
            file,
        }
    }

    fn write(&self) {
        match serde_json::to_string_pretty(&self.file) {
            Ok(json) => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!("Failed to create store directory {}: {}", parent.display(), e);
                    }
                }
                match std::fs::write(&self.path, &json) {
                    Ok(_) => tracing::debug!("Saved to {}", self.path.display()),
                    Err(e) => tracing::error!("Failed to save: {}", e),
                }
            }
            Err(e) => tracing::error!("Failed to serialize store: {}", e),
        }
    }
}

impl PersistentStore for JsonFileStore {
    fn get(&mut self, key: &str) -> Option<Json> {
        self.file.records.get(key).cloned()
    }

    fn set(&mut self, key: &str, record: Json) {
        self.file.records.insert(key.to_string(), record);
        self.write();
    }

    fn remove(&mut self, key: &str) {
        if self.file.records.remove(key).is_some() {
            self.write();
        }
    }
}
