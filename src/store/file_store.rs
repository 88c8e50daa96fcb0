use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::store::KeyValueStore;
use crate::utils::{EngineError, EngineResult};
use tracing::{debug, info, warn};

/// Key-value store kept as one JSON object on disk. Every write rewrites the
/// whole file, so a reader never sees half an update.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| EngineError::storage(format!("Failed to read store file: {}", e)))?;

            match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Store file {:?} is unreadable, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        info!("Opened store at {:?} ({} keys)", path, entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| EngineError::storage(format!("Failed to create store directory: {}", e)))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| EngineError::storage(format!("Failed to serialize store: {}", e)))?;

        // Write beside the target then rename over it.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| EngineError::storage(format!("Failed to write store file: {}", e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| EngineError::storage(format!("Failed to replace store file: {}", e)))?;

        debug!("Store flushed to {:?}", self.path);
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> EngineResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> EngineResult<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> EngineResult<()> {
        self.entries.clear();
        self.flush()
    }
}
