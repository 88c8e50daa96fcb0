use std::path::Path;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::constants::{KEY_BOOSTS_REMAINING, KEY_BOOST_RESET_TIME, KEY_PROGRESS};
use crate::core::engine_state::{EngineState, Progress};
use crate::core::rules::StoredBoosts;
use crate::store::KeyValueStore;
use crate::utils::{EngineError, EngineResult};
use tracing::{debug, info, warn};

/// Maps engine data onto the three logical storage keys.
pub struct ProgressRepository {
    store: Box<dyn KeyValueStore>,
}

impl ProgressRepository {
    pub fn new<S: KeyValueStore + 'static>(store: S) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// The stored score blob. Absent and malformed blobs both read as `None`.
    pub fn load_progress(&self) -> EngineResult<Option<Progress>> {
        let Some(raw) = self.store.get(KEY_PROGRESS)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Progress>(&raw) {
            Ok(progress) => Ok(Some(progress)),
            Err(e) => {
                warn!("Ignoring malformed {} value: {}", KEY_PROGRESS, e);
                Ok(None)
            }
        }
    }

    pub fn save_progress(&mut self, progress: &Progress) -> EngineResult<()> {
        let json = serde_json::to_string(progress)?;
        self.store.set(KEY_PROGRESS, &json)
    }

    pub fn load_boosts(&self) -> EngineResult<StoredBoosts> {
        let remaining = match self.store.get(KEY_BOOSTS_REMAINING)? {
            None => None,
            Some(raw) => match raw.trim().parse::<u8>() {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Ignoring malformed {} value {:?}: {}", KEY_BOOSTS_REMAINING, raw, e);
                    None
                }
            },
        };

        let reset_at = match self.store.get(KEY_BOOST_RESET_TIME)? {
            None => None,
            Some(raw) => match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(at) => Some(at),
                Err(e) => {
                    warn!("Ignoring malformed {} value {:?}: {}", KEY_BOOST_RESET_TIME, raw, e);
                    None
                }
            },
        };

        Ok(StoredBoosts { reset_at, remaining })
    }

    pub fn save_boosts_remaining(&mut self, remaining: u8) -> EngineResult<()> {
        self.store.set(KEY_BOOSTS_REMAINING, &remaining.to_string())
    }

    pub fn save_reset_time(&mut self, at: DateTime<FixedOffset>) -> EngineResult<()> {
        self.store.set(KEY_BOOST_RESET_TIME, &at.to_rfc3339())
    }

    pub fn clear(&mut self) -> EngineResult<()> {
        info!("Clearing persisted progress");
        self.store.clear()
    }
}

/// Full engine state written to a standalone file for backup or transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub state: EngineState,
    pub saved_at: DateTime<Utc>,
    pub version: String,
}

impl Snapshot {
    pub fn new(state: EngineState, saved_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            saved_at,
            version: crate::VERSION.to_string(),
        }
    }

    pub fn export_to(&self, path: &Path) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::storage(format!("Failed to serialize snapshot: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| EngineError::storage(format!("Failed to write snapshot: {}", e)))?;

        info!("Exported snapshot {} to {:?}", self.id, path);
        Ok(())
    }

    pub fn import_from(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::storage("Snapshot file not found"));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::storage(format!("Failed to read snapshot: {}", e)))?;

        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| EngineError::storage(format!("Failed to parse snapshot: {}", e)))?;

        if snapshot.version != crate::VERSION {
            warn!("Snapshot version mismatch: {} vs {}", snapshot.version, crate::VERSION);
        }

        debug!("Imported snapshot {} saved at {}", snapshot.id, snapshot.saved_at);
        Ok(snapshot)
    }
}
