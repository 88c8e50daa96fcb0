pub mod file_store;
pub mod repository;

pub use file_store::FileStore;
pub use repository::{ProgressRepository, Snapshot};

use std::collections::HashMap;
use crate::utils::EngineResult;

/// Flat string key-value persistence, the only shared resource the engine
/// touches. Writes are synchronous and whole-value.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> EngineResult<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> EngineResult<()>;

    fn remove(&mut self, key: &str) -> EngineResult<()>;

    fn clear(&mut self) -> EngineResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> EngineResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> EngineResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> EngineResult<()> {
        self.entries.clear();
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> EngineResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> EngineResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> EngineResult<()> {
        (**self).remove(key)
    }

    fn clear(&mut self) -> EngineResult<()> {
        (**self).clear()
    }
}
