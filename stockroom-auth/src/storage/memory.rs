use super::{KeyValueStore, StorageScope};
use std::collections::HashMap;
use std::sync::RwLock;
use stockroom_core::StockroomResult;

/// In-memory store
///
/// The tab scope of every context, and a stand-in durable store in tests.
#[derive(Debug)]
pub struct MemoryStore {
    scope: StorageScope,
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new(scope: StorageScope) -> Self {
        Self {
            scope,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn tab() -> Self {
        Self::new(StorageScope::Tab)
    }

    pub fn durable() -> Self {
        Self::new(StorageScope::Durable)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn scope(&self) -> StorageScope {
        self.scope
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> StockroomResult<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StockroomResult<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}
