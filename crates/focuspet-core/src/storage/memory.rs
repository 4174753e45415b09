//! In-memory snapshot store.
//!
//! Keeps the snapshot as serialized JSON, so tests exercise the same encode
//! and decode path as the SQLite store.

use std::sync::Mutex;

use super::{AppSnapshot, SnapshotStore};
use crate::error::{DatabaseError, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
    json: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with raw JSON, e.g. an older or corrupt snapshot.
    pub fn with_raw(json: impl Into<String>) -> Self {
        Self {
            json: Mutex::new(Some(json.into())),
        }
    }

    /// Raw JSON last saved.
    pub fn raw(&self) -> Option<String> {
        self.json.lock().ok().and_then(|guard| guard.clone())
    }
}

impl SnapshotStore for MemoryStore {
    fn load_snapshot(&self) -> Result<Option<AppSnapshot>> {
        let guard = self.json.lock().map_err(|_| DatabaseError::Locked)?;
        match guard.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &AppSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let mut guard = self.json.lock().map_err(|_| DatabaseError::Locked)?;
        *guard = Some(json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_loads_none() {
        assert!(MemoryStore::new().load_snapshot().unwrap().is_none());
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let store = MemoryStore::with_raw("{not json");
        assert!(store.load_snapshot().is_err());
    }

    #[test]
    fn save_then_load() {
        let store = MemoryStore::new();
        let mut snapshot = AppSnapshot::default();
        snapshot.currency.coins = 42;
        store.save_snapshot(&snapshot).unwrap();
        assert_eq!(store.load_snapshot().unwrap().unwrap().currency.coins, 42);
    }
}
