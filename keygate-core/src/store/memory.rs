//! In-memory secret storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Secret, SecretStore, StoreError};

/// In-memory secret store.
///
/// Nothing is persisted; selected keys are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Secret>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store holding a single entry.
    pub fn with_entry(entry: impl Into<String>, secret: Secret) -> Self {
        let store = Self::new();
        store.data.write().insert(entry.into(), secret);
        store
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.data.read().len())
            .finish()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, entry: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.data.read().get(entry).cloned())
    }

    async fn set(&self, entry: &str, secret: &Secret) -> Result<(), StoreError> {
        self.data.write().insert(entry.to_string(), secret.clone());
        Ok(())
    }

    async fn delete(&self, entry: &str) -> Result<(), StoreError> {
        self.data.write().remove(entry);
        Ok(())
    }

    async fn exists(&self, entry: &str) -> Result<bool, StoreError> {
        Ok(self.data.read().contains_key(entry))
    }
}
