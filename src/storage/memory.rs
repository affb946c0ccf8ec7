// src/storage/memory.rs
//! In-memory store implementations.
//!
//! Map-behind-lock stores keyed the same way the durable schema is: one
//! map per record type plus a name index for identity lookups. Timestamps
//! are refreshed on every write, matching the durable store's LastSeen
//! column semantics.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{ClientIdentity, FileRecord, FileRegistry, IdentityStore, StorageError};

/// In-memory identity store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    /// Identity records (id -> identity)
    records: RwLock<HashMap<String, ClientIdentity>>,
    /// Name index for lookups (name -> id)
    names: RwLock<HashMap<String, String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get_by_name(&self, name: &str) -> Result<Option<ClientIdentity>, StorageError> {
        let names = self.names.read().map_err(|_| StorageError::Poisoned)?;
        let records = self.records.read().map_err(|_| StorageError::Poisoned)?;
        Ok(names.get(name).and_then(|id| records.get(id)).cloned())
    }

    fn insert(&self, mut identity: ClientIdentity) -> Result<(), StorageError> {
        let mut names = self.names.write().map_err(|_| StorageError::Poisoned)?;
        let mut records = self.records.write().map_err(|_| StorageError::Poisoned)?;

        if names.contains_key(&identity.name) || records.contains_key(&identity.id) {
            return Err(StorageError::Duplicate(identity.name));
        }

        identity.last_seen = Utc::now();
        names.insert(identity.name.clone(), identity.id.clone());
        records.insert(identity.id.clone(), identity);
        Ok(())
    }

    fn update(&self, identity: &ClientIdentity) -> Result<(), StorageError> {
        let mut names = self.names.write().map_err(|_| StorageError::Poisoned)?;
        let mut records = self.records.write().map_err(|_| StorageError::Poisoned)?;

        let stored = records
            .get_mut(&identity.id)
            .ok_or_else(|| StorageError::NotFound(identity.id.clone()))?;

        // Keep the name index consistent if the display name changed.
        if stored.name != identity.name {
            names.remove(&stored.name);
            names.insert(identity.name.clone(), identity.id.clone());
        }

        *stored = identity.clone();
        stored.last_seen = Utc::now();
        Ok(())
    }
}

/// In-memory file registry.
#[derive(Debug, Default)]
pub struct MemoryFileRegistry {
    /// File records (id -> record)
    records: RwLock<HashMap<String, FileRecord>>,
}

impl MemoryFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, used to assert retry behavior in tests.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileRegistry for MemoryFileRegistry {
    fn get(&self, id: &str) -> Result<Option<FileRecord>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::Poisoned)?;
        Ok(records.get(id).cloned())
    }

    fn insert(&self, record: FileRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::Poisoned)?;
        if records.contains_key(&record.id) {
            return Err(StorageError::Duplicate(record.id));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn update(&self, record: &FileRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::Poisoned)?;
        let stored = records
            .get_mut(&record.id)
            .ok_or_else(|| StorageError::NotFound(record.id.clone()))?;
        *stored = record.clone();
        Ok(())
    }
}
