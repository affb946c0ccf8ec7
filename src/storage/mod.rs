// src/storage/mod.rs
//! Durable-state collaborator interfaces.
//!
//! The session core talks to an identity store, a file registry, and a
//! filesystem sink through the traits below. All three are synchronous and
//! blocking; the in-memory implementations in [`memory`] back the server by
//! default, and a SQL-backed store can be swapped in behind the same
//! traits without touching the session logic.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::constants::RECORD_ID_LEN;
use crate::utils::random_string;

pub mod memory;

// Re-export commonly used items
pub use memory::{MemoryFileRegistry, MemoryIdentityStore};

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record already exists: {0}")]
    Duplicate(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// A registered client identity.
///
/// Key fields start empty and are filled in by the key-share handshake;
/// the id is immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub id: String,
    pub name: String,
    /// Base64-encoded SPKI DER RSA public key, empty until the handshake.
    pub public_key: String,
    /// Base64-encoded AES transfer key, rotated at handshake and login.
    pub transfer_key: String,
    pub last_seen: DateTime<Utc>,
}

impl ClientIdentity {
    /// Create a freshly registered identity with empty key material.
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            public_key: String::new(),
            transfer_key: String::new(),
            last_seen: Utc::now(),
        }
    }
}

/// A file-transfer record.
///
/// `verified` transitions false to true exactly once, when the client
/// confirms the checksum matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub file_name: String,
    pub storage_path: PathBuf,
    pub verified: bool,
}

/// Durable client-identity records.
pub trait IdentityStore: Send + Sync {
    fn get_by_name(&self, name: &str) -> Result<Option<ClientIdentity>, StorageError>;
    fn insert(&self, identity: ClientIdentity) -> Result<(), StorageError>;
    fn update(&self, identity: &ClientIdentity) -> Result<(), StorageError>;
}

/// Durable file-transfer records.
pub trait FileRegistry: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<FileRecord>, StorageError>;
    fn insert(&self, record: FileRecord) -> Result<(), StorageError>;
    fn update(&self, record: &FileRecord) -> Result<(), StorageError>;
}

/// Where accepted file contents are written.
pub trait FileSink: Send + Sync {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// Filesystem-backed sink used by the real server.
pub struct DiskSink;

impl FileSink for DiskSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }
}

/// Allocate a random 16-character alphanumeric record id.
pub fn generate_record_id() -> String {
    random_string(RECORD_ID_LEN)
}
