//!
//! castify session storage
//! ------------------------
//! Local key/value persistence for the admin session, the process-local analogue of
//! browser storage. Values are plain strings keyed by short names; the session layout
//! (`token`, `user`, `isAuthenticated`) is defined in `identity::session`.
//!
//! Two backends are provided:
//! - `MemoryStorage`: volatile, used by tests and one-shot commands.
//! - `FileStorage`: a single JSON object on disk, rewritten atomically on every mutation
//!   so a multi-key write either lands completely or not at all.
//!
//! Storage is shared behind `Arc<dyn SessionStorage>` between the session store and the
//! API client; both mutate it, so every mutation takes the whole batch at once.

use std::sync::Arc;

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent string key/value storage shared by the session components.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write all entries together. Implementations must not leave a subset applied.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()>;

    /// Remove the given keys; returns how many were actually present.
    /// Removing absent keys is a no-op, not an error.
    fn remove_many(&self, keys: &[&str]) -> StorageResult<usize>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()> { self.set_many(&[(key, value)]) }

    fn remove(&self, key: &str) -> StorageResult<bool> { Ok(self.remove_many(&[key])? > 0) }
}

pub type SharedStorage = Arc<dyn SessionStorage>;
