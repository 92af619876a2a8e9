use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{SessionStorage, StorageError, StorageResult};

/// JSON-object-on-disk storage. Every mutation rewrites the whole file through a
/// temporary sibling and a rename, so readers never observe a half-applied batch.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.display().to_string(), source }
    }

    fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Mutations start over from an empty map when the file is unreadable JSON; the
    /// file only ever holds session keys, so nothing of value is lost.
    fn read_map_for_update(&self) -> StorageResult<BTreeMap<String, String>> {
        match self.read_map() {
            Err(StorageError::Format(e)) => {
                warn!(target: "storage", "discarding unreadable session file {}: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        let body = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(target: "storage", "wrote {} keys to {}", map.len(), self.path.display());
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _g = self.lock.lock();
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let _g = self.lock.lock();
        let mut map = self.read_map_for_update()?;
        for (k, v) in entries {
            map.insert((*k).to_string(), (*v).to_string());
        }
        self.write_map(&map)
    }

    fn remove_many(&self, keys: &[&str]) -> StorageResult<usize> {
        let _g = self.lock.lock();
        let mut map = self.read_map_for_update()?;
        let removed = keys.iter().filter(|k| map.remove(**k).is_some()).count();
        // an absent file stays absent; clearing nothing must not create one
        if removed > 0 || self.path.exists() {
            self.write_map(&map)?;
        }
        Ok(removed)
    }
}
