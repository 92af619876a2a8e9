use std::collections::HashMap;

use parking_lot::RwLock;

use super::{SessionStorage, StorageResult};

/// Volatile storage; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    /// Seed storage from key/value pairs, mostly for tests.
    pub fn with_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self { entries: RwLock::new(map) }
    }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let mut map = self.entries.write();
        for (k, v) in entries {
            map.insert((*k).to_string(), (*v).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> StorageResult<usize> {
        let mut map = self.entries.write();
        Ok(keys.iter().filter(|k| map.remove(**k).is_some()).count())
    }
}
