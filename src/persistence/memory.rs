use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard,
    },
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::error;

use super::KeyValueStore;

/// In-process storage. Writes apply synchronously, so ordering is trivial.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    last_error: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        let storage = Self::default();
        lock(&storage.entries).insert(key.to_string(), value.into());
        storage
    }

    /// Make every following `set` fail, or succeed again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every following `get` fail, or succeed again.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Keys of all accepted writes, in the order they were applied.
    pub fn write_log(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    /// Stored keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.entries)
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("read of '{key}' rejected by storage");
        }
        Ok(self.peek(key))
    }

    fn set(&self, key: &str, value: String) {
        if self.fail_writes.load(Ordering::SeqCst) {
            let message = format!("write to '{key}' rejected by storage");
            error!("{message}");
            *lock(&self.last_error) = Some(message);
            return;
        }
        lock(&self.entries).insert(key.to_string(), value);
        lock(&self.writes).push(key.to_string());
    }

    fn take_write_error(&self) -> Option<String> {
        lock(&self.last_error).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_write_keeps_previous_value_and_reports_once() {
        let storage = MemoryStorage::with_entry("k", "old");
        storage.fail_writes(true);
        storage.set("k", "new".into());

        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("old"));
        assert!(storage.take_write_error().is_some());
        assert!(storage.take_write_error().is_none());
    }

    #[tokio::test]
    async fn failed_read_is_an_error_until_cleared() {
        let storage = MemoryStorage::with_entry("k", "v");
        storage.fail_reads(true);
        assert!(storage.get("k").await.is_err());

        storage.fail_reads(false);
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
