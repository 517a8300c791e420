//! JSON-file storage adapter.
//!
//! Unlike the SQLite adapter this one has no background worker: `set` does
//! the file write synchronously before it returns. Each write goes to a
//! sibling temp file that is then renamed over the real one, so a crash
//! mid-write leaves the previous contents in place.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{error, warn};

use super::KeyValueStore;

/// Single JSON object file holding every key. The whole file is rewritten on
/// each `set` while the write lock is held, so writes land in call order.
pub struct FileStorage {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
    last_error: Mutex<Option<String>>,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create storage directory {}", parent.display())
            })?;
        }

        let data = if path.exists() {
            let contents = fs::read(&path)
                .with_context(|| format!("Failed to read storage from {}", path.display()))?;
            match serde_json::from_slice(&contents) {
                Ok(data) => data,
                Err(err) => {
                    let backup = move_aside(&path)?;
                    warn!(
                        "Storage file {} is unreadable ({err}); moved it to {} and starting empty",
                        path.display(),
                        backup.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            last_error: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, serialized)
            .with_context(|| format!("Failed to write storage to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace storage at {}", self.path.display()))
    }

    fn record_error(&self, message: String) {
        error!("{message}");
        let mut guard = match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(message);
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Rename an unreadable storage file to a timestamped `.corrupt-` sibling so
/// the next write cannot clobber it.
fn move_aside(path: &Path) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let mut backup = sibling(path, &format!(".corrupt-{stamp}"));
    let mut attempt = 1;
    while backup.exists() {
        backup = sibling(path, &format!(".corrupt-{stamp}-{attempt}"));
        attempt += 1;
    }
    fs::rename(path, &backup).with_context(|| {
        format!(
            "Failed to move unreadable storage {} to {}",
            path.display(),
            backup.display()
        )
    })?;
    Ok(backup)
}

#[async_trait]
impl KeyValueStore for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(key.to_string(), value);
        if let Err(err) = self.persist(&guard) {
            self.record_error(format!("{err:#}"));
        }
    }

    fn take_write_error(&self) -> Option<String> {
        let mut guard = match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }
}
