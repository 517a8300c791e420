use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::store::STORAGE_KEY;

pub const DB_FILE_NAME: &str = "tally.sqlite3";
pub const JSON_FILE_NAME: &str = "storage.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    JsonFile,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "json" => Ok(StorageBackend::JsonFile),
            other => bail!("unknown storage backend '{other}' (expected 'sqlite' or 'json')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    pub storage_key: String,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tally-data"),
            backend: StorageBackend::Sqlite,
            storage_key: STORAGE_KEY.to_string(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `TALLY_DATA_DIR`, `TALLY_STORAGE` and `TALLY_DEBUG`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("TALLY_DATA_DIR").filter(|dir| !dir.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("TALLY_STORAGE") {
            config.backend = StorageBackend::parse(&backend)?;
        }
        config.debug = lookup("TALLY_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(config)
    }

    pub fn storage_path(&self) -> PathBuf {
        match self.backend {
            StorageBackend::Sqlite => self.data_dir.join(DB_FILE_NAME),
            StorageBackend::JsonFile => self.data_dir.join(JSON_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage_key, "eventsData");
        assert!(!config.debug);
        assert_eq!(config.storage_path(), PathBuf::from("./tally-data/tally.sqlite3"));
    }

    #[test]
    fn environment_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TALLY_DATA_DIR", "/tmp/tally"),
            ("TALLY_STORAGE", "JSON"),
            ("TALLY_DEBUG", "true"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StorageBackend::JsonFile);
        assert!(config.debug);
        assert_eq!(config.storage_path(), PathBuf::from("/tmp/tally/storage.json"));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(AppConfig::from_lookup(lookup_from(&[("TALLY_STORAGE", "redis")])).is_err());
    }
}
