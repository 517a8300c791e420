pub mod analytics;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod gestures;
pub mod models;
pub mod persistence;
pub mod store;
pub mod transfer;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::Mutex;

use config::{AppConfig, StorageBackend};
use db::Database;
use gestures::SwipeConfig;
use persistence::{FileStorage, KeyValueStore};
use store::{EventStore, LoadOutcome};
use transfer::Clipboard;

/// Shared state behind every command.
pub struct AppState {
    pub(crate) store: Mutex<EventStore>,
    pub(crate) clipboard: Arc<dyn Clipboard>,
    pub(crate) swipe: SwipeConfig,
}

impl AppState {
    pub fn new(store: EventStore, clipboard: Arc<dyn Clipboard>, swipe: SwipeConfig) -> Self {
        Self {
            store: Mutex::new(store),
            clipboard,
            swipe,
        }
    }

    /// Open storage and load the collection. The store is ready on return.
    pub async fn open(config: &AppConfig, clipboard: Arc<dyn Clipboard>) -> Result<Self> {
        utils::logging::init(config.debug);
        info!("Tally starting up...");

        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let path = config.storage_path();
        let storage: Arc<dyn KeyValueStore> = match config.backend {
            StorageBackend::Sqlite => Arc::new(Database::new(path)?),
            StorageBackend::JsonFile => Arc::new(FileStorage::new(path)?),
        };

        let mut store = EventStore::with_key(storage, config.storage_key.clone());
        match store.load().await {
            LoadOutcome::RecoveredFromCorrupt => {
                warn!("Stored events were unreadable; the original blob was kept as a backup")
            }
            LoadOutcome::StorageUnavailable => {
                warn!("Storage could not be read; running on seed data without saving changes")
            }
            LoadOutcome::Restored { .. } | LoadOutcome::Seeded => {}
        }

        Ok(Self::new(store, clipboard, SwipeConfig::default()))
    }

    /// `open` with configuration taken from the environment.
    pub async fn open_from_env(clipboard: Arc<dyn Clipboard>) -> Result<Self> {
        let config = AppConfig::from_env()?;
        Self::open(&config, clipboard).await
    }
}
