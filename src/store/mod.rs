//! In-memory event collection with write-through persistence.
//!
//! The whole collection is one JSON blob under a single key. Every change
//! goes through [`EventStore::replace_all`], which swaps the collection and
//! queues the serialized blob on the storage port without waiting for it.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::StoreError,
    log_debug, log_error, log_info, log_warn,
    models::{is_hex_color, seed_events, Event, NewEvent, Occurrence, OccurrenceRef},
    persistence::KeyValueStore,
    transfer::{self, ImportError, ImportSummary, EMPTY_EXPORT},
};

const ENABLE_LOGS: bool = true;

pub const STORAGE_KEY: &str = "eventsData";

/// Stored blobs that had to be replaced on load are copied to
/// `<key>.corrupt.<UTC timestamp>-<suffix>` first.
pub const CORRUPT_BACKUP_MARKER: &str = "corrupt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreStatus {
    Uninitialized,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LoadOutcome {
    /// The stored blob decoded into this many events.
    Restored { events: usize },
    /// Nothing stored yet.
    Seeded,
    /// Stored blob was undecodable; it was backed up and replaced by the seed.
    RecoveredFromCorrupt,
    /// Storage could not be read. Seed is held in memory and nothing is
    /// written until a later `load` succeeds.
    StorageUnavailable,
}

pub struct EventStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    events: Vec<Event>,
    status: StoreStatus,
    /// Set while the stored blob could not be read, so its contents are
    /// unknown and must not be overwritten.
    writes_held: bool,
    held_warning: Option<String>,
}

impl EventStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(storage, STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            events: Vec::new(),
            status: StoreStatus::Uninitialized,
            writes_held: false,
            held_warning: None,
        }
    }

    pub fn status(&self) -> StoreStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == StoreStatus::Ready
    }

    /// Empty until the first `load` or `replace_all`.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Favorites first, as the event list shows them.
    pub fn sorted(&self) -> Vec<&Event> {
        sorted_by_favorite(&self.events)
    }

    /// Read the persisted blob and make the store ready. Never fails: any
    /// problem degrades to the seed collection.
    ///
    /// After a read failure the store runs on the seed but holds back every
    /// write, since the unread blob may still hold the user's data. Calling
    /// `load` again retries the read and discards the in-memory state.
    pub async fn load(&mut self) -> LoadOutcome {
        match self.storage.get(&self.key).await {
            Ok(Some(blob)) => {
                self.writes_held = false;
                match serde_json::from_str::<Vec<Event>>(&blob) {
                    Ok(events) => self.restore(blob, events),
                    Err(err) => {
                        log_warn!("Stored events are unreadable ({err}); falling back to seed data");
                        self.back_up(blob);
                        self.replace_all(seed_events());
                        LoadOutcome::RecoveredFromCorrupt
                    }
                }
            }
            Ok(None) => {
                self.writes_held = false;
                log_info!("No stored events; seeding first-run data");
                self.replace_all(seed_events());
                LoadOutcome::Seeded
            }
            Err(err) => {
                log_error!("Failed to read stored events: {err:#}; changes will not be saved");
                self.writes_held = true;
                self.events = seed_events();
                self.status = StoreStatus::Ready;
                LoadOutcome::StorageUnavailable
            }
        }
    }

    fn restore(&mut self, blob: String, events: Vec<Event>) -> LoadOutcome {
        let (events, dropped) = dedupe_ids(events);
        if let Err(err) = transfer::validate_events(&events) {
            log_warn!("Stored events failed validation: {err}");
        }
        let count = events.len();

        if dropped > 0 {
            log_warn!("Dropped {dropped} stored entries with duplicate ids");
            self.back_up(blob);
            self.replace_all(events);
        } else {
            self.events = events;
            self.status = StoreStatus::Ready;
        }

        log_info!("Restored {count} events from storage");
        LoadOutcome::Restored { events: count }
    }

    /// Prefix shared by every backup key written for this store.
    pub fn backup_prefix(&self) -> String {
        format!("{}.{CORRUPT_BACKUP_MARKER}.", self.key)
    }

    fn back_up(&self, blob: String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let key = format!(
            "{}{}-{}",
            self.backup_prefix(),
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            &suffix[..8]
        );
        log_info!("Keeping a copy of the stored blob under '{key}'");
        self.storage.set(&key, blob);
    }

    /// Swap in `events` and queue the serialized collection for storage.
    pub fn replace_all(&mut self, events: Vec<Event>) {
        self.events = events;
        self.status = StoreStatus::Ready;

        if self.writes_held {
            log_warn!("Storage was unreadable on load; keeping changes in memory only");
            self.held_warning =
                Some("Storage could not be read, so changes are not being saved.".into());
            return;
        }

        match serde_json::to_string(&self.events) {
            Ok(blob) => {
                log_debug!("Persisting {} events ({} bytes)", self.events.len(), blob.len());
                self.storage.set(&self.key, blob);
            }
            Err(err) => log_error!("Failed to serialize events: {err}"),
        }
    }

    pub fn event(&self, id: &str) -> Result<&Event, StoreError> {
        self.ensure_ready()?;
        self.events
            .iter()
            .find(|event| event.id == id)
            .ok_or_else(|| StoreError::EventNotFound(id.to_string()))
    }

    pub fn create_event(&mut self, input: NewEvent) -> Result<Event, StoreError> {
        self.ensure_ready()?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation(
                "Please enter a name for the event.".into(),
            ));
        }
        if !is_hex_color(&input.color) {
            return Err(StoreError::Validation(format!(
                "'{}' is not a #RRGGBB color",
                input.color
            )));
        }
        if input.icon.trim().is_empty() {
            return Err(StoreError::Validation("Please choose an icon.".into()));
        }

        let mut id = Uuid::new_v4().to_string();
        while self.events.iter().any(|event| event.id == id) {
            id = Uuid::new_v4().to_string();
        }

        let event = Event {
            id,
            name: name.to_string(),
            color: input.color,
            icon: input.icon,
            comment: String::new(),
            favorite: false,
            data: Vec::new(),
        };

        let mut next = self.events.clone();
        next.push(event.clone());
        self.replace_all(next);
        Ok(event)
    }

    /// Append an occurrence; `at == None` is a quick-add stamped with now.
    pub fn add_occurrence(
        &mut self,
        event_id: &str,
        at: Option<DateTime<Utc>>,
        comment: &str,
    ) -> Result<Occurrence, StoreError> {
        let index = self.index_of(event_id)?;
        let occurrence = match at {
            Some(at) => Occurrence::new(at, comment),
            None => Occurrence::now(comment),
        };

        let mut next = self.events.clone();
        next[index].data.push(occurrence.clone());
        self.replace_all(next);
        Ok(occurrence)
    }

    pub fn delete_event(&mut self, event_id: &str) -> Result<Event, StoreError> {
        let index = self.index_of(event_id)?;

        let mut next = self.events.clone();
        let removed = next.remove(index);
        self.replace_all(next);
        Ok(removed)
    }

    pub fn delete_occurrence(
        &mut self,
        event_id: &str,
        target: &OccurrenceRef,
    ) -> Result<Occurrence, StoreError> {
        let index = self.index_of(event_id)?;
        let position = self.events[index]
            .data
            .iter()
            .position(|occurrence| occurrence.matches(target))
            .ok_or_else(|| StoreError::OccurrenceNotFound {
                event_id: event_id.to_string(),
            })?;

        let mut next = self.events.clone();
        let removed = next[index].data.remove(position);
        self.replace_all(next);
        Ok(removed)
    }

    /// Flip the favorite flag and return the new value.
    pub fn toggle_favorite(&mut self, event_id: &str) -> Result<bool, StoreError> {
        let index = self.index_of(event_id)?;

        let mut next = self.events.clone();
        next[index].favorite = !next[index].favorite;
        let favorite = next[index].favorite;
        self.replace_all(next);
        Ok(favorite)
    }

    /// The blob as it sits in storage, or an empty list if nothing is stored.
    /// Reads queue behind pending writes, so this reflects every prior change.
    pub async fn export(&self) -> String {
        match self.storage.get(&self.key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => EMPTY_EXPORT.to_string(),
            Err(err) => {
                log_error!("Failed to read stored events for export: {err:#}");
                EMPTY_EXPORT.to_string()
            }
        }
    }

    /// Replace the collection with validated import text. On rejection the
    /// current collection is left untouched.
    pub fn import(&mut self, text: &str) -> Result<ImportSummary, ImportError> {
        let events = transfer::parse_import(text).map_err(|err| {
            log_warn!("Rejected import: {err}");
            err
        })?;

        let summary = ImportSummary::of(&events);
        self.replace_all(events);
        log_info!(
            "Imported {} events with {} occurrences",
            summary.events,
            summary.occurrences
        );
        Ok(summary)
    }

    /// Last write failure reported by storage, for a non-blocking warning.
    pub fn take_persistence_warning(&mut self) -> Option<String> {
        self.held_warning
            .take()
            .or_else(|| self.storage.take_write_error())
    }

    /// Wait until every queued write has reached storage.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.storage.flush().await
    }

    fn ensure_ready(&self) -> Result<(), StoreError> {
        match self.status {
            StoreStatus::Ready => Ok(()),
            StoreStatus::Uninitialized => Err(StoreError::NotLoaded),
        }
    }

    fn index_of(&self, event_id: &str) -> Result<usize, StoreError> {
        self.ensure_ready()?;
        self.events
            .iter()
            .position(|event| event.id == event_id)
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }
}

/// Keep the first event per id and the first occurrence per occurrence id.
/// Returns the cleaned collection and how many entries were dropped.
fn dedupe_ids(events: Vec<Event>) -> (Vec<Event>, usize) {
    let mut seen = HashSet::with_capacity(events.len());
    let mut dropped = 0;
    let mut kept = Vec::with_capacity(events.len());

    for mut event in events {
        if !seen.insert(event.id.clone()) {
            log_warn!("Dropping stored event '{}' with duplicate id {}", event.name, event.id);
            dropped += 1;
            continue;
        }

        let mut occurrence_ids = HashSet::new();
        let before = event.data.len();
        event.data.retain(|occurrence| match &occurrence.id {
            Some(id) => occurrence_ids.insert(id.clone()),
            None => true,
        });
        if event.data.len() < before {
            log_warn!(
                "Dropping {} duplicate occurrences from stored event {}",
                before - event.data.len(),
                event.id
            );
            dropped += before - event.data.len();
        }

        kept.push(event);
    }

    (kept, dropped)
}

/// Favorites first; each group keeps its original relative order.
pub fn sorted_by_favorite(events: &[Event]) -> Vec<&Event> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|event| !event.favorite);
    sorted
}
