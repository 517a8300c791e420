//! Moving the whole collection in and out of the app as text.
//!
//! Export hands out the persisted blob verbatim. Import only commits text
//! that decodes to a well-formed event list: a JSON array of event objects
//! with every required field, non-empty unique ids and non-empty names.

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::Event;

pub const EMPTY_EXPORT: &str = "[]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("there is nothing to import")]
    Empty,
    #[error("data is not valid JSON: {0}")]
    Syntax(String),
    #[error("data must be a list of events")]
    NotAnArray,
    #[error("event at position {index} is malformed: {reason}")]
    InvalidEvent { index: usize, reason: String },
    #[error("event at position {index} has an empty id")]
    EmptyId { index: usize },
    #[error("event at position {index} has an empty name")]
    EmptyName { index: usize },
    #[error("event id '{0}' appears more than once")]
    DuplicateId(String),
    #[error("could not read clipboard: {0}")]
    Clipboard(String),
}

/// What an accepted import contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub events: usize,
    pub occurrences: usize,
}

impl ImportSummary {
    pub fn of(events: &[Event]) -> Self {
        Self {
            events: events.len(),
            occurrences: events.iter().map(|e| e.data.len()).sum(),
        }
    }
}

/// Decode and validate an import payload without touching any state.
pub fn parse_import(text: &str) -> Result<Vec<Event>, ImportError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ImportError::Empty);
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|err| ImportError::Syntax(err.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ImportError::NotAnArray);
    };

    let mut events = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(ImportError::InvalidEvent {
                index,
                reason: "expected an object".into(),
            });
        }
        let event: Event = serde_json::from_value(item).map_err(|err| {
            ImportError::InvalidEvent {
                index,
                reason: err.to_string(),
            }
        })?;
        events.push(event);
    }

    validate_events(&events)?;
    Ok(events)
}

pub fn validate_events(events: &[Event]) -> Result<(), ImportError> {
    let mut seen = HashSet::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        if event.id.trim().is_empty() {
            return Err(ImportError::EmptyId { index });
        }
        if event.name.trim().is_empty() {
            return Err(ImportError::EmptyName { index });
        }
        if !seen.insert(event.id.as_str()) {
            return Err(ImportError::DuplicateId(event.id.clone()));
        }

        let mut occurrence_ids = HashSet::new();
        for occurrence in &event.data {
            if let Some(id) = &occurrence.id {
                if !occurrence_ids.insert(id.as_str()) {
                    return Err(ImportError::InvalidEvent {
                        index,
                        reason: format!("occurrence id '{id}' appears more than once"),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Text clipboard the settings screen reads from and writes to.
pub trait Clipboard: Send + Sync {
    fn read(&self) -> Result<String>;
    fn write(&self, text: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(contents.into()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, String> {
        match self.contents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clipboard for MemoryClipboard {
    fn read(&self) -> Result<String> {
        Ok(self.guard().clone())
    }

    fn write(&self, text: &str) -> Result<()> {
        *self.guard() = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_EVENT: &str = r##"[{"id":"1","name":"Event with data","color":"#1E3A8A","icon":"🌈","comment":"","favorite":false,"data":[{"dateTime":"2024-12-25T14:30:45.123Z","comment":"First occurrence"},{"dateTime":"2024-12-26T10:00:00.000Z","comment":"Second occurrence"}]}]"##;

    #[test]
    fn accepts_well_formed_payload() {
        let events = parse_import(ONE_EVENT).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data[0].comment, "First occurrence");
        assert_eq!(
            ImportSummary::of(&events),
            ImportSummary {
                events: 1,
                occurrences: 2
            }
        );
    }

    #[test]
    fn empty_array_is_a_valid_import() {
        assert_eq!(parse_import("  [] ").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_blank_and_invalid_json() {
        assert_eq!(parse_import("   "), Err(ImportError::Empty));
        assert!(matches!(parse_import("[{"), Err(ImportError::Syntax(_))));
    }

    #[test]
    fn rejects_non_array_json() {
        assert_eq!(parse_import(r#"{"id":"1"}"#), Err(ImportError::NotAnArray));
        assert_eq!(parse_import("42"), Err(ImportError::NotAnArray));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let err = parse_import(r##"[{"name":"No id","color":"#000000","icon":"x","data":[]}]"##)
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidEvent { index: 0, .. }));

        let err = parse_import(r#"[1, 2]"#).unwrap_err();
        assert!(matches!(err, ImportError::InvalidEvent { index: 0, .. }));
    }

    #[test]
    fn rejects_duplicate_ids_and_blank_names() {
        let duplicate = r##"[
            {"id":"1","name":"A","color":"#000000","icon":"x","data":[]},
            {"id":"1","name":"B","color":"#000000","icon":"y","data":[]}
        ]"##;
        assert_eq!(
            parse_import(duplicate),
            Err(ImportError::DuplicateId("1".into()))
        );

        let blank = r##"[{"id":"1","name":"  ","color":"#000000","icon":"x","data":[]}]"##;
        assert_eq!(parse_import(blank), Err(ImportError::EmptyName { index: 0 }));
    }

    #[test]
    fn rejects_bad_occurrence_timestamp() {
        let payload = r##"[{"id":"1","name":"A","color":"#000000","icon":"x","data":[{"dateTime":"soon","comment":""}]}]"##;
        assert!(matches!(
            parse_import(payload),
            Err(ImportError::InvalidEvent { index: 0, .. })
        ));
    }

    #[test]
    fn memory_clipboard_round_trip() {
        let clipboard = MemoryClipboard::default();
        clipboard.write("[]").unwrap();
        assert_eq!(clipboard.read().unwrap(), "[]");
    }
}
