use thiserror::Error;

/// Failures of event store operations. None of them leave the collection
/// partially modified.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("event store has not been loaded yet")]
    NotLoaded,
    #[error("Error: event not found ({0})")]
    EventNotFound(String),
    #[error("Error: occurrence not found in event {event_id}")]
    OccurrenceNotFound { event_id: String },
    #[error("{0}")]
    Validation(String),
}
