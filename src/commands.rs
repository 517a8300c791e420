//! Handlers the UI calls for each user action. Errors stop here and come
//! back as messages the screen can show.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    analytics::{self, MonthBucket},
    gestures::{CardAction, CardGesture},
    models::{Event, NewEvent, Occurrence, OccurrenceRef},
    transfer::{self, ImportError, ImportSummary},
    AppState,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub year: i32,
    pub total: usize,
    pub months: Vec<MonthBucket>,
}

/// Everything the detail screen renders for one event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAnalytics {
    pub total: usize,
    pub years: Vec<YearSummary>,
    pub heatmap: BTreeMap<NaiveDate, usize>,
    pub history: Vec<Occurrence>,
}

pub async fn list_events(state: &AppState) -> Result<Vec<Event>, String> {
    let store = state.store.lock().await;
    Ok(store.sorted().into_iter().cloned().collect())
}

pub async fn get_event(state: &AppState, event_id: &str) -> Result<Event, String> {
    let store = state.store.lock().await;
    store.event(event_id).cloned().map_err(|e| e.to_string())
}

pub async fn create_event(state: &AppState, input: NewEvent) -> Result<Event, String> {
    let mut store = state.store.lock().await;
    store.create_event(input).map_err(|e| e.to_string())
}

pub async fn quick_add(state: &AppState, event_id: &str) -> Result<Occurrence, String> {
    let mut store = state.store.lock().await;
    store
        .add_occurrence(event_id, None, "")
        .map_err(|e| e.to_string())
}

pub async fn add_occurrence(
    state: &AppState,
    event_id: &str,
    date_time: DateTime<Utc>,
    comment: String,
) -> Result<Occurrence, String> {
    let mut store = state.store.lock().await;
    store
        .add_occurrence(event_id, Some(date_time), &comment)
        .map_err(|e| e.to_string())
}

/// Call only after the user confirmed the deletion.
pub async fn delete_event(state: &AppState, event_id: &str) -> Result<(), String> {
    let mut store = state.store.lock().await;
    store
        .delete_event(event_id)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn delete_occurrence(
    state: &AppState,
    event_id: &str,
    target: OccurrenceRef,
) -> Result<(), String> {
    let mut store = state.store.lock().await;
    store
        .delete_occurrence(event_id, &target)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn toggle_favorite(state: &AppState, event_id: &str) -> Result<bool, String> {
    let mut store = state.store.lock().await;
    store.toggle_favorite(event_id).map_err(|e| e.to_string())
}

pub async fn event_analytics(state: &AppState, event_id: &str) -> Result<EventAnalytics, String> {
    let store = state.store.lock().await;
    let event = store.event(event_id).map_err(|e| e.to_string())?;

    let years = analytics::yearly_stats(&event.data, &Local)
        .into_iter()
        .map(|stats| YearSummary {
            year: stats.year,
            total: stats.total,
            months: stats.months,
        })
        .collect();

    Ok(EventAnalytics {
        total: event.total(),
        years,
        heatmap: analytics::heatmap(&event.data, &Local),
        history: analytics::history(&event.data).into_iter().cloned().collect(),
    })
}

/// Copy the stored blob to the clipboard and return it for display.
pub async fn export_to_clipboard(state: &AppState) -> Result<String, String> {
    let blob = state.store.lock().await.export().await;
    state
        .clipboard
        .write(&blob)
        .map_err(|e| format!("could not write clipboard: {e:#}"))?;
    Ok(blob)
}

/// Validate clipboard contents without importing, for the confirmation prompt.
pub async fn preview_clipboard_import(state: &AppState) -> Result<ImportSummary, String> {
    let text = read_clipboard(state)?;
    transfer::parse_import(&text)
        .map(|events| ImportSummary::of(&events))
        .map_err(|e| e.to_string())
}

pub async fn import_from_clipboard(state: &AppState) -> Result<ImportSummary, String> {
    let text = read_clipboard(state)?;
    let mut store = state.store.lock().await;
    store.import(&text).map_err(|e| e.to_string())
}

/// Classify a card gesture and apply the actions that need no further
/// input. Navigation and confirmation are left to the caller.
pub async fn handle_gesture(
    state: &AppState,
    event_id: &str,
    gesture: CardGesture,
) -> Result<Option<CardAction>, String> {
    let Some(action) = state.swipe.classify(event_id, gesture) else {
        return Ok(None);
    };

    match &action {
        CardAction::QuickAdd(id) => {
            quick_add(state, id).await?;
        }
        CardAction::ToggleFavorite(id) => {
            toggle_favorite(state, id).await?;
        }
        CardAction::OpenDetail(id)
        | CardAction::OpenDetailedAdd(id)
        | CardAction::ConfirmDelete(id) => {
            // Screens for a vanished event get an alert instead.
            get_event(state, id).await?;
        }
    }

    Ok(Some(action))
}

/// Pending storage failure, if any, for a non-blocking warning.
pub async fn persistence_warning(state: &AppState) -> Option<String> {
    state.store.lock().await.take_persistence_warning()
}

fn read_clipboard(state: &AppState) -> Result<String, String> {
    state
        .clipboard
        .read()
        .map_err(|e| ImportError::Clipboard(format!("{e:#}")).to_string())
}
