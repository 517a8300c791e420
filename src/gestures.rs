//! Maps raw card gestures on the event list to store actions.

use serde::{Deserialize, Serialize};

/// Tunable thresholds for the swipeable event card.
#[derive(Debug, Clone)]
pub struct SwipeConfig {
    /// Horizontal travel (points) before a drag is claimed as a swipe.
    pub activation_px: f64,
    /// Fraction of the screen width a release must reach to trigger.
    pub trigger_ratio: f64,
    /// The card never slides further than this in either direction.
    pub max_offset_px: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            activation_px: 5.0,
            trigger_ratio: 0.3,
            max_offset_px: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CardGesture {
    Tap,
    LongPress,
    StarTap,
    PlusTap,
    #[serde(rename_all = "camelCase")]
    SwipeRelease { dx: f64, screen_width: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "eventId")]
pub enum CardAction {
    OpenDetail(String),
    OpenDetailedAdd(String),
    QuickAdd(String),
    /// Deletion still needs the user's confirmation.
    ConfirmDelete(String),
    ToggleFavorite(String),
}

impl SwipeConfig {
    /// Whether an in-progress drag should be handled as a horizontal swipe.
    pub fn claims_drag(&self, dx: f64, dy: f64) -> bool {
        dx.abs() > dy.abs() && dx.abs() > self.activation_px
    }

    /// Card offset to render for the current drag distance.
    pub fn offset(&self, dx: f64) -> f64 {
        dx.clamp(-self.max_offset_px, self.max_offset_px)
    }

    pub fn classify(&self, event_id: &str, gesture: CardGesture) -> Option<CardAction> {
        let id = event_id.to_string();
        match gesture {
            CardGesture::Tap => Some(CardAction::OpenDetail(id)),
            CardGesture::PlusTap => Some(CardAction::OpenDetailedAdd(id)),
            CardGesture::StarTap => Some(CardAction::ToggleFavorite(id)),
            CardGesture::LongPress => Some(CardAction::ConfirmDelete(id)),
            CardGesture::SwipeRelease { dx, screen_width } => {
                if dx.abs() < screen_width * self.trigger_ratio {
                    None
                } else if dx > 0.0 {
                    Some(CardAction::QuickAdd(id))
                } else {
                    Some(CardAction::ConfirmDelete(id))
                }
            }
        }
    }
}
