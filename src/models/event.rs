use serde::{Deserialize, Serialize};

use super::Occurrence;

/// A user-defined trackable category and its occurrence history.
///
/// `data` keeps insertion order; display code reverses or sorts on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub favorite: bool,
    pub data: Vec<Occurrence>,
}

impl Event {
    pub fn total(&self) -> usize {
        self.data.len()
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    pub color: String,
    pub icon: String,
}

/// `#RRGGBB`, case-insensitive.
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_blob_written_without_optional_fields() {
        let event: Event = serde_json::from_str(
            r##"{"id":"9","name":"Ran","color":"#2E7D32","icon":"🏃","data":[]}"##,
        )
        .unwrap();
        assert_eq!(event.comment, "");
        assert!(!event.favorite);
    }

    #[test]
    fn missing_data_is_rejected() {
        let result: Result<Event, _> =
            serde_json::from_str(r##"{"id":"9","name":"Ran","color":"#2E7D32","icon":"🏃"}"##);
        assert!(result.is_err());
    }

    #[test]
    fn hex_color_validation() {
        assert!(is_hex_color("#1E3A8A"));
        assert!(is_hex_color("#b71c1c"));
        assert!(!is_hex_color("1E3A8A"));
        assert!(!is_hex_color("#1E3A8"));
        assert!(!is_hex_color("#GGGGGG"));
    }
}
