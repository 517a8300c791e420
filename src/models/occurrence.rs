use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One timestamped instance of an event happening.
///
/// `id` is absent on occurrences written before ids were assigned; those are
/// addressed by `(date_time, comment)` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(with = "date_time_millis")]
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

impl Occurrence {
    /// New occurrence with a fresh id. The timestamp is truncated to
    /// milliseconds so it survives a serialize/parse cycle unchanged.
    pub fn new(date_time: DateTime<Utc>, comment: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            date_time: date_time.trunc_subsecs(3),
            comment: comment.into(),
        }
    }

    pub fn now(comment: impl Into<String>) -> Self {
        Self::new(Utc::now(), comment)
    }

    pub fn matches(&self, target: &OccurrenceRef) -> bool {
        match target {
            OccurrenceRef::Id(id) => self.id.as_deref() == Some(id.as_str()),
            OccurrenceRef::Content { date_time, comment } => {
                self.date_time == *date_time && self.comment == *comment
            }
        }
    }
}

/// How a delete request addresses an occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceRef {
    Id(String),
    /// Legacy addressing; the first occurrence with equal timestamp and comment wins.
    Content {
        date_time: DateTime<Utc>,
        comment: String,
    },
}

impl OccurrenceRef {
    /// Prefer the stable id, fall back to content for id-less records.
    pub fn for_occurrence(occurrence: &Occurrence) -> Self {
        match &occurrence.id {
            Some(id) => OccurrenceRef::Id(id.clone()),
            None => OccurrenceRef::Content {
                date_time: occurrence.date_time,
                comment: occurrence.comment.clone(),
            },
        }
    }
}

/// RFC 3339 in UTC with exactly three fractional digits, e.g.
/// `2024-12-25T14:30:45.123Z`. Fixed width keeps the strings sortable.
/// Any RFC 3339 offset is accepted when reading.
pub(crate) mod date_time_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| D::Error::custom(format!("invalid dateTime '{raw}': {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_with_millisecond_utc_timestamp() {
        let occurrence = Occurrence {
            id: None,
            date_time: Utc.with_ymd_and_hms(2024, 12, 25, 14, 30, 45).unwrap(),
            comment: "First occurrence".into(),
        };

        let json = serde_json::to_string(&occurrence).unwrap();
        assert_eq!(
            json,
            r#"{"dateTime":"2024-12-25T14:30:45.000Z","comment":"First occurrence"}"#
        );
    }

    #[test]
    fn accepts_offsets_and_normalizes_to_utc() {
        let occurrence: Occurrence =
            serde_json::from_str(r#"{"dateTime":"2024-01-01T02:00:00+02:00","comment":""}"#)
                .unwrap();
        assert_eq!(
            occurrence.date_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(occurrence.id.is_none());
    }

    #[test]
    fn rejects_unparseable_timestamp() {
        let result: Result<Occurrence, _> =
            serde_json::from_str(r#"{"dateTime":"yesterday","comment":""}"#);
        assert!(result.is_err());
    }

    #[test]
    fn new_truncates_to_milliseconds() {
        let precise = Utc.timestamp_nanos(1_700_000_000_123_456_789);
        let occurrence = Occurrence::new(precise, "");
        assert_eq!(occurrence.date_time.timestamp_subsec_nanos(), 123_000_000);
        assert!(occurrence.id.is_some());
    }

    #[test]
    fn content_ref_matches_on_timestamp_and_comment() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let legacy = Occurrence {
            id: None,
            date_time: at,
            comment: "note".into(),
        };

        assert!(legacy.matches(&OccurrenceRef::for_occurrence(&legacy)));
        assert!(!legacy.matches(&OccurrenceRef::Content {
            date_time: at,
            comment: "other".into(),
        }));
        assert!(!legacy.matches(&OccurrenceRef::Id("x".into())));
    }
}
