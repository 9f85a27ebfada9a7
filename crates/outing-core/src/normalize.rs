use std::collections::BTreeSet;

use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::datetime::date_from_epoch_ms;
use crate::event::{Event, RawEvent};

#[derive(Debug, thiserror::Error)]
pub enum MalformedDataError {
    #[error("events data is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parsed events data is not an array (found {found})")]
    NotAnArray { found: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Embedded,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct EventSet {
    pub events: Vec<Event>,
    pub source: DataSource,
}

/// Parses the page-embedded value. Only an empty string after trimming is
/// treated as "absent"; callers decide what to do with the error.
pub fn parse_embedded(embedded: &str) -> Result<Vec<RawEvent>, MalformedDataError> {
    let value: Value = serde_json::from_str(embedded)?;
    let Value::Array(items) = value else {
        return Err(MalformedDataError::NotAnArray {
            found: json_kind(&value),
        });
    };

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let raw: RawEvent = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(index = idx, error = %err, "skipping unreadable event record");
                continue;
            }
        };
        if !seen.insert(raw.id) {
            warn!(index = idx, id = %raw.id, "skipping event with duplicate id");
            continue;
        }
        out.push(raw);
    }

    Ok(out)
}

/// Turns the embedded value into the session's event set. Never fails:
/// missing or malformed data yields the fallback records.
#[tracing::instrument(skip(embedded, fallback, tz), fields(fallback = fallback.len()))]
pub fn normalize(embedded: Option<&str>, fallback: &[RawEvent], tz: &Tz) -> EventSet {
    let (raws, source) = match embedded.map(str::trim).filter(|s| !s.is_empty()) {
        None => {
            warn!("embedded events data was empty; using fallback data");
            (fallback.to_vec(), DataSource::Fallback)
        }
        Some(text) => match parse_embedded(text) {
            Ok(raws) => (raws, DataSource::Embedded),
            Err(err) => {
                error!(error = %err, "error processing events data; using fallback data");
                (fallback.to_vec(), DataSource::Fallback)
            }
        },
    };

    let events: Vec<Event> = raws
        .into_iter()
        .map(|raw| {
            let date = raw.date_ms.and_then(|ms| date_from_epoch_ms(ms, tz));
            if date.is_none() {
                debug!(id = %raw.id, date_ms = ?raw.date_ms, "event has no usable date");
            }
            Event::from_raw(raw, date)
        })
        .collect();

    info!(count = events.len(), ?source, "normalized events");
    EventSet { events, source }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::event::EventId;

    fn fallback() -> Vec<RawEvent> {
        vec![serde_json::from_str(r#"{"id": 99, "name": "Fallback Quiz"}"#).expect("fallback")]
    }

    #[test]
    fn empty_or_blank_input_uses_fallback_without_parsing() {
        for input in [None, Some(""), Some("   \n")] {
            let set = normalize(input, &fallback(), &chrono_tz::UTC);
            assert_eq!(set.source, DataSource::Fallback);
            assert_eq!(set.events.len(), 1);
            assert_eq!(set.events[0].id, EventId(99));
        }
    }

    #[test]
    fn malformed_input_uses_fallback() {
        for input in ["{not json", r#"{"id": 1}"#, "42", "null"] {
            let set = normalize(Some(input), &fallback(), &chrono_tz::UTC);
            assert_eq!(set.source, DataSource::Fallback, "input {input}");
            assert_eq!(set.events[0].name, "Fallback Quiz");
        }

        let set = normalize(Some("[oops"), &[], &chrono_tz::UTC);
        assert!(set.events.is_empty());
    }

    #[test]
    fn object_is_reported_as_not_an_array() {
        let err = parse_embedded(r#"{"id": 1}"#).expect_err("object is rejected");
        assert!(matches!(err, MalformedDataError::NotAnArray { found: "object" }));
    }

    #[test]
    fn converts_timestamps_and_preserves_order() {
        let json = r#"[
            {"id": 3, "name": "Karaoke", "date_ms": 1709251200000, "time": "20:00"},
            {"id": 1, "name": "Quiz", "date_ms": null, "time": "19:00"},
            {"id": 2, "name": "Gig", "date_ms": 1709337600000, "time": "21:00"}
        ]"#;
        let set = normalize(Some(json), &[], &chrono_tz::UTC);
        assert_eq!(set.source, DataSource::Embedded);

        let ids: Vec<u64> = set.events.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(set.events[0].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(set.events[1].date, None);
        assert_eq!(set.events[1].short_date_label(), "N/A");
        assert_eq!(set.events[2].date, NaiveDate::from_ymd_opt(2024, 3, 2));
    }

    #[test]
    fn skips_unreadable_and_duplicate_records() {
        let json = r#"[
            {"id": 1, "name": "First"},
            {"name": "No id"},
            {"id": 1, "name": "Again"},
            {"id": 2, "name": "Second"}
        ]"#;
        let raws = parse_embedded(json).expect("array parses");
        let names: Vec<&str> = raws.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn null_text_fields_keep_the_record() {
        let json = r#"[
            {"id": 1, "name": "Quiz", "time": "19:00", "description": null},
            {"id": 2, "name": "Gig", "location": {"address": null, "lat": 55.86, "lng": -4.25}},
            {"id": 3, "name": null, "time": null, "category": null, "location": null}
        ]"#;
        let set = normalize(Some(json), &[], &chrono_tz::UTC);
        assert_eq!(set.source, DataSource::Embedded);

        let ids: Vec<u64> = set.events.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(set.events[0].description, "");
        assert_eq!(set.events[1].location.address, "");
        assert_eq!(set.events[1].coordinates(), Some((55.86, -4.25)));
        assert_eq!(set.events[2].name, "");
        assert_eq!(set.events[2].time_label(), "N/A");
        assert_eq!(set.events[2].coordinates(), None);
    }
}
