use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

/// One ingested log line: a concrete instant plus a flat field map,
/// resolved once at decode time. Identity is positional within the
/// current event sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl LogEvent {
    /// Decode the wire shape `{"timestamp": <rfc3339>, "source": {...}}`.
    /// Unknown fields inside `source` are kept; non-string values are
    /// stringified here so cell rendering never re-interprets JSON.
    pub fn from_value(value: &Value) -> Result<LogEvent> {
        let raw_ts = value
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("event has no timestamp"))?;
        let timestamp = DateTime::parse_from_rfc3339(raw_ts)
            .with_context(|| format!("invalid event timestamp {raw_ts:?}"))?
            .with_timezone(&Utc);
        let source = value
            .get("source")
            .and_then(Value::as_object)
            .ok_or_else(|| anyhow!("event has no source object"))?;
        let fields = source
            .iter()
            .map(|(key, value)| (key.clone(), field_text(value)))
            .collect();
        Ok(LogEvent { timestamp, fields })
    }

    /// Round-trip back to JSON for the $EDITOR detail view.
    pub fn to_json(&self) -> Value {
        let source: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "source": source,
        })
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Field name -> value -> occurrence count, as reported alongside the
/// events. Backs the column-toggle panel.
pub type FieldSummary = BTreeMap<String, BTreeMap<String, u64>>;

/// A decoded search-results document.
pub struct SearchResults {
    pub events: Vec<LogEvent>,
    pub fields: FieldSummary,
}

impl SearchResults {
    pub fn parse(text: &str) -> Result<SearchResults> {
        let value: Value = serde_json::from_str(text).context("invalid JSON")?;
        Self::from_value(&value)
    }

    /// Accepts either the `{"events": [...], "fields": {...}}` envelope or
    /// a bare event array. An event that fails to decode is skipped with a
    /// warning; one bad record never discards the document.
    pub fn from_value(value: &Value) -> Result<SearchResults> {
        static EMPTY: Vec<Value> = Vec::new();
        let (raw_events, raw_fields) = match value {
            Value::Array(items) => (items, None),
            Value::Object(map) => {
                let events = map.get("events").and_then(Value::as_array).unwrap_or(&EMPTY);
                (events, map.get("fields"))
            }
            _ => return Err(anyhow!("expected a results object or an event array")),
        };

        let mut events = Vec::with_capacity(raw_events.len());
        for (index, raw) in raw_events.iter().enumerate() {
            match LogEvent::from_value(raw) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!("skipping event {index}: {err:#}"),
            }
        }

        let fields = raw_fields.map(decode_field_summary).unwrap_or_default();
        Ok(SearchResults { events, fields })
    }
}

fn decode_field_summary(value: &Value) -> FieldSummary {
    let Some(map) = value.as_object() else {
        return FieldSummary::default();
    };
    map.iter()
        .map(|(field, counts)| {
            let values = counts
                .as_object()
                .map(|inner| {
                    inner
                        .iter()
                        .map(|(value, count)| (value.clone(), count.as_u64().unwrap_or(0)))
                        .collect()
                })
                .unwrap_or_default();
            (field.clone(), values)
        })
        .collect()
}
