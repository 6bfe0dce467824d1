use chrono::{DateTime, SecondsFormat, Utc};

use crate::app::TimeRange;

/// The parameters a search backend expects: a resolved window plus the raw
/// query text. Transport is the caller's business; this only guarantees
/// UTC RFC3339 instants suitable for encoding.
pub struct SearchRequest {
    pub range: TimeRange,
    pub query: String,
}

impl SearchRequest {
    pub fn new(range: TimeRange, query: impl Into<String>) -> Self {
        Self {
            range,
            query: query.into(),
        }
    }

    /// Ordered `start` / `end` / `query` pairs, with the range resolved
    /// against the given `now`.
    pub fn params(&self, now: DateTime<Utc>) -> Vec<(String, String)> {
        let (start, end) = self.range.resolve(now);
        vec![
            (
                "start".to_string(),
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "end".to_string(),
                end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("query".to_string(), self.query.clone()),
        ]
    }

    /// Human-readable `key=value&...` line for the status bar.
    pub fn param_line(&self, now: DateTime<Utc>) -> String {
        self.params(now)
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{TimeSpec, Unit};
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn params_resolve_to_utc_rfc3339() {
        let range = TimeRange::new(
            TimeSpec::Relative {
                value: 15,
                unit: Unit::Minutes,
            },
            TimeSpec::default(),
        );
        let request = SearchRequest::new(range, "hostname = \"web01\"");
        let params = request.params(noon());
        assert_eq!(
            params,
            vec![
                ("start".to_string(), "2024-01-01T11:45:00Z".to_string()),
                ("end".to_string(), "2024-01-01T12:00:00Z".to_string()),
                ("query".to_string(), "hostname = \"web01\"".to_string()),
            ]
        );
    }

    #[test]
    fn query_text_is_passed_through_raw() {
        let range = TimeRange::new(TimeSpec::Absolute(noon()), TimeSpec::default());
        let request = SearchRequest::new(range, "a & b = \"c d\"");
        let line = request.param_line(noon());
        assert!(line.starts_with("start=2024-01-01T12:00:00Z&end="));
        assert!(line.ends_with("query=a & b = \"c d\""));
    }
}
