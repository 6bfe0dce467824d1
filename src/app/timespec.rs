use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use thiserror::Error;

/// Relative-time unit with a fixed seconds-per-unit conversion.
/// Months and years use 30-day/365-day constants on purpose; calendar
/// arithmetic would shift resolved instants for already-saved ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl Unit {
    pub const ALL: [Unit; 6] = [
        Unit::Minutes,
        Unit::Hours,
        Unit::Days,
        Unit::Weeks,
        Unit::Months,
        Unit::Years,
    ];

    pub const fn seconds(self) -> i64 {
        match self {
            Unit::Minutes => 60,
            Unit::Hours => 3600,
            Unit::Days => 3600 * 24,
            Unit::Weeks => 3600 * 24 * 7,
            Unit::Months => 3600 * 24 * 30,
            Unit::Years => 3600 * 24 * 365,
        }
    }

    /// The inverse of the serialized unit code (seconds per unit).
    pub fn from_code(code: i64) -> Option<Unit> {
        Unit::ALL.into_iter().find(|unit| unit.seconds() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Unit::Minutes => "minutes",
            Unit::Hours => "hours",
            Unit::Days => "days",
            Unit::Weeks => "weeks",
            Unit::Months => "months",
            Unit::Years => "years",
        }
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("empty time spec")]
    Empty,
    #[error("unknown time spec kind {0:?}")]
    UnknownKind(String),
    #[error("time spec is missing a field")]
    MissingField,
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
    #[error("invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),
    #[error("unknown unit {0:?}")]
    UnknownUnit(String),
}

/// A point in time given either as a fixed instant or as an offset from
/// "now". Equality only looks at the active variant, so `1 hour ago` never
/// compares equal to any absolute instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeSpec {
    Absolute(DateTime<Utc>),
    Relative { value: i64, unit: Unit },
}

impl Default for TimeSpec {
    /// "now" — a zero offset.
    fn default() -> Self {
        TimeSpec::Relative {
            value: 0,
            unit: Unit::Hours,
        }
    }
}

impl TimeSpec {
    /// Turn the spec into a concrete instant. Relative specs count
    /// backwards from `now`; a zero magnitude yields `now` itself.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            TimeSpec::Absolute(instant) => instant,
            TimeSpec::Relative { value, unit } => now - Duration::seconds(value * unit.seconds()),
        }
    }

    /// Flat token list used for persisted views:
    /// `["absolute", <rfc3339-utc>]` or `["relative", <value>, <seconds-code>]`.
    pub fn serialize(&self) -> Vec<String> {
        match *self {
            TimeSpec::Absolute(instant) => vec![
                "absolute".to_string(),
                instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            ],
            TimeSpec::Relative { value, unit } => vec![
                "relative".to_string(),
                value.to_string(),
                unit.seconds().to_string(),
            ],
        }
    }

    pub fn deserialize<S: AsRef<str>>(tokens: &[S]) -> Result<TimeSpec, FormatError> {
        let kind = tokens.first().ok_or(FormatError::Empty)?.as_ref();
        match kind {
            "absolute" => {
                let raw = tokens.get(1).ok_or(FormatError::MissingField)?.as_ref();
                let instant = DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc);
                Ok(TimeSpec::Absolute(instant))
            }
            "relative" => {
                let value = tokens
                    .get(1)
                    .ok_or(FormatError::MissingField)?
                    .as_ref()
                    .parse::<i64>()?;
                let code = tokens
                    .get(2)
                    .ok_or(FormatError::MissingField)?
                    .as_ref()
                    .parse::<i64>()?;
                let unit =
                    Unit::from_code(code).ok_or_else(|| FormatError::UnknownUnit(code.to_string()))?;
                Ok(TimeSpec::Relative { value, unit })
            }
            other => Err(FormatError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TimeSpec::Absolute(instant) => write!(f, "{}", instant.format("%Y-%m-%d %H:%M")),
            TimeSpec::Relative { value: 0, .. } => f.write_str("now"),
            TimeSpec::Relative { value, unit } => write!(f, "{value} {} ago", unit.name()),
        }
    }
}

impl FromStr for TimeSpec {
    type Err = FormatError;

    /// Accepts the custom-range prompt forms: `now`, an RFC3339 timestamp,
    /// `<n><suffix>` (`15m`, `2h`, `3d`, `1w`, `6mo`, `1y`), or
    /// `<n> <unit> [ago]`.
    fn from_str(s: &str) -> Result<Self, FormatError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FormatError::Empty);
        }
        if trimmed.eq_ignore_ascii_case("now") {
            return Ok(TimeSpec::default());
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(TimeSpec::Absolute(instant.with_timezone(&Utc)));
        }

        let digits_end = trimmed
            .char_indices()
            .find(|&(idx, c)| !(c.is_ascii_digit() || (idx == 0 && c == '-')))
            .map(|(idx, _)| idx)
            .unwrap_or(trimmed.len());
        let (digits, rest) = trimmed.split_at(digits_end);
        let value = digits.parse::<i64>()?;
        let unit_token = rest
            .trim()
            .trim_end_matches("ago")
            .trim()
            .to_ascii_lowercase();
        let unit = match unit_token.as_str() {
            "m" | "min" | "mins" | "minute" | "minutes" => Unit::Minutes,
            "h" | "hour" | "hours" => Unit::Hours,
            "d" | "day" | "days" => Unit::Days,
            "w" | "week" | "weeks" => Unit::Weeks,
            "mo" | "month" | "months" => Unit::Months,
            "y" | "year" | "years" => Unit::Years,
            other => return Err(FormatError::UnknownUnit(other.to_string())),
        };
        Ok(TimeSpec::Relative { value, unit })
    }
}
