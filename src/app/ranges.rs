use chrono::{DateTime, Utc};

use super::table::IndexError;
use super::timespec::{TimeSpec, Unit};

/// Label of the synthetic trailing row that has no backing pair; choosing
/// it means "prompt for a custom range".
pub const CUSTOM_ROW_LABEL: &str = "Custom ...";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: TimeSpec,
    pub end: TimeSpec,
}

impl TimeRange {
    pub fn new(start: TimeSpec, end: TimeSpec) -> Self {
        Self { start, end }
    }

    pub fn label(&self) -> String {
        format!("{} to {}", self.start, self.end)
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start.resolve(now), self.end.resolve(now))
    }
}

/// Ordered list of time-range choices. Insertion order is the display
/// order; no two entries are ever value-equal.
#[derive(Default)]
pub struct RangeChoices {
    choices: Vec<TimeRange>,
}

impl RangeChoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-insert: an equal pair keeps its existing position and the
    /// list is not reordered; a new pair is appended. Returns the row of
    /// the pair either way.
    pub fn add_choice(&mut self, start: TimeSpec, end: TimeSpec) -> usize {
        let entry = TimeRange::new(start, end);
        if let Some(index) = self.choices.iter().position(|choice| *choice == entry) {
            return index;
        }
        self.choices.push(entry);
        self.choices.len() - 1
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn at(&self, index: usize) -> Result<&TimeRange, IndexError> {
        self.choices.get(index).ok_or(IndexError {
            index,
            len: self.choices.len(),
        })
    }

    /// Display rows: every backed pair plus the synthetic custom row.
    pub fn row_count(&self) -> usize {
        self.choices.len() + 1
    }

    /// The backing pair for a display row; `None` for the custom row.
    pub fn choice(&self, row: usize) -> Option<&TimeRange> {
        self.choices.get(row)
    }

    pub fn label(&self, row: usize) -> Option<String> {
        if row < self.choices.len() {
            Some(self.choices[row].label())
        } else if row == self.choices.len() {
            Some(CUSTOM_ROW_LABEL.to_string())
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.choices.iter()
    }
}

/// The stock presets offered before the user adds anything.
pub fn default_choices() -> RangeChoices {
    let mut choices = RangeChoices::new();
    for (value, unit) in [
        (15, Unit::Minutes),
        (1, Unit::Hours),
        (4, Unit::Hours),
        (1, Unit::Days),
        (1, Unit::Weeks),
        (1, Unit::Months),
        (1, Unit::Years),
    ] {
        choices.add_choice(TimeSpec::Relative { value, unit }, TimeSpec::default());
    }
    choices
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quarter_hour() -> (TimeSpec, TimeSpec) {
        (
            TimeSpec::Relative {
                value: 15,
                unit: Unit::Minutes,
            },
            TimeSpec::default(),
        )
    }

    #[test]
    fn add_choice_is_idempotent_under_value_equality() {
        let mut choices = RangeChoices::new();
        let (start, end) = quarter_hour();

        assert_eq!(choices.add_choice(start, end), 0);
        assert_eq!(choices.len(), 1);

        // Same values, fresh instances.
        let (start, end) = quarter_hour();
        assert_eq!(choices.add_choice(start, end), 0);
        assert_eq!(choices.len(), 1);
    }

    #[test]
    fn distinct_pair_appends_and_returns_last_index() {
        let mut choices = RangeChoices::new();
        let (start, end) = quarter_hour();
        choices.add_choice(start, end);

        let index = choices.add_choice(
            TimeSpec::Relative {
                value: 1,
                unit: Unit::Hours,
            },
            TimeSpec::default(),
        );
        assert_eq!(index, 1);
        assert_eq!(choices.len(), 2);
    }

    #[test]
    fn dedup_does_not_reorder() {
        let mut choices = RangeChoices::new();
        let (start, end) = quarter_hour();
        choices.add_choice(start, end);
        choices.add_choice(
            TimeSpec::Relative {
                value: 1,
                unit: Unit::Hours,
            },
            TimeSpec::default(),
        );

        // Re-adding the first pair returns 0 and leaves the order alone.
        let (start, end) = quarter_hour();
        assert_eq!(choices.add_choice(start, end), 0);
        assert_eq!(choices.at(0).unwrap().start, start);
    }

    #[test]
    fn at_is_bounds_checked() {
        let mut choices = RangeChoices::new();
        let (start, end) = quarter_hour();
        choices.add_choice(start, end);

        assert!(choices.at(0).is_ok());
        assert_eq!(choices.at(1), Err(IndexError { index: 1, len: 1 }));
    }

    #[test]
    fn empty_list_still_shows_the_custom_row() {
        let choices = RangeChoices::new();
        assert_eq!(choices.row_count(), 1);
        assert_eq!(choices.label(0).as_deref(), Some(CUSTOM_ROW_LABEL));
        assert!(choices.choice(0).is_none());
        assert_eq!(choices.label(1), None);
    }

    #[test]
    fn labels_cover_pairs_then_custom_row() {
        let mut choices = RangeChoices::new();
        let (start, end) = quarter_hour();
        choices.add_choice(start, end);

        assert_eq!(choices.row_count(), 2);
        assert_eq!(choices.label(0).as_deref(), Some("15 minutes ago to now"));
        assert_eq!(choices.label(1).as_deref(), Some(CUSTOM_ROW_LABEL));
        assert!(choices.choice(0).is_some());
        assert!(choices.choice(1).is_none());
    }

    #[test]
    fn default_choices_are_seven_presets() {
        let choices = default_choices();
        assert_eq!(choices.len(), 7);
        assert_eq!(choices.label(0).as_deref(), Some("15 minutes ago to now"));
        assert_eq!(choices.label(6).as_deref(), Some("1 years ago to now"));
    }

    #[test]
    fn resolve_produces_window_endpoints() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let range = TimeRange::new(
            TimeSpec::Relative {
                value: 1,
                unit: Unit::Hours,
            },
            TimeSpec::default(),
        );
        let (start, end) = range.resolve(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
        assert_eq!(end, now);
    }
}
