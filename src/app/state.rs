use chrono::Utc;
use ratatui::widgets::{ListState, TableState};
use regex::Regex;

use crate::model::{FieldSummary, LogEvent, SearchResults};
use crate::query::SearchRequest;
use crate::views::ViewSnapshot;

use super::ranges::{RangeChoices, default_choices};
use super::table::{LogTable, StructuralChange};
use super::timespec::{FormatError, TimeSpec};

pub const DEFAULT_COLUMNS: [&str; 3] = ["hostname", "programname", "msg"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Table,
    Detail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    QueryInput,
    RangeSelect,
    CustomRange,
    FieldSelect,
    ViewSelect,
    SaveView,
}

pub struct App {
    pub table: LogTable,
    pub all_events: Vec<LogEvent>,
    pub field_summary: FieldSummary,
    pub ranges: RangeChoices,
    pub selected_range: usize,
    pub table_state: TableState,
    pub focus: Focus,
    pub input_mode: InputMode,
    pub query: String,
    pub query_regex: Option<Regex>,
    pub input_buffer: String,
    pub input_error: Option<String>,
    pub range_select_state: ListState,
    pub field_select_state: ListState,
    pub view_select_state: ListState,
    pub view_names: Vec<String>,
    pub status: Option<String>,
    pub show_help: bool,
    pub detail_scroll: u16,
    pub detail_total_lines: usize,
    pub last_detail_height: usize,
    pub last_table_height: usize,
    pub force_redraw: bool,
}

impl App {
    pub fn new() -> Self {
        let mut table_state = TableState::default();
        table_state.select(None);
        Self {
            table: LogTable::new(DEFAULT_COLUMNS),
            all_events: Vec::new(),
            field_summary: FieldSummary::default(),
            ranges: default_choices(),
            selected_range: 0,
            table_state,
            focus: Focus::Table,
            input_mode: InputMode::Normal,
            query: String::new(),
            query_regex: None,
            input_buffer: String::new(),
            input_error: None,
            range_select_state: ListState::default(),
            field_select_state: ListState::default(),
            view_select_state: ListState::default(),
            view_names: Vec::new(),
            status: None,
            show_help: false,
            detail_scroll: 0,
            detail_total_lines: 0,
            last_detail_height: 0,
            last_table_height: 0,
            force_redraw: true,
        }
    }

    /// A decoded results document arrived; keep the full event list and
    /// re-project it through the active range and query.
    pub fn apply_results(&mut self, results: SearchResults) {
        self.all_events = results.events;
        self.field_summary = results.fields;
        self.status = Some(format!("{} events loaded", self.all_events.len()));
        self.reproject();
    }

    /// Project the full event list through the selected time window and the
    /// query regex, then hand the survivors to the table wholesale.
    pub fn reproject(&mut self) {
        let now = Utc::now();
        let window = self
            .ranges
            .choice(self.selected_range)
            .map(|range| range.resolve(now));

        let visible: Vec<LogEvent> = self
            .all_events
            .iter()
            .filter(|event| {
                if let Some((start, end)) = window {
                    if event.timestamp < start || event.timestamp > end {
                        return false;
                    }
                }
                self.matches_query(event)
            })
            .cloned()
            .collect();

        if let StructuralChange::RowsReset = self.table.set_events(visible) {
            if self.table.row_count() == 0 {
                self.table_state.select(None);
            } else {
                self.table_state.select(Some(0));
            }
            self.reset_detail_position();
            self.force_redraw = true;
        }
    }

    fn matches_query(&self, event: &LogEvent) -> bool {
        let Some(re) = &self.query_regex else {
            return true;
        };
        let hay = event
            .fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        re.is_match(&hay)
    }

    /// Select a display row from the range list. Returns false for the
    /// synthetic custom row, which has no backing pair and needs a prompt.
    pub fn select_range(&mut self, row: usize) -> bool {
        if self.ranges.choice(row).is_none() {
            return false;
        }
        self.selected_range = row;
        self.reproject();
        true
    }

    /// Parse `<start>..<end>` from the custom-range prompt, register it
    /// through the dedup path, and select it. An omitted end means "now".
    pub fn add_custom_range(&mut self, input: &str) -> Result<(), FormatError> {
        let (start_text, end_text) = match input.split_once("..") {
            Some((start, end)) => (start, end),
            None => (input, ""),
        };
        let start: TimeSpec = start_text.parse()?;
        let end: TimeSpec = if end_text.trim().is_empty() {
            TimeSpec::default()
        } else {
            end_text.parse()?
        };
        self.selected_range = self.ranges.add_choice(start, end);
        self.reproject();
        Ok(())
    }

    /// Interactive query update. An invalid pattern keeps the previous
    /// query active and reports the error instead.
    pub fn apply_query(&mut self, pattern: &str) -> bool {
        if pattern.is_empty() {
            self.query.clear();
            self.query_regex = None;
            self.input_error = None;
            self.reproject();
            return true;
        }
        match Regex::new(pattern) {
            Ok(re) => {
                self.query = pattern.to_string();
                self.query_regex = Some(re);
                self.input_error = None;
                self.reproject();
                true
            }
            Err(err) => {
                self.input_error = Some(err.to_string());
                false
            }
        }
    }

    /// Non-interactive query restore (view load): keep the raw text even
    /// if it does not compile as a regex.
    pub fn set_query_text(&mut self, text: &str) {
        self.query = text.to_string();
        self.query_regex = Regex::new(text).ok();
        if !text.is_empty() && self.query_regex.is_none() {
            self.status = Some("saved query kept as text only".to_string());
        }
    }

    pub fn toggle_field(&mut self, name: &str) {
        let change = self.table.toggle_column(name);
        self.status = Some(match change {
            StructuralChange::ColumnRemoved { .. } => format!("column {name:?} hidden"),
            StructuralChange::ColumnAppended { .. } => format!("column {name:?} shown"),
            _ => return,
        });
        self.force_redraw = true;
    }

    pub fn reset_columns(&mut self) {
        if self.table.set_columns(DEFAULT_COLUMNS).is_some() {
            self.status = Some("columns reset".to_string());
            self.force_redraw = true;
        }
    }

    /// Everything the current session would want restored later.
    pub fn snapshot(&self) -> ViewSnapshot {
        let mut snapshot = ViewSnapshot {
            columns: self.table.columns().to_vec(),
            query: (!self.query.is_empty()).then(|| self.query.clone()),
            ..ViewSnapshot::default()
        };
        if let Some(range) = self.ranges.choice(self.selected_range) {
            snapshot.set_range(range);
        }
        snapshot
    }

    /// Restore a saved view. The stored range re-enters the choice list
    /// through the same dedup path as interactive additions.
    pub fn apply_view(&mut self, snapshot: &ViewSnapshot) {
        if !snapshot.columns.is_empty() {
            self.table.set_columns(snapshot.columns.clone());
        }
        if let Some(query) = &snapshot.query {
            self.set_query_text(query);
        }
        if let Some(range) = snapshot.range() {
            self.selected_range = self.ranges.add_choice(range.start, range.end);
        }
        self.reproject();
    }

    /// The request a transport collaborator would send for the current
    /// selection, or None while the custom row is somehow selected.
    pub fn search_request(&self) -> Option<SearchRequest> {
        self.ranges
            .choice(self.selected_range)
            .map(|range| SearchRequest::new(*range, self.query.clone()))
    }

    pub fn current_record(&self) -> Option<&LogEvent> {
        let row = self.table_state.selected()?;
        self.table.row_record(row).ok()
    }

    pub fn next(&mut self) {
        if self.table.row_count() == 0 {
            return;
        }
        let i = self.table_state.selected().unwrap_or(0);
        let next = (i + 1).min(self.table.row_count() - 1);
        self.table_state.select(Some(next));
        self.reset_detail_position();
    }

    pub fn previous(&mut self) {
        if self.table.row_count() == 0 {
            return;
        }
        let i = self.table_state.selected().unwrap_or(0);
        self.table_state.select(Some(i.saturating_sub(1)));
        self.reset_detail_position();
    }

    pub fn page_down(&mut self) {
        if self.table.row_count() == 0 {
            return;
        }
        let half = (self.last_table_height.max(1) / 2).max(1);
        let i = self.table_state.selected().unwrap_or(0);
        let next = (i + half).min(self.table.row_count() - 1);
        self.table_state.select(Some(next));
        self.reset_detail_position();
    }

    pub fn page_up(&mut self) {
        if self.table.row_count() == 0 {
            return;
        }
        let half = (self.last_table_height.max(1) / 2).max(1);
        let i = self.table_state.selected().unwrap_or(0);
        self.table_state.select(Some(i.saturating_sub(half)));
        self.reset_detail_position();
    }

    pub fn select_first(&mut self) {
        if self.table.row_count() == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(0));
        }
        self.reset_detail_position();
    }

    pub fn select_last(&mut self) {
        if self.table.row_count() == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(self.table.row_count() - 1));
        }
        self.reset_detail_position();
    }

    pub fn detail_down(&mut self, lines: usize) {
        if self.detail_total_lines == 0 {
            return;
        }
        let max_offset = self
            .detail_total_lines
            .saturating_sub(self.last_detail_height.max(1));
        self.detail_scroll = (self.detail_scroll as usize + lines).min(max_offset) as u16;
    }

    pub fn detail_up(&mut self, lines: usize) {
        self.detail_scroll = self.detail_scroll.saturating_sub(lines as u16);
    }

    pub fn reset_detail_position(&mut self) {
        self.detail_scroll = 0;
    }

    /// Names offered by the field panel: every field reported by the
    /// summary plus any currently visible column, so toggling off is
    /// always possible even for columns the summary does not mention.
    pub fn field_panel_entries(&self) -> Vec<(String, u64, bool)> {
        let mut entries: Vec<(String, u64, bool)> = self
            .field_summary
            .iter()
            .map(|(name, values)| {
                let total = values.values().sum();
                let visible = self.table.columns().iter().any(|c| c == name);
                (name.clone(), total, visible)
            })
            .collect();
        for column in self.table.columns() {
            if !self.field_summary.contains_key(column) {
                entries.push((column.clone(), 0, true));
            }
        }
        entries
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Unit;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn event_at(timestamp: DateTime<Utc>, msg: &str) -> LogEvent {
        let mut fields = BTreeMap::new();
        fields.insert("msg".to_string(), msg.to_string());
        fields.insert("hostname".to_string(), "web01".to_string());
        LogEvent { timestamp, fields }
    }

    fn results_with(events: Vec<LogEvent>) -> SearchResults {
        SearchResults {
            events,
            fields: FieldSummary::default(),
        }
    }

    #[test]
    fn reprojection_keeps_only_events_inside_the_window() {
        let mut app = App::new();
        // Default selection is the 15-minute preset.
        let now = Utc::now();
        let inside = event_at(now - Duration::minutes(5), "recent");
        let outside = event_at(now - Duration::hours(2), "old");
        app.apply_results(results_with(vec![inside, outside]));

        assert_eq!(app.table.row_count(), 1);
        assert_eq!(app.table.cell_value(0, "msg").unwrap(), "recent");
    }

    #[test]
    fn wider_range_readmits_older_events() {
        let mut app = App::new();
        let now = Utc::now();
        app.apply_results(results_with(vec![
            event_at(now - Duration::minutes(5), "recent"),
            event_at(now - Duration::hours(2), "old"),
        ]));
        assert_eq!(app.table.row_count(), 1);

        // Row 2 is the 4-hour preset.
        assert!(app.select_range(2));
        assert_eq!(app.table.row_count(), 2);
    }

    #[test]
    fn custom_row_is_not_selectable_directly() {
        let mut app = App::new();
        let custom_row = app.ranges.len();
        assert!(!app.select_range(custom_row));
        assert_eq!(app.selected_range, 0);
    }

    #[test]
    fn custom_range_goes_through_dedup() {
        let mut app = App::new();
        let before = app.ranges.len();

        app.add_custom_range("30m..now").unwrap();
        assert_eq!(app.ranges.len(), before + 1);
        assert_eq!(app.selected_range, before);

        // Same range again: no growth, same row selected.
        app.add_custom_range("30m").unwrap();
        assert_eq!(app.ranges.len(), before + 1);
        assert_eq!(app.selected_range, before);

        // An existing preset comes back as its original row.
        app.add_custom_range("15m..now").unwrap();
        assert_eq!(app.ranges.len(), before + 1);
        assert_eq!(app.selected_range, 0);
    }

    #[test]
    fn bad_custom_range_reports_format_error() {
        let mut app = App::new();
        assert!(app.add_custom_range("whenever").is_err());
        assert_eq!(app.selected_range, 0);
    }

    #[test]
    fn query_filters_on_field_values() {
        let mut app = App::new();
        let now = Utc::now();
        app.apply_results(results_with(vec![
            event_at(now, "disk full"),
            event_at(now, "all quiet"),
        ]));
        assert_eq!(app.table.row_count(), 2);

        assert!(app.apply_query("disk"));
        assert_eq!(app.table.row_count(), 1);
        assert_eq!(app.table.cell_value(0, "msg").unwrap(), "disk full");

        assert!(app.apply_query(""));
        assert_eq!(app.table.row_count(), 2);
    }

    #[test]
    fn invalid_query_keeps_previous_projection() {
        let mut app = App::new();
        let now = Utc::now();
        app.apply_results(results_with(vec![event_at(now, "one")]));

        assert!(!app.apply_query("["));
        assert!(app.input_error.is_some());
        assert!(app.query_regex.is_none());
        assert_eq!(app.table.row_count(), 1);
    }

    #[test]
    fn snapshot_and_apply_view_round_trip() {
        let mut app = App::new();
        app.toggle_field("pid");
        app.apply_query("disk");
        app.add_custom_range("2h..now").unwrap();
        let snapshot = app.snapshot();

        let mut fresh = App::new();
        let ranges_before = fresh.ranges.len();
        fresh.apply_view(&snapshot);

        assert_eq!(fresh.table.columns(), app.table.columns());
        assert_eq!(fresh.query, "disk");
        // The restored 2h range is new to the fresh list.
        assert_eq!(fresh.ranges.len(), ranges_before + 1);
        assert_eq!(fresh.selected_range, ranges_before);

        // Applying the same view again dedups instead of growing.
        fresh.apply_view(&snapshot);
        assert_eq!(fresh.ranges.len(), ranges_before + 1);
    }

    #[test]
    fn view_with_preset_range_selects_existing_row() {
        let mut app = App::new();
        let mut snapshot = ViewSnapshot::default();
        snapshot.set_range(&crate::app::TimeRange::new(
            TimeSpec::Relative {
                value: 1,
                unit: Unit::Days,
            },
            TimeSpec::default(),
        ));

        let len_before = app.ranges.len();
        app.apply_view(&snapshot);
        assert_eq!(app.ranges.len(), len_before);
        assert_eq!(app.selected_range, 3);
    }

    #[test]
    fn search_request_carries_resolved_window() {
        let mut app = App::new();
        app.apply_query("foo");
        let request = app.search_request().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let params = request.params(now);
        assert_eq!(params[0].1, "2024-01-01T11:45:00Z");
        assert_eq!(params[1].1, "2024-01-01T12:00:00Z");
        assert_eq!(params[2].1, "foo");
    }

    #[test]
    fn field_panel_lists_summary_and_visible_columns() {
        let mut app = App::new();
        let mut summary = FieldSummary::default();
        summary.insert(
            "hostname".to_string(),
            BTreeMap::from([("web01".to_string(), 10), ("web02".to_string(), 2)]),
        );
        app.field_summary = summary;

        let entries = app.field_panel_entries();
        let hostname = entries.iter().find(|(name, ..)| name == "hostname").unwrap();
        assert_eq!(hostname.1, 12);
        assert!(hostname.2);
        // Default columns not present in the summary still show up.
        assert!(entries.iter().any(|(name, _, visible)| name == "msg" && *visible));
    }

    #[test]
    fn empty_results_clear_the_table_safely() {
        let mut app = App::new();
        app.apply_results(results_with(Vec::new()));
        assert_eq!(app.table.row_count(), 0);
        assert_eq!(app.table_state.selected(), None);
        app.next();
        app.select_last();
        assert_eq!(app.table_state.selected(), None);
    }
}
