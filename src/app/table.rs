use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::LogEvent;

/// Out-of-range row access. Caller misuse, not a data problem.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("row {index} out of bounds (len {len})")]
pub struct IndexError {
    pub index: usize,
    pub len: usize,
}

/// What a structural mutation did, so the caller knows whether to rebuild
/// header state, row state, or nothing at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuralChange {
    ColumnsReset,
    ColumnAppended { index: usize },
    ColumnRemoved { index: usize },
    RowsReset,
}

/// Projects a sequence of log events onto a visible subset of columns.
/// Which fields exist on an event and which are shown are independent:
/// an event missing a visible column's field renders as empty.
pub struct LogTable {
    columns: Vec<String>,
    events: Vec<LogEvent>,
}

impl LogTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            events: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.events.len()
    }

    /// Wholesale column replacement. Identical sequence is a no-op.
    pub fn set_columns<I, S>(&mut self, columns: I) -> Option<StructuralChange>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns == self.columns {
            return None;
        }
        self.columns = columns;
        Some(StructuralChange::ColumnsReset)
    }

    /// Remove the named column if present (searched by value), otherwise
    /// append it at the end. Existing columns keep their order either way.
    pub fn toggle_column(&mut self, name: &str) -> StructuralChange {
        if let Some(index) = self.columns.iter().position(|c| c == name) {
            self.columns.remove(index);
            StructuralChange::ColumnRemoved { index }
        } else {
            self.columns.push(name.to_string());
            StructuralChange::ColumnAppended {
                index: self.columns.len() - 1,
            }
        }
    }

    /// Wholesale event replacement; rows are never diffed or reused.
    pub fn set_events(&mut self, events: Vec<LogEvent>) -> StructuralChange {
        self.events = events;
        StructuralChange::RowsReset
    }

    /// The field value at (row, column name), or `""` when the event has no
    /// such field. Log schemas are heterogeneous, so a missing field is
    /// defined behavior rather than an error.
    pub fn cell_value(&self, row: usize, column: &str) -> Result<&str, IndexError> {
        let event = self.event(row)?;
        Ok(event.fields.get(column).map(String::as_str).unwrap_or(""))
    }

    pub fn row_timestamp(&self, row: usize) -> Result<DateTime<Utc>, IndexError> {
        Ok(self.event(row)?.timestamp)
    }

    /// Full underlying record, including fields not currently visible.
    pub fn row_record(&self, row: usize) -> Result<&LogEvent, IndexError> {
        self.event(row)
    }

    fn event(&self, row: usize) -> Result<&LogEvent, IndexError> {
        self.events.get(row).ok_or(IndexError {
            index: row,
            len: self.events.len(),
        })
    }
}
