//! Abstractions for the collaborators the collector drives.
//!
//! The `QueryExecutor` trait allows the collector to run against a real
//! PostgreSQL session or a scripted mock, and `SeriesPublisher` lets the
//! consuming layer learn which named series exist.

use std::time::Duration;

use super::error::QueryError;
use super::templates::BoundSeries;

/// Tabular query result with every value in text form.
///
/// `None` marks an SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rows {
    columns: Vec<String>,
    values: Vec<Vec<Option<String>>>,
}

impl Rows {
    /// Creates an empty result with the given column names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            values: Vec::new(),
        }
    }

    /// Appends a row. Missing trailing values are padded with NULL and
    /// surplus values are dropped, so every row matches the column count.
    pub fn push_row<S: Into<String>>(&mut self, values: impl IntoIterator<Item = Option<S>>) {
        let mut row: Vec<Option<String>> = values
            .into_iter()
            .map(|v| v.map(Into::into))
            .take(self.columns.len())
            .collect();
        row.resize(self.columns.len(), None);
        self.values.push(row);
    }

    /// Builder form of [`push_row`](Self::push_row) for non-null values.
    pub fn with_row<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.push_row(values.into_iter().map(Some));
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates rows as `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.values.iter().map(|values| RowRef {
            columns: &self.columns,
            values,
        })
    }
}

/// Borrowed view of a single row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Option<String>],
}

impl<'a> RowRef<'a> {
    /// Returns the text value at `idx`, or `None` for NULL.
    pub fn get(&self, idx: usize) -> Option<&'a str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    /// Iterates `(column, value)` pairs; NULL becomes `""`.
    pub fn cells(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_deref().unwrap_or("")))
    }
}

/// Single-session query execution.
///
/// Implementations must never run two queries concurrently; the collector
/// issues them one at a time.
pub trait QueryExecutor {
    /// Returns `true` if a live session is open.
    fn is_connected(&self) -> bool;

    /// Opens a session and verifies the server answers within `timeout`.
    fn connect(&mut self, timeout: Duration) -> Result<(), QueryError>;

    /// Runs `query` under a deadline of `timeout`.
    fn execute(&mut self, query: &str, timeout: Duration) -> Result<Rows, QueryError>;

    /// Releases the session, if any.
    fn close(&mut self);
}

/// Consumer of series existence signals.
///
/// Visual metadata (titles, units, grouping) is entirely the publisher's
/// business; the collector only announces which series exist.
pub trait SeriesPublisher {
    /// A series bound to `series.entity()` (or server-scoped) now exists.
    fn declare_series(&mut self, series: &BoundSeries);

    /// Every series bound to `entity` is scheduled for removal.
    fn retract_series(&mut self, entity: &str);
}

/// Publisher that ignores every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl SeriesPublisher for NoopPublisher {
    fn declare_series(&mut self, _series: &BoundSeries) {}

    fn retract_series(&mut self, _entity: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_pads_missing_values_with_null() {
        let mut rows = Rows::new(["datname", "numbackends"]);
        rows.push_row([Some("postgres")]);
        let row = rows.iter().next().unwrap();
        assert_eq!(row.get(0), Some("postgres"));
        assert_eq!(row.get(1), None);
    }

    #[test]
    fn cells_render_null_as_empty_string() {
        let mut rows = Rows::new(["a", "b"]);
        rows.push_row([Some("1"), None]);
        let cells: Vec<(&str, &str)> = rows.iter().next().unwrap().cells().collect();
        assert_eq!(cells, vec![("a", "1"), ("b", "")]);
    }
}
