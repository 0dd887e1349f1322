//! Flat per-cycle metric snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

/// Mapping from series name to value produced by one collection cycle.
///
/// Names are `<scope>_<metric>` for server metrics (e.g.
/// `server_connections_used`) and `db_<database>_<metric>` for
/// database-scoped ones. Assigning the same name twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    metrics: BTreeMap<String, i64>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, overwriting any previous assignment.
    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        self.metrics.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.metrics.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, i64> {
        self.metrics
    }
}

impl FromIterator<(String, i64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}
