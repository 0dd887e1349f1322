//! Error types for PostgreSQL collection.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Error returned by a [`QueryExecutor`](super::QueryExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The server rejected or failed the query.
    #[error("{0}")]
    Failed(String),
    /// The per-call deadline expired.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The session broke while the query was in flight.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// A scalar query returned no rows.
    #[error("query returned no rows")]
    NoRows,
    /// No session is open.
    #[error("not connected")]
    NotConnected,
}

/// One query step of a collection cycle.
///
/// Used to attribute a failure to the query that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectStep {
    ServerVersion,
    Settings,
    DatabaseList,
    ServerConnections,
    Checkpoints,
    DatabaseStats,
    DatabaseConflicts,
    DatabaseLocks,
}

impl CollectStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectStep::ServerVersion => "querying server version",
            CollectStep::Settings => "querying settings max connections",
            CollectStep::DatabaseList => "querying database list",
            CollectStep::ServerConnections => "querying server connections",
            CollectStep::Checkpoints => "querying checkpoints",
            CollectStep::DatabaseStats => "querying database stats",
            CollectStep::DatabaseConflicts => "querying database conflicts",
            CollectStep::DatabaseLocks => "querying database locks",
        }
    }
}

impl fmt::Display for CollectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for a failed collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// The session could not be opened or verified.
    #[error("PostgreSQL: {0}")]
    Connection(#[source] QueryError),
    /// A query step failed; the cycle produced no snapshot.
    #[error("{step} error: {source}")]
    Query {
        step: CollectStep,
        #[source]
        source: QueryError,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl CollectError {
    pub(crate) fn query(step: CollectStep) -> impl FnOnce(QueryError) -> Self {
        move |source| CollectError::Query { step, source }
    }

    /// Returns the failing step, if the error came from a query.
    pub fn step(&self) -> Option<CollectStep> {
        match self {
            CollectError::Query { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_names_the_failing_step() {
        let err = CollectError::query(CollectStep::Checkpoints)(QueryError::Failed(
            "ERROR: permission denied".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "querying checkpoints error: ERROR: permission denied"
        );
        assert_eq!(err.step(), Some(CollectStep::Checkpoints));
    }

    #[test]
    fn connection_error_has_no_step() {
        let err = CollectError::Connection(QueryError::Failed("connection refused".to_string()));
        assert_eq!(err.to_string(), "PostgreSQL: connection refused");
        assert_eq!(err.step(), None);
    }
}
