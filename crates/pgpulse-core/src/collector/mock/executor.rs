//! Scripted query executor.

use std::collections::VecDeque;
use std::time::Duration;

use crate::collector::error::QueryError;
use crate::collector::traits::{QueryExecutor, Rows};

#[derive(Debug, Clone)]
struct Expectation {
    query: String,
    result: Result<Rows, QueryError>,
}

/// In-memory executor for tests.
///
/// Each call to [`execute`](QueryExecutor::execute) consumes the next
/// expectation; a query that does not match it exactly fails with
/// [`QueryError::Failed`] and leaves the expectation queued.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    connected: bool,
    connect_failures: VecDeque<QueryError>,
    expectations: VecDeque<Expectation>,
    executed: Vec<String>,
    connects: usize,
}

impl MockExecutor {
    /// Creates a disconnected executor; the first `connect` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor with an open session.
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Queues a successful result for `query`.
    pub fn expect(&mut self, query: impl Into<String>, rows: Rows) {
        self.expectations.push_back(Expectation {
            query: query.into(),
            result: Ok(rows),
        });
    }

    /// Queues a failure for `query`.
    pub fn expect_err(&mut self, query: impl Into<String>, error: QueryError) {
        self.expectations.push_back(Expectation {
            query: query.into(),
            result: Err(error),
        });
    }

    /// Makes the next `connect` call fail with `error`.
    pub fn fail_next_connect(&mut self, error: QueryError) {
        self.connect_failures.push_back(error);
    }

    /// Simulates the server closing the session.
    pub fn drop_connection(&mut self) {
        self.connected = false;
    }

    /// Queries executed so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Number of `connect` calls, successful or not.
    pub fn connects(&self) -> usize {
        self.connects
    }

    pub fn pending(&self) -> usize {
        self.expectations.len()
    }

    /// Panics if scripted queries were not executed.
    pub fn assert_expectations_met(&self) {
        let pending: Vec<&str> = self
            .expectations
            .iter()
            .map(|e| e.query.as_str())
            .collect();
        assert!(pending.is_empty(), "unmet query expectations: {:?}", pending);
    }
}

impl QueryExecutor for MockExecutor {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self, _timeout: Duration) -> Result<(), QueryError> {
        self.connects += 1;
        if let Some(error) = self.connect_failures.pop_front() {
            self.connected = false;
            return Err(error);
        }
        self.connected = true;
        Ok(())
    }

    fn execute(&mut self, query: &str, _timeout: Duration) -> Result<Rows, QueryError> {
        if !self.connected {
            return Err(QueryError::NotConnected);
        }

        let Some(next) = self.expectations.front() else {
            return Err(QueryError::Failed(format!("unexpected query: {}", query)));
        };
        if next.query != query {
            return Err(QueryError::Failed(format!(
                "unexpected query: {} (expected: {})",
                query, next.query
            )));
        }

        self.executed.push(query.to_string());
        let Some(expectation) = self.expectations.pop_front() else {
            return Err(QueryError::Failed(format!("unexpected query: {}", query)));
        };
        if let Err(QueryError::ConnectionLost(_)) = &expectation.result {
            self.connected = false;
        }
        expectation.result
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
