//! Pre-built query fixtures for testing.
//!
//! Fixtures are `psql` table output captured from a PostgreSQL 14.4 server
//! with two databases, `postgres` and `production`.

use crate::collector::pg_executor::queries::{
    query_checkpoints, query_database_conflicts, query_database_list, query_database_locks,
    query_database_stats, query_server_current_connections, query_server_version,
    query_settings_max_connections,
};
use crate::collector::traits::Rows;

use super::executor::MockExecutor;

/// PostgreSQL 14.4 fixtures.
pub mod v14_4 {
    pub const SERVER_VERSION_NUM: &str = include_str!("fixtures/v14.4/server_version_num.txt");
    pub const SETTINGS_MAX_CONNECTIONS: &str =
        include_str!("fixtures/v14.4/settings_max_connections.txt");
    pub const SERVER_CURRENT_CONNECTIONS: &str =
        include_str!("fixtures/v14.4/server_current_connections.txt");
    pub const DATABASE_LIST_1DB: &str = include_str!("fixtures/v14.4/database_list-1db.txt");
    pub const DATABASE_LIST_2DB: &str = include_str!("fixtures/v14.4/database_list-2db.txt");
    pub const DATABASE_LIST_3DB: &str = include_str!("fixtures/v14.4/database_list-3db.txt");
    pub const DATABASE_STATS: &str = include_str!("fixtures/v14.4/database_stats.txt");
    pub const DATABASE_CONFLICTS: &str = include_str!("fixtures/v14.4/database_conflicts.txt");
    pub const DATABASE_LOCKS: &str = include_str!("fixtures/v14.4/database_locks.txt");
    pub const CHECKPOINTS: &str = include_str!("fixtures/v14.4/checkpoints.txt");

    /// Server version the fixtures were captured from.
    pub const VERSION: i64 = 140004;
}

/// Parses `psql` aligned table output into [`Rows`].
///
/// The first line is the header; separator lines (`---+---`), blank lines
/// and the `(N rows)` footer are skipped. Cells are trimmed.
pub fn parse_psql_table(data: &str) -> Result<Rows, String> {
    let mut rows: Option<Rows> = None;
    let mut num_columns = 0;

    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") || line.starts_with('(') {
            continue;
        }

        let parts: Vec<&str> = line.split('|').map(str::trim).collect();

        match rows.as_mut() {
            None => {
                num_columns = parts.len();
                rows = Some(Rows::new(parts));
            }
            Some(rows) => {
                if parts.len() != num_columns {
                    return Err(format!(
                        "columns != values ({}/{})",
                        num_columns,
                        parts.len()
                    ));
                }
                rows.push_row(parts.into_iter().map(Some));
            }
        }
    }

    rows.ok_or_else(|| "no header line".to_string())
}

/// Parses a fixture, panicking on malformed input.
pub fn fixture_rows(data: &str) -> Rows {
    match parse_psql_table(data) {
        Ok(rows) => rows,
        Err(e) => panic!("malformed fixture: {}", e),
    }
}

impl MockExecutor {
    /// Queues fixture rows for `query`.
    pub fn expect_fixture(&mut self, query: impl Into<String>, data: &str) {
        self.expect(query, fixture_rows(data));
    }

    /// Scripts the one-time version probe and the settings refresh.
    pub fn expect_metadata_v14(&mut self) {
        self.expect_fixture(query_server_version(), v14_4::SERVER_VERSION_NUM);
        self.expect_fixture(
            query_settings_max_connections(),
            v14_4::SETTINGS_MAX_CONNECTIONS,
        );
    }

    /// Scripts a database list refresh.
    pub fn expect_database_list(&mut self, data: &str) {
        self.expect_fixture(query_database_list(), data);
    }

    /// Scripts the five collection queries for `databases`.
    pub fn expect_collection_v14(&mut self, databases: &[&str]) {
        self.expect_fixture(
            query_server_current_connections(),
            v14_4::SERVER_CURRENT_CONNECTIONS,
        );
        self.expect_fixture(query_checkpoints(Some(v14_4::VERSION)), v14_4::CHECKPOINTS);
        self.expect_fixture(query_database_stats(databases), v14_4::DATABASE_STATS);
        self.expect_fixture(
            query_database_conflicts(databases),
            v14_4::DATABASE_CONFLICTS,
        );
        self.expect_fixture(query_database_locks(databases), v14_4::DATABASE_LOCKS);
    }

    /// Two-database PostgreSQL 14.4 server, scripted for one full cycle.
    pub fn two_databases_v14() -> Self {
        let mut executor = Self::new();
        executor.expect_metadata_v14();
        executor.expect_database_list(v14_4::DATABASE_LIST_2DB);
        executor.expect_collection_v14(&["postgres", "production"]);
        executor
    }
}
