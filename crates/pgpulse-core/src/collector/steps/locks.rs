//! pg_locks collection.

use tracing::trace;

use crate::snapshot::Snapshot;

use super::super::collector::Collector;
use super::super::error::QueryError;
use super::super::flatten::{collect_rows, safe_parse_int};
use super::super::pg_executor::queries::query_database_locks;
use super::super::templates::{LockMode, LockState, lock_metric};
use super::super::traits::{QueryExecutor, SeriesPublisher};

impl<E: QueryExecutor, P: SeriesPublisher> Collector<E, P> {
    /// Emits held and awaited lock counts per mode for every registered
    /// database.
    ///
    /// Every mode/state pair starts at 0 so that modes without locks still
    /// report a value. Rows with modes outside [`LockMode::ALL`] (e.g.
    /// `SIReadLock`) are skipped.
    pub(in crate::collector) fn collect_database_locks(
        &mut self,
        mx: &mut Snapshot,
    ) -> Result<(), QueryError> {
        if self.registry.is_empty() {
            return Ok(());
        }

        let databases = self.registry.names();
        for db in &databases {
            for mode in LockMode::ALL {
                mx.set(lock_metric(db, mode, LockState::Held), 0);
                mx.set(lock_metric(db, mode, LockState::Awaited), 0);
            }
        }

        let query = query_database_locks(&databases);
        let timeout = self.timeout();
        let registry = &self.registry;

        let mut db = String::new();
        let mut mode: Option<LockMode> = None;
        let mut granted = false;
        collect_rows(&mut self.executor, &query, timeout, |column, value| {
            match column {
                "datname" => {
                    db.clear();
                    if registry.contains(value) {
                        db.push_str(value);
                    }
                }
                "mode" => {
                    mode = value.parse().ok();
                    if mode.is_none() {
                        trace!(mode = value, "skipping unknown lock mode");
                    }
                }
                "granted" => granted = matches!(value, "t" | "true"),
                "locks_count" => {
                    if let Some(mode) = mode
                        && !db.is_empty()
                    {
                        let state = LockState::from_granted(granted);
                        mx.set(lock_metric(&db, mode, state), safe_parse_int(value));
                    }
                }
                _ => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use crate::collector::mock::scenarios::v14_4;
    use crate::collector::mock::{MockExecutor, RecordingPublisher};
    use crate::collector::pg_executor::queries::{
        query_checkpoints, query_database_conflicts, query_database_locks, query_database_stats,
        query_server_current_connections,
    };
    use crate::collector::traits::Rows;
    use crate::collector::Collector;
    use crate::config::CollectorConfig;

    fn collect_with_locks(locks: Rows) -> crate::Snapshot {
        let dbs = ["postgres", "production"];
        let mut executor = MockExecutor::new();
        executor.expect_metadata_v14();
        executor.expect_database_list(v14_4::DATABASE_LIST_2DB);
        executor.expect_fixture(
            query_server_current_connections(),
            v14_4::SERVER_CURRENT_CONNECTIONS,
        );
        executor.expect_fixture(query_checkpoints(Some(v14_4::VERSION)), v14_4::CHECKPOINTS);
        executor.expect_fixture(query_database_stats(&dbs), v14_4::DATABASE_STATS);
        executor.expect_fixture(query_database_conflicts(&dbs), v14_4::DATABASE_CONFLICTS);
        executor.expect(query_database_locks(&dbs), locks);

        let mut collector = Collector::new(
            executor,
            RecordingPublisher::default(),
            CollectorConfig::default(),
        )
        .unwrap();
        collector.collect_at(Instant::now()).unwrap()
    }

    fn lock_columns() -> Rows {
        Rows::new(["datname", "mode", "granted", "locks_count"])
    }

    #[test]
    fn awaited_locks_are_reported_separately() {
        let locks = lock_columns()
            .with_row(["postgres", "ExclusiveLock", "t", "2"])
            .with_row(["postgres", "ExclusiveLock", "f", "5"]);

        let mx = collect_with_locks(locks);

        assert_eq!(mx.get("db_postgres_lock_mode_ExclusiveLock_held"), Some(2));
        assert_eq!(mx.get("db_postgres_lock_mode_ExclusiveLock_awaited"), Some(5));
    }

    #[test]
    fn every_mode_is_zeroed_without_rows() {
        let mx = collect_with_locks(lock_columns());

        let lock_values: Vec<i64> = mx
            .iter()
            .filter(|(name, _)| name.contains("_lock_mode_"))
            .map(|(_, value)| value)
            .collect();
        assert_eq!(lock_values.len(), 2 * 8 * 2);
        assert!(lock_values.iter().all(|&v| v == 0));
    }

    #[test]
    fn unknown_modes_and_databases_are_skipped() {
        let locks = lock_columns()
            .with_row(["postgres", "SIReadLock", "t", "4"])
            .with_row(["template1", "ShareLock", "t", "3"])
            .with_row(["production", "ShareLock", "t", "1"]);

        let mx = collect_with_locks(locks);

        assert!(mx.names().all(|n| !n.contains("SIReadLock")));
        assert!(mx.names().all(|n| !n.starts_with("db_template1_")));
        assert_eq!(mx.get("db_production_lock_mode_ShareLock_held"), Some(1));
    }

    #[test]
    fn granted_accepts_long_boolean_text() {
        let locks = lock_columns().with_row(["postgres", "RowShareLock", "true", "7"]);

        let mx = collect_with_locks(locks);
        assert_eq!(mx.get("db_postgres_lock_mode_RowShareLock_held"), Some(7));
    }
}
