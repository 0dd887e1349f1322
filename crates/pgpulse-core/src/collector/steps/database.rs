//! pg_stat_database and pg_stat_database_conflicts collection.

use tracing::trace;

use crate::snapshot::Snapshot;

use super::super::collector::Collector;
use super::super::error::QueryError;
use super::super::flatten::{calc_percentage, collect_rows, safe_parse_int};
use super::super::pg_executor::queries::{query_database_conflicts, query_database_stats};
use super::super::traits::{QueryExecutor, SeriesPublisher};

impl<E: QueryExecutor, P: SeriesPublisher> Collector<E, P> {
    /// Emits `db_<name>_<column>` for every statistics column plus
    /// `db_<name>_numbackends_utilization`.
    ///
    /// Utilization is relative to the database connection limit, or to the
    /// server `max_connections` when the database has no limit (-1).
    pub(in crate::collector) fn collect_database_stats(
        &mut self,
        mx: &mut Snapshot,
    ) -> Result<(), QueryError> {
        if self.registry.is_empty() {
            return Ok(());
        }

        let query = query_database_stats(&self.registry.names());
        let max_connections = self.metadata.max_connections();
        let timeout = self.timeout();
        let registry = &self.registry;

        let mut db = String::new();
        let mut numbackends = 0;
        collect_rows(&mut self.executor, &query, timeout, |column, value| {
            match column {
                "datname" => {
                    db.clear();
                    if registry.contains(value) {
                        db.push_str(value);
                    } else {
                        trace!(database = value, "skipping unregistered database");
                    }
                }
                _ if db.is_empty() => {}
                "numbackends" => {
                    numbackends = safe_parse_int(value);
                    mx.set(format!("db_{}_numbackends", db), numbackends);
                }
                "datconnlimit" => {
                    let limit = match safe_parse_int(value) {
                        l if l < 0 => max_connections,
                        l => l,
                    };
                    mx.set(
                        format!("db_{}_numbackends_utilization", db),
                        calc_percentage(numbackends, limit),
                    );
                }
                _ => mx.set(format!("db_{}_{}", db, column), safe_parse_int(value)),
            }
        })
    }

    /// Emits `db_<name>_confl_*` recovery conflict counters.
    pub(in crate::collector) fn collect_database_conflicts(
        &mut self,
        mx: &mut Snapshot,
    ) -> Result<(), QueryError> {
        if self.registry.is_empty() {
            return Ok(());
        }

        let query = query_database_conflicts(&self.registry.names());
        let timeout = self.timeout();
        let registry = &self.registry;

        let mut db = String::new();
        collect_rows(&mut self.executor, &query, timeout, |column, value| {
            if column == "datname" {
                db.clear();
                if registry.contains(value) {
                    db.push_str(value);
                }
            } else if !db.is_empty() {
                mx.set(format!("db_{}_{}", db, column), safe_parse_int(value));
            }
        })
    }
}
