//! Server-wide connection usage.

use crate::snapshot::Snapshot;

use super::super::collector::Collector;
use super::super::error::QueryError;
use super::super::flatten::{calc_percentage, collect_rows, safe_parse_int};
use super::super::pg_executor::queries::query_server_current_connections;
use super::super::traits::{QueryExecutor, SeriesPublisher};

impl<E: QueryExecutor, P: SeriesPublisher> Collector<E, P> {
    /// Emits `server_connections_{used,available,utilization}` against the
    /// cached `max_connections`.
    pub(in crate::collector) fn collect_server_connections(
        &mut self,
        mx: &mut Snapshot,
    ) -> Result<(), QueryError> {
        let max_connections = self.metadata.max_connections();
        let timeout = self.timeout();

        collect_rows(
            &mut self.executor,
            query_server_current_connections(),
            timeout,
            |_column, value| {
                let used = safe_parse_int(value);
                mx.set("server_connections_used", used);
                mx.set("server_connections_available", max_connections - used);
                mx.set(
                    "server_connections_utilization",
                    calc_percentage(used, max_connections),
                );
            },
        )
    }
}
