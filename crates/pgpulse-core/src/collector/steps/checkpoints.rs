//! pg_stat_bgwriter (+ pg_stat_checkpointer on PG 17+) collection.

use crate::snapshot::Snapshot;

use super::super::collector::Collector;
use super::super::error::QueryError;
use super::super::flatten::{collect_rows, safe_parse_int};
use super::super::pg_executor::queries::query_checkpoints;
use super::super::traits::{QueryExecutor, SeriesPublisher};

impl<E: QueryExecutor, P: SeriesPublisher> Collector<E, P> {
    /// Emits checkpointer and background writer counters under their
    /// column names.
    pub(in crate::collector) fn collect_checkpoints(
        &mut self,
        mx: &mut Snapshot,
    ) -> Result<(), QueryError> {
        let query = query_checkpoints(self.metadata.server_version_num());
        let timeout = self.timeout();

        collect_rows(&mut self.executor, &query, timeout, |column, value| {
            mx.set(column, safe_parse_int(value));
        })
    }
}
