//! SQL query builders for PostgreSQL statistics views.
//!
//! Per-database queries are restricted to the given database names, which
//! are embedded as quoted literals.

/// Query returning the numeric server version (e.g. `140004`).
pub fn query_server_version() -> &'static str {
    "SHOW server_version_num;"
}

/// Query returning the `max_connections` setting.
pub fn query_settings_max_connections() -> &'static str {
    "SHOW max_connections;"
}

/// Query listing connectable, non-template databases.
pub fn query_database_list() -> &'static str {
    r#"
        SELECT datname
        FROM pg_database
        WHERE datallowconn = true
          AND datistemplate = false
        ORDER BY datname;
    "#
}

/// Query returning the number of backends connected to the server.
pub fn query_server_current_connections() -> &'static str {
    "SELECT sum(numbackends) FROM pg_stat_database;"
}

/// Builds version-aware query for checkpointer and background writer counters.
///
/// PG < 17: all fields in pg_stat_bgwriter (single view).
/// PG 17+:  checkpoint fields moved to pg_stat_checkpointer; backend buffer
///          counters no longer exist and are reported as 0.
///
/// Buffer counters are converted to bytes using `block_size`.
pub fn query_checkpoints(server_version_num: Option<i64>) -> String {
    let v = server_version_num.unwrap_or(0);

    if v >= 170000 {
        r#"
            SELECT
                COALESCE(c.num_timed, 0)::bigint AS checkpoints_timed,
                COALESCE(c.num_requested, 0)::bigint AS checkpoints_req,
                COALESCE(c.write_time, 0)::bigint AS checkpoint_write_time,
                COALESCE(c.sync_time, 0)::bigint AS checkpoint_sync_time,
                (COALESCE(c.buffers_written, 0) * current_setting('block_size')::numeric)::bigint AS buffers_checkpoint,
                (COALESCE(b.buffers_clean, 0) * current_setting('block_size')::numeric)::bigint AS buffers_clean,
                COALESCE(b.maxwritten_clean, 0)::bigint AS maxwritten_clean,
                0::bigint AS buffers_backend,
                0::bigint AS buffers_backend_fsync,
                (COALESCE(b.buffers_alloc, 0) * current_setting('block_size')::numeric)::bigint AS buffers_alloc
            FROM pg_stat_bgwriter b
            CROSS JOIN pg_stat_checkpointer c;
        "#
        .to_string()
    } else {
        r#"
            SELECT
                COALESCE(checkpoints_timed, 0)::bigint AS checkpoints_timed,
                COALESCE(checkpoints_req, 0)::bigint AS checkpoints_req,
                COALESCE(checkpoint_write_time, 0)::bigint AS checkpoint_write_time,
                COALESCE(checkpoint_sync_time, 0)::bigint AS checkpoint_sync_time,
                (COALESCE(buffers_checkpoint, 0) * current_setting('block_size')::numeric)::bigint AS buffers_checkpoint,
                (COALESCE(buffers_clean, 0) * current_setting('block_size')::numeric)::bigint AS buffers_clean,
                COALESCE(maxwritten_clean, 0)::bigint AS maxwritten_clean,
                (COALESCE(buffers_backend, 0) * current_setting('block_size')::numeric)::bigint AS buffers_backend,
                COALESCE(buffers_backend_fsync, 0)::bigint AS buffers_backend_fsync,
                (COALESCE(buffers_alloc, 0) * current_setting('block_size')::numeric)::bigint AS buffers_alloc
            FROM pg_stat_bgwriter;
        "#
        .to_string()
    }
}

/// Builds query for per-database statistics.
///
/// `datconnlimit` is returned for utilization and is not itself a metric.
pub fn query_database_stats<S: AsRef<str>>(databases: &[S]) -> String {
    format!(
        r#"
            SELECT
                s.datname,
                s.numbackends,
                d.datconnlimit,
                s.xact_commit,
                s.xact_rollback,
                s.blks_read,
                s.blks_hit,
                s.tup_returned,
                s.tup_fetched,
                s.tup_inserted,
                s.tup_updated,
                s.tup_deleted,
                s.conflicts,
                s.temp_files,
                s.temp_bytes,
                s.deadlocks,
                pg_database_size(s.datname) AS size
            FROM pg_stat_database s
            JOIN pg_database d ON d.datname = s.datname
            WHERE s.datname IN ({});
        "#,
        in_list(databases)
    )
}

/// Builds query for per-database recovery conflict counters.
pub fn query_database_conflicts<S: AsRef<str>>(databases: &[S]) -> String {
    format!(
        r#"
            SELECT
                datname,
                confl_tablespace,
                confl_lock,
                confl_snapshot,
                confl_bufferpin,
                confl_deadlock
            FROM pg_stat_database_conflicts
            WHERE datname IN ({});
        "#,
        in_list(databases)
    )
}

/// Builds query for per-database lock counts grouped by mode and granted flag.
pub fn query_database_locks<S: AsRef<str>>(databases: &[S]) -> String {
    format!(
        r#"
            SELECT
                d.datname,
                l.mode,
                l.granted,
                count(l.mode) AS locks_count
            FROM pg_locks l
            JOIN pg_database d ON d.oid = l.database
            WHERE d.datname IN ({})
            GROUP BY d.datname, l.mode, l.granted
            ORDER BY d.datname, l.mode;
        "#,
        in_list(databases)
    )
}

/// Quotes `value` as an SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn in_list<S: AsRef<str>>(databases: &[S]) -> String {
    databases
        .iter()
        .map(|db| quote_literal(db.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_query_pg16_uses_single_view() {
        let q = query_checkpoints(Some(160000));
        assert!(q.contains("FROM pg_stat_bgwriter"));
        assert!(!q.contains("pg_stat_checkpointer"));
        assert!(q.contains("AS buffers_backend,"));
    }

    #[test]
    fn checkpoints_query_pg17_uses_split_views() {
        let q = query_checkpoints(Some(170000));
        assert!(q.contains("pg_stat_checkpointer"));
        assert!(q.contains("num_timed"));
        assert!(q.contains("0::bigint AS buffers_backend"));
    }

    #[test]
    fn checkpoints_query_defaults_to_legacy_without_version() {
        assert!(!query_checkpoints(None).contains("pg_stat_checkpointer"));
    }

    #[test]
    fn time_counters_are_integers() {
        for version in [Some(140000), Some(170000)] {
            let q = query_checkpoints(version);
            assert!(!q.contains("double precision"));
        }
    }

    #[test]
    fn database_queries_embed_quoted_names() {
        let dbs = ["postgres", "production"];
        for q in [
            query_database_stats(&dbs),
            query_database_conflicts(&dbs),
            query_database_locks(&dbs),
        ] {
            assert!(q.contains("IN ('postgres', 'production')"));
        }
    }

    #[test]
    fn quote_literal_escapes_single_quotes() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn database_stats_query_selects_connection_limit() {
        let q = query_database_stats(&["postgres"]);
        assert!(q.contains("d.datconnlimit"));
        assert!(q.contains("pg_database_size(s.datname) AS size"));
    }
}
