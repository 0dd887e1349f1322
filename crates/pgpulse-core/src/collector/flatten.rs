//! Row flattening: turns tabular query results into name/value assignments.

use std::time::Duration;

use super::error::QueryError;
use super::traits::QueryExecutor;

/// Runs `query` and calls `assign(column, value)` for every cell of every row.
///
/// NULL values are passed as `""`. Column names are not interpreted; any
/// scope prefix is the caller's job. An execution failure is returned as-is
/// and leaves assignments made so far in place.
pub fn collect_rows<E, F>(
    executor: &mut E,
    query: &str,
    timeout: Duration,
    mut assign: F,
) -> Result<(), QueryError>
where
    E: QueryExecutor + ?Sized,
    F: FnMut(&str, &str),
{
    let rows = executor.execute(query, timeout)?;
    for row in rows.iter() {
        for (column, value) in row.cells() {
            assign(column, value);
        }
    }
    Ok(())
}

/// Runs a single-value query and returns the first column of the first row.
pub fn query_scalar<E>(
    executor: &mut E,
    query: &str,
    timeout: Duration,
) -> Result<String, QueryError>
where
    E: QueryExecutor + ?Sized,
{
    let rows = executor.execute(query, timeout)?;
    let row = rows.iter().next().ok_or(QueryError::NoRows)?;
    Ok(row.get(0).unwrap_or_default().to_string())
}

/// Parses a base-10 integer, yielding 0 for empty or malformed text.
///
/// Unexpected textual formats, surrounding whitespace included, degrade to a
/// zero metric instead of failing the cycle.
pub fn safe_parse_int(s: &str) -> i64 {
    s.parse().unwrap_or(0)
}

/// Returns `value * 100 / total`, or 0 when `total` is 0.
pub fn calc_percentage(value: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    value.saturating_mul(100) / total
}
