//! Slowly-changing server facts with independent refresh windows.
//!
//! The server version is probed once; `max_connections` is re-read whenever
//! its refresh window has elapsed. A failed refresh keeps the previous value.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::error::QueryError;
use super::flatten::{query_scalar, safe_parse_int};
use super::pg_executor::queries::{query_server_version, query_settings_max_connections};
use super::traits::QueryExecutor;

/// TTL gate for one class of metadata.
///
/// A refresh is due only when `now - last_refresh_at > interval`, or when no
/// refresh has succeeded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    last_refresh_at: Option<Instant>,
    interval: Duration,
}

impl RefreshWindow {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_refresh_at: None,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_refresh_at(&self) -> Option<Instant> {
        self.last_refresh_at
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_refresh_at {
            Some(last) => now.saturating_duration_since(last) > self.interval,
            None => true,
        }
    }

    /// Records a successful refresh at `now`.
    pub fn mark_refreshed(&mut self, now: Instant) {
        self.last_refresh_at = Some(now);
    }

    /// Forces the next check to be due.
    pub fn expire(&mut self) {
        self.last_refresh_at = None;
    }
}

/// Cached server version and connection limit.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    server_version_num: i64,
    max_connections: i64,
    settings_window: RefreshWindow,
}

impl MetadataCache {
    pub fn new(recheck_settings_every: Duration) -> Self {
        Self {
            server_version_num: 0,
            max_connections: 0,
            settings_window: RefreshWindow::new(recheck_settings_every),
        }
    }

    /// Cached `server_version_num`, or `None` before the first successful probe.
    ///
    /// Query builders use it to pick version-specific variants.
    pub fn server_version_num(&self) -> Option<i64> {
        (self.server_version_num != 0).then_some(self.server_version_num)
    }

    /// Cached `max_connections`; 0 until the first refresh.
    pub fn max_connections(&self) -> i64 {
        self.max_connections
    }

    pub fn settings_window(&self) -> &RefreshWindow {
        &self.settings_window
    }

    /// Queries the server version unless a non-zero version is cached.
    ///
    /// Returns `true` if a query was issued.
    pub fn probe_server_version<E>(
        &mut self,
        executor: &mut E,
        timeout: Duration,
    ) -> Result<bool, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        if self.server_version_num != 0 {
            return Ok(false);
        }

        let value = query_scalar(executor, query_server_version(), timeout)?;
        self.server_version_num = safe_parse_int(&value);
        info!(server_version_num = self.server_version_num, "server version probed");
        Ok(true)
    }

    /// Re-reads `max_connections` if the settings window has elapsed.
    ///
    /// Returns `true` if a query was issued and succeeded. On failure the
    /// cached value and the window are left untouched.
    pub fn refresh_settings<E>(
        &mut self,
        executor: &mut E,
        timeout: Duration,
        now: Instant,
    ) -> Result<bool, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        if !self.settings_window.is_due(now) {
            return Ok(false);
        }

        let value = query_scalar(executor, query_settings_max_connections(), timeout)?;
        let max_connections = safe_parse_int(&value);
        if max_connections != self.max_connections {
            debug!(
                previous = self.max_connections,
                max_connections, "max_connections refreshed"
            );
        }
        self.max_connections = max_connections;
        self.settings_window.mark_refreshed(now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockExecutor;
    use crate::collector::traits::Rows;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn scalar(column: &str, value: &str) -> Rows {
        Rows::new([column]).with_row([value])
    }

    #[test]
    fn refresh_window_is_due_only_after_interval() {
        let start = Instant::now();
        let mut window = RefreshWindow::new(Duration::from_secs(60));
        assert!(window.is_due(start));

        window.mark_refreshed(start);
        assert!(!window.is_due(start));
        assert!(!window.is_due(start + Duration::from_secs(60)));
        assert!(window.is_due(start + Duration::from_secs(61)));

        window.expire();
        assert!(window.is_due(start));
    }

    #[test]
    fn server_version_is_probed_once() {
        let mut executor = MockExecutor::connected();
        executor.expect(
            query_server_version(),
            scalar("server_version_num", "140004"),
        );

        let mut cache = MetadataCache::new(Duration::from_secs(60));
        assert_eq!(cache.probe_server_version(&mut executor, TIMEOUT), Ok(true));
        assert_eq!(cache.probe_server_version(&mut executor, TIMEOUT), Ok(false));
        assert_eq!(cache.server_version_num(), Some(140004));
        executor.assert_expectations_met();
    }

    #[test]
    fn unparseable_version_is_probed_again() {
        let mut executor = MockExecutor::connected();
        executor.expect(query_server_version(), scalar("server_version_num", "x"));
        executor.expect(
            query_server_version(),
            scalar("server_version_num", "170002"),
        );

        let mut cache = MetadataCache::new(Duration::from_secs(60));
        cache.probe_server_version(&mut executor, TIMEOUT).unwrap();
        assert_eq!(cache.server_version_num(), None);
        cache.probe_server_version(&mut executor, TIMEOUT).unwrap();
        assert_eq!(cache.server_version_num(), Some(170002));
    }

    #[test]
    fn settings_refresh_respects_window() {
        let now = Instant::now();
        let mut executor = MockExecutor::connected();
        executor.expect(
            query_settings_max_connections(),
            scalar("max_connections", "100"),
        );
        executor.expect(
            query_settings_max_connections(),
            scalar("max_connections", "200"),
        );

        let mut cache = MetadataCache::new(Duration::from_secs(60));
        assert_eq!(cache.refresh_settings(&mut executor, TIMEOUT, now), Ok(true));
        assert_eq!(
            cache.refresh_settings(&mut executor, TIMEOUT, now + Duration::from_secs(30)),
            Ok(false)
        );
        assert_eq!(cache.max_connections(), 100);
        assert_eq!(
            cache.refresh_settings(&mut executor, TIMEOUT, now + Duration::from_secs(61)),
            Ok(true)
        );
        assert_eq!(cache.max_connections(), 200);
        executor.assert_expectations_met();
    }

    #[test]
    fn failed_settings_refresh_keeps_cached_value() {
        let now = Instant::now();
        let mut executor = MockExecutor::connected();
        executor.expect(
            query_settings_max_connections(),
            scalar("max_connections", "100"),
        );
        executor.expect_err(
            query_settings_max_connections(),
            QueryError::Failed("mock error".to_string()),
        );

        let mut cache = MetadataCache::new(Duration::from_secs(60));
        cache.refresh_settings(&mut executor, TIMEOUT, now).unwrap();
        let later = now + Duration::from_secs(120);
        assert!(cache.refresh_settings(&mut executor, TIMEOUT, later).is_err());
        assert_eq!(cache.max_connections(), 100);
        assert_eq!(cache.settings_window().last_refresh_at(), Some(now));
        assert!(cache.settings_window().is_due(later));
    }
}
