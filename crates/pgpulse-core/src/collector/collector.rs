//! Collection cycle orchestrator.
//!
//! One call to [`Collector::collect`] runs a full cycle:
//!
//! ```text
//! Idle -> ConnectionReady -> MetadataFresh -> InventoryReconciled -> Collecting -> Done
//!   \__________________\_______________\____________________\____________> Failed
//! ```
//!
//! The snapshot is all-or-nothing: the first failing step aborts the cycle
//! and whatever earlier steps wrote is discarded.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::error::{CollectError, CollectStep, QueryError};
use super::flatten::collect_rows;
use super::metadata::{MetadataCache, RefreshWindow};
use super::pg_executor::queries::query_database_list;
use super::registry::EntityRegistry;
use super::surface::MetricSurface;
use super::traits::{QueryExecutor, SeriesPublisher};
use crate::config::CollectorConfig;
use crate::snapshot::Snapshot;

/// Phase reached by the current or last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    ConnectionReady,
    MetadataFresh,
    InventoryReconciled,
    Collecting,
    Done,
    Failed,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::ConnectionReady => "connection_ready",
            CycleState::MetadataFresh => "metadata_fresh",
            CycleState::InventoryReconciled => "inventory_reconciled",
            CycleState::Collecting => "collecting",
            CycleState::Done => "done",
            CycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

type StepFn<E, P> = fn(&mut Collector<E, P>, &mut Snapshot) -> Result<(), QueryError>;

/// Periodic PostgreSQL metrics collector.
///
/// Owns the session, the cached server metadata, the database registry and
/// the metric surface. Cycles must not overlap; the collector holds no locks.
pub struct Collector<E: QueryExecutor, P: SeriesPublisher> {
    pub(super) config: CollectorConfig,
    pub(super) executor: E,
    pub(super) metadata: MetadataCache,
    pub(super) inventory_window: RefreshWindow,
    pub(super) registry: EntityRegistry,
    pub(super) surface: MetricSurface<P>,
    state: CycleState,
    last_error: Option<String>,
}

impl<E: QueryExecutor, P: SeriesPublisher> Collector<E, P> {
    /// Creates a collector and declares the server series on `publisher`.
    pub fn new(executor: E, publisher: P, config: CollectorConfig) -> Result<Self, CollectError> {
        config.validate()?;

        Ok(Self {
            metadata: MetadataCache::new(config.recheck_settings_every),
            inventory_window: RefreshWindow::new(config.relist_databases_every),
            registry: EntityRegistry::new(),
            surface: MetricSurface::new(publisher),
            config,
            executor,
            state: CycleState::Idle,
            last_error: None,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// State reached by the last cycle (`Done` or `Failed`), or `Idle`.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Error message of the last failed cycle, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn surface(&self) -> &MetricSurface<P> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut MetricSurface<P> {
        &mut self.surface
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Releases the session.
    pub fn close(&mut self) {
        self.executor.close();
    }

    /// Runs one collection cycle.
    pub fn collect(&mut self) -> Result<Snapshot, CollectError> {
        self.collect_at(Instant::now())
    }

    /// Runs one collection cycle, evaluating refresh windows at `now`.
    pub fn collect_at(&mut self, now: Instant) -> Result<Snapshot, CollectError> {
        let started = Instant::now();
        match self.run_cycle(now) {
            Ok(snapshot) => {
                self.transition(CycleState::Done);
                self.surface.mark_populated(&snapshot);
                self.last_error = None;
                debug!(
                    metrics = snapshot.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "collection cycle done"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(state = %self.state, error = %e, "collection cycle failed");
                self.transition(CycleState::Failed);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn run_cycle(&mut self, now: Instant) -> Result<Snapshot, CollectError> {
        self.transition(CycleState::Idle);

        self.ensure_connected()?;
        self.transition(CycleState::ConnectionReady);

        self.refresh_metadata(now)?;
        self.transition(CycleState::MetadataFresh);

        self.refresh_inventory(now)?;
        self.transition(CycleState::InventoryReconciled);

        self.transition(CycleState::Collecting);
        let steps: [(CollectStep, StepFn<E, P>); 5] = [
            (CollectStep::ServerConnections, Self::collect_server_connections),
            (CollectStep::Checkpoints, Self::collect_checkpoints),
            (CollectStep::DatabaseStats, Self::collect_database_stats),
            (CollectStep::DatabaseConflicts, Self::collect_database_conflicts),
            (CollectStep::DatabaseLocks, Self::collect_database_locks),
        ];

        let mut snapshot = Snapshot::new();
        for (step, run) in steps {
            let step_started = Instant::now();
            run(self, &mut snapshot).map_err(CollectError::query(step))?;
            debug!(
                step = %step,
                elapsed_us = step_started.elapsed().as_micros() as u64,
                "step finished"
            );
        }
        Ok(snapshot)
    }

    fn transition(&mut self, next: CycleState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "cycle state");
        }
        self.state = next;
    }

    /// Opens the session if none is live.
    fn ensure_connected(&mut self) -> Result<(), CollectError> {
        if self.executor.is_connected() {
            return Ok(());
        }

        self.executor
            .connect(self.config.timeout)
            .map_err(CollectError::Connection)?;
        info!("PostgreSQL session ready");
        Ok(())
    }

    /// Probes the server version once and refreshes settings when due.
    fn refresh_metadata(&mut self, now: Instant) -> Result<(), CollectError> {
        let timeout = self.config.timeout;

        self.metadata
            .probe_server_version(&mut self.executor, timeout)
            .map_err(CollectError::query(CollectStep::ServerVersion))?;

        self.metadata
            .refresh_settings(&mut self.executor, timeout, now)
            .map_err(CollectError::query(CollectStep::Settings))?;

        Ok(())
    }

    /// Re-lists databases when the inventory window has elapsed.
    fn refresh_inventory(&mut self, now: Instant) -> Result<(), CollectError> {
        if !self.inventory_window.is_due(now) {
            return Ok(());
        }

        let mut names = Vec::new();
        collect_rows(
            &mut self.executor,
            query_database_list(),
            self.config.timeout,
            |column, value| {
                if column == "datname" {
                    names.push(value.to_string());
                }
            },
        )
        .map_err(CollectError::query(CollectStep::DatabaseList))?;

        let delta = self
            .registry
            .reconcile_inventory(names, Utc::now(), &mut self.surface);
        self.inventory_window.mark_refreshed(now);

        if !delta.is_empty() {
            info!(
                added = ?delta.added,
                removed = ?delta.removed,
                databases = self.registry.len(),
                "database inventory updated"
            );
        }
        Ok(())
    }

    pub(super) fn timeout(&self) -> Duration {
        self.config.timeout
    }
}
