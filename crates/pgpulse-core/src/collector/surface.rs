//! Dynamic metric surface.
//!
//! Owns every concrete series the collector publishes: the server series,
//! declared once, and one bound copy of [`DATABASE_SERIES`] per tracked
//! database. Removal is two-phase: [`retire`](MetricSurface::retire) flags a
//! database's series as obsolete and signals the publisher, and the consuming
//! layer later calls [`sweep_retired`](MetricSurface::sweep_retired) to drop
//! them physically. No operation here runs a query.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::registry::EntityObserver;
use super::templates::{Algorithm, BoundSeries, DATABASE_SERIES, SERVER_SERIES};
use super::traits::SeriesPublisher;
use crate::snapshot::Snapshot;

/// Lifecycle flags of a published series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeriesState {
    /// Scheduled for removal; no longer published.
    pub obsolete: bool,
    /// Populated by at least one successful cycle since it was declared.
    pub created: bool,
}

/// A bound series and its lifecycle flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceSeries {
    pub series: BoundSeries,
    pub state: SeriesState,
}

impl SurfaceSeries {
    fn declared(series: BoundSeries) -> Self {
        Self {
            series,
            state: SeriesState::default(),
        }
    }
}

/// Index of published series, mutated only by the collector.
pub struct MetricSurface<P: SeriesPublisher> {
    publisher: P,
    server: Vec<SurfaceSeries>,
    databases: HashMap<String, Vec<SurfaceSeries>>,
}

impl<P: SeriesPublisher> MetricSurface<P> {
    /// Creates the surface and declares the server series.
    pub fn new(mut publisher: P) -> Self {
        let server: Vec<SurfaceSeries> = SERVER_SERIES
            .iter()
            .map(|template| {
                let series = template.instantiate();
                publisher.declare_series(&series);
                SurfaceSeries::declared(series)
            })
            .collect();

        Self {
            publisher,
            server,
            databases: HashMap::new(),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Returns `true` if `database` has live (non-retired) series.
    pub fn is_materialized(&self, database: &str) -> bool {
        self.databases
            .get(database)
            .is_some_and(|series| series.iter().any(|s| !s.state.obsolete))
    }

    /// Series bound to `database`, including retired ones awaiting a sweep.
    pub fn database_series(&self, database: &str) -> &[SurfaceSeries] {
        self.databases
            .get(database)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Binds every database template to `database` and declares the results.
    ///
    /// A no-op if the database already has live series. Retired series of
    /// the same database are replaced by fresh ones.
    pub fn materialize(&mut self, database: &str) {
        if self.is_materialized(database) {
            debug!(database = %database, "series already materialized");
            return;
        }

        let series: Vec<SurfaceSeries> = DATABASE_SERIES
            .iter()
            .map(|template| {
                let bound = template.bind(database);
                self.publisher.declare_series(&bound);
                SurfaceSeries::declared(bound)
            })
            .collect();

        info!(database = %database, series = series.len(), "database series materialized");
        self.databases.insert(database.to_string(), series);
    }

    /// Flags every series bound to `database` as obsolete and not created.
    ///
    /// A no-op if the database was never materialized or is already retired.
    pub fn retire(&mut self, database: &str) {
        let Some(series) = self.databases.get_mut(database) else {
            return;
        };
        if series.iter().all(|s| s.state.obsolete) {
            return;
        }

        for s in series.iter_mut() {
            s.state.obsolete = true;
            s.state.created = false;
        }
        self.publisher.retract_series(database);
        info!(database = %database, "database series retired");
    }

    /// Physically removes retired series and returns them.
    pub fn sweep_retired(&mut self) -> Vec<SurfaceSeries> {
        let mut swept = Vec::new();
        self.databases.retain(|_, series| {
            if series.iter().all(|s| s.state.obsolete) {
                swept.append(series);
                false
            } else {
                true
            }
        });
        swept
    }

    /// Marks live series whose dimensions appear in `snapshot` as created.
    pub fn mark_populated(&mut self, snapshot: &Snapshot) {
        for s in self.live_series_mut() {
            if !s.state.created && s.series.dim_names().any(|name| snapshot.contains(name)) {
                s.state.created = true;
            }
        }
    }

    /// Iterates every published (non-obsolete) series.
    pub fn published(&self) -> impl Iterator<Item = &SurfaceSeries> {
        self.server
            .iter()
            .chain(self.databases.values().flatten())
            .filter(|s| !s.state.obsolete)
    }

    /// Names of every published dimension, sorted.
    pub fn published_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .published()
            .flat_map(|s| s.series.dim_names())
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns the algorithm of a published dimension.
    pub fn algorithm(&self, name: &str) -> Option<Algorithm> {
        self.published()
            .flat_map(|s| s.series.dims())
            .find(|d| d.name == name)
            .map(|d| d.algorithm)
    }

    /// Names of every published [`Algorithm::Incremental`] dimension.
    ///
    /// Built in one pass; callers testing many names should take this set
    /// once per cycle rather than calling [`algorithm`](Self::algorithm).
    pub fn incremental_names(&self) -> HashSet<&str> {
        self.published()
            .flat_map(|s| s.series.dims())
            .filter(|d| d.algorithm == Algorithm::Incremental)
            .map(|d| d.name.as_str())
            .collect()
    }

    fn live_series_mut(&mut self) -> impl Iterator<Item = &mut SurfaceSeries> {
        self.server
            .iter_mut()
            .chain(self.databases.values_mut().flatten())
            .filter(|s| !s.state.obsolete)
    }
}

impl<P: SeriesPublisher> EntityObserver for MetricSurface<P> {
    fn materialize(&mut self, name: &str) {
        MetricSurface::materialize(self, name);
    }

    fn retire(&mut self, name: &str) {
        MetricSurface::retire(self, name);
    }
}
