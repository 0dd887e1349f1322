//! Series templates.
//!
//! A template describes one named series group (a chart, for the consuming
//! layer) and its dimensions. Database templates are bound to a database name
//! to produce concrete metric names; server templates are used verbatim.
//!
//! The full set of names a database can produce is enumerable from
//! [`DATABASE_SERIES`] alone.

use std::fmt;
use std::str::FromStr;

/// How the consuming layer should interpret a dimension's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Gauge: the value is shown as-is.
    Absolute,
    /// Monotonic counter: the consumer derives a per-second rate.
    Incremental,
}

/// Table-level lock modes reported by `pg_locks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockMode {
    AccessShare,
    RowShare,
    RowExclusive,
    ShareUpdateExclusive,
    Share,
    ShareRowExclusive,
    Exclusive,
    AccessExclusive,
}

impl LockMode {
    pub const COUNT: usize = 8;

    pub const ALL: [LockMode; Self::COUNT] = [
        LockMode::AccessShare,
        LockMode::RowShare,
        LockMode::RowExclusive,
        LockMode::ShareUpdateExclusive,
        LockMode::Share,
        LockMode::ShareRowExclusive,
        LockMode::Exclusive,
        LockMode::AccessExclusive,
    ];

    /// Mode name as it appears in `pg_locks.mode`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            LockMode::AccessShare => "AccessShareLock",
            LockMode::RowShare => "RowShareLock",
            LockMode::RowExclusive => "RowExclusiveLock",
            LockMode::ShareUpdateExclusive => "ShareUpdateExclusiveLock",
            LockMode::Share => "ShareLock",
            LockMode::ShareRowExclusive => "ShareRowExclusiveLock",
            LockMode::Exclusive => "ExclusiveLock",
            LockMode::AccessExclusive => "AccessExclusiveLock",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when `pg_locks.mode` holds a mode outside [`LockMode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLockMode(pub String);

impl FromStr for LockMode {
    type Err = UnknownLockMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownLockMode(s.to_string()))
    }
}

/// Whether a lock is granted or still waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Held,
    Awaited,
}

impl LockState {
    pub const fn from_granted(granted: bool) -> Self {
        if granted {
            LockState::Held
        } else {
            LockState::Awaited
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            LockState::Held => "held",
            LockState::Awaited => "awaited",
        }
    }
}

/// Metric part of a dimension name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricName {
    /// Literal metric, e.g. `xact_commit`.
    Plain(&'static str),
    /// `lock_mode_<mode>_<held|awaited>`.
    Lock(LockMode, LockState),
}

impl MetricName {
    fn write(&self, out: &mut String) {
        match self {
            MetricName::Plain(name) => out.push_str(name),
            MetricName::Lock(mode, state) => {
                out.push_str("lock_mode_");
                out.push_str(mode.as_str());
                out.push('_');
                out.push_str(state.as_str());
            }
        }
    }
}

/// One dimension of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimTemplate {
    pub metric: MetricName,
    pub algorithm: Algorithm,
}

impl DimTemplate {
    const fn absolute(name: &'static str) -> Self {
        Self {
            metric: MetricName::Plain(name),
            algorithm: Algorithm::Absolute,
        }
    }

    const fn incremental(name: &'static str) -> Self {
        Self {
            metric: MetricName::Plain(name),
            algorithm: Algorithm::Incremental,
        }
    }

    /// Returns the metric name for a database: `db_<database>_<metric>`.
    pub fn database_metric(&self, database: &str) -> String {
        let mut name = database_prefix(database);
        self.metric.write(&mut name);
        name
    }

    /// Returns the metric name for a server-scoped dimension.
    pub fn server_metric(&self) -> String {
        let mut name = String::new();
        self.metric.write(&mut name);
        name
    }
}

/// Immutable description of a series group.
#[derive(Debug, PartialEq, Eq)]
pub struct SeriesTemplate {
    /// Group id suffix, e.g. `transactions`.
    pub id: &'static str,
    pub dims: &'static [DimTemplate],
}

impl SeriesTemplate {
    /// Binds a database template to `database`.
    pub fn bind(&'static self, database: &str) -> BoundSeries {
        let mut id = database_prefix(database);
        id.push_str(self.id);
        BoundSeries {
            template: self,
            entity: Some(database.to_string()),
            id,
            dims: self
                .dims
                .iter()
                .map(|d| BoundDim {
                    name: d.database_metric(database),
                    algorithm: d.algorithm,
                })
                .collect(),
        }
    }

    /// Instantiates a server template.
    pub fn instantiate(&'static self) -> BoundSeries {
        BoundSeries {
            template: self,
            entity: None,
            id: self.id.to_string(),
            dims: self
                .dims
                .iter()
                .map(|d| BoundDim {
                    name: d.server_metric(),
                    algorithm: d.algorithm,
                })
                .collect(),
        }
    }
}

/// Concrete dimension of a bound series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundDim {
    pub name: String,
    pub algorithm: Algorithm,
}

/// A template bound to an entity (or instantiated for the server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSeries {
    template: &'static SeriesTemplate,
    entity: Option<String>,
    id: String,
    dims: Vec<BoundDim>,
}

impl BoundSeries {
    pub fn template(&self) -> &'static SeriesTemplate {
        self.template
    }

    /// Database the series belongs to; `None` for server series.
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dims(&self) -> &[BoundDim] {
        &self.dims
    }

    pub fn dim_names(&self) -> impl Iterator<Item = &str> {
        self.dims.iter().map(|d| d.name.as_str())
    }
}

fn database_prefix(database: &str) -> String {
    let mut prefix = String::with_capacity(database.len() + 4);
    prefix.push_str("db_");
    prefix.push_str(database);
    prefix.push('_');
    prefix
}

const fn lock_dims(state: LockState) -> [DimTemplate; LockMode::COUNT] {
    let mut dims = [DimTemplate {
        metric: MetricName::Lock(LockMode::AccessShare, state),
        algorithm: Algorithm::Absolute,
    }; LockMode::COUNT];
    let mut i = 0;
    while i < LockMode::COUNT {
        dims[i].metric = MetricName::Lock(LockMode::ALL[i], state);
        i += 1;
    }
    dims
}

const LOCKS_HELD_DIMS: [DimTemplate; LockMode::COUNT] = lock_dims(LockState::Held);
const LOCKS_AWAITED_DIMS: [DimTemplate; LockMode::COUNT] = lock_dims(LockState::Awaited);

/// Server-scoped series, declared once per collector.
pub static SERVER_SERIES: [SeriesTemplate; 8] = [
    SeriesTemplate {
        id: "connections_utilization",
        dims: &[DimTemplate::absolute("server_connections_utilization")],
    },
    SeriesTemplate {
        id: "connections_usage",
        dims: &[
            DimTemplate::absolute("server_connections_available"),
            DimTemplate::absolute("server_connections_used"),
        ],
    },
    SeriesTemplate {
        id: "checkpoints",
        dims: &[
            DimTemplate::incremental("checkpoints_timed"),
            DimTemplate::incremental("checkpoints_req"),
        ],
    },
    SeriesTemplate {
        id: "checkpoint_time",
        dims: &[
            DimTemplate::incremental("checkpoint_write_time"),
            DimTemplate::incremental("checkpoint_sync_time"),
        ],
    },
    SeriesTemplate {
        id: "bgwriter_buffers_alloc",
        dims: &[DimTemplate::incremental("buffers_alloc")],
    },
    SeriesTemplate {
        id: "bgwriter_buffers_written",
        dims: &[
            DimTemplate::incremental("buffers_checkpoint"),
            DimTemplate::incremental("buffers_backend"),
            DimTemplate::incremental("buffers_clean"),
        ],
    },
    SeriesTemplate {
        id: "bgwriter_maxwritten_clean",
        dims: &[DimTemplate::incremental("maxwritten_clean")],
    },
    SeriesTemplate {
        id: "bgwriter_buffers_backend_fsync",
        dims: &[DimTemplate::incremental("buffers_backend_fsync")],
    },
];

/// Per-database series, bound once for every discovered database.
pub static DATABASE_SERIES: [SeriesTemplate; 14] = [
    SeriesTemplate {
        id: "transactions",
        dims: &[
            DimTemplate::incremental("xact_commit"),
            DimTemplate::incremental("xact_rollback"),
        ],
    },
    SeriesTemplate {
        id: "connections_utilization",
        dims: &[DimTemplate::absolute("numbackends_utilization")],
    },
    SeriesTemplate {
        id: "connections",
        dims: &[DimTemplate::absolute("numbackends")],
    },
    SeriesTemplate {
        id: "buffer_cache",
        dims: &[
            DimTemplate::incremental("blks_hit"),
            DimTemplate::incremental("blks_read"),
        ],
    },
    SeriesTemplate {
        id: "read_operations",
        dims: &[
            DimTemplate::incremental("tup_returned"),
            DimTemplate::incremental("tup_fetched"),
        ],
    },
    SeriesTemplate {
        id: "write_operations",
        dims: &[
            DimTemplate::incremental("tup_inserted"),
            DimTemplate::incremental("tup_deleted"),
            DimTemplate::incremental("tup_updated"),
        ],
    },
    SeriesTemplate {
        id: "conflicts",
        dims: &[DimTemplate::incremental("conflicts")],
    },
    SeriesTemplate {
        id: "conflicts_stat",
        dims: &[
            DimTemplate::incremental("confl_tablespace"),
            DimTemplate::incremental("confl_lock"),
            DimTemplate::incremental("confl_snapshot"),
            DimTemplate::incremental("confl_bufferpin"),
            DimTemplate::incremental("confl_deadlock"),
        ],
    },
    SeriesTemplate {
        id: "deadlocks",
        dims: &[DimTemplate::incremental("deadlocks")],
    },
    SeriesTemplate {
        id: "locks_held",
        dims: &LOCKS_HELD_DIMS,
    },
    SeriesTemplate {
        id: "locks_awaited",
        dims: &LOCKS_AWAITED_DIMS,
    },
    SeriesTemplate {
        id: "temp_files",
        dims: &[DimTemplate::incremental("temp_files")],
    },
    SeriesTemplate {
        id: "temp_files_data",
        dims: &[DimTemplate::incremental("temp_bytes")],
    },
    SeriesTemplate {
        id: "size",
        dims: &[DimTemplate::absolute("size")],
    },
];

/// Returns the lock metric name for a database.
pub fn lock_metric(database: &str, mode: LockMode, state: LockState) -> String {
    DimTemplate {
        metric: MetricName::Lock(mode, state),
        algorithm: Algorithm::Absolute,
    }
    .database_metric(database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_mode_parses_pg_locks_names() {
        for mode in LockMode::ALL {
            assert_eq!(mode.as_str().parse::<LockMode>(), Ok(mode));
        }
        assert_eq!(
            "SIReadLock".parse::<LockMode>(),
            Err(UnknownLockMode("SIReadLock".to_string()))
        );
    }

    #[test]
    fn bind_prefixes_ids_and_dims() {
        let series = DATABASE_SERIES[0].bind("sales");
        assert_eq!(series.id(), "db_sales_transactions");
        assert_eq!(series.entity(), Some("sales"));
        let names: Vec<&str> = series.dim_names().collect();
        assert_eq!(names, vec!["db_sales_xact_commit", "db_sales_xact_rollback"]);
    }

    #[test]
    fn lock_templates_cover_every_mode() {
        let held = DATABASE_SERIES
            .iter()
            .find(|t| t.id == "locks_held")
            .unwrap()
            .bind("sales");
        assert_eq!(held.dims().len(), LockMode::COUNT);
        assert_eq!(
            held.dims()[0].name,
            "db_sales_lock_mode_AccessShareLock_held"
        );
        assert_eq!(
            held.dims()[7].name,
            "db_sales_lock_mode_AccessExclusiveLock_held"
        );
        assert_eq!(
            lock_metric("sales", LockMode::Share, LockState::Awaited),
            "db_sales_lock_mode_ShareLock_awaited"
        );
    }

    #[test]
    fn server_templates_keep_names_verbatim() {
        let series = SERVER_SERIES[1].instantiate();
        assert_eq!(series.entity(), None);
        let names: Vec<&str> = series.dim_names().collect();
        assert_eq!(
            names,
            vec!["server_connections_available", "server_connections_used"]
        );
    }

    #[test]
    fn database_names_are_not_normalized() {
        let series = DATABASE_SERIES[2].bind("Sales");
        assert_eq!(series.dims()[0].name, "db_Sales_numbackends");
    }
}
