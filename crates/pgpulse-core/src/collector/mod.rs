//! PostgreSQL metrics collector.
//!
//! This module runs periodic collection cycles against one PostgreSQL
//! server, flattening statistics views into a single [`Snapshot`](crate::Snapshot)
//! and keeping the declared metric surface in step with the set of
//! databases on the server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Collector                           │
//! │  ┌───────────────┐  ┌────────────────┐  ┌─────────────────┐  │
//! │  │ MetadataCache │  │ EntityRegistry │─▶│  MetricSurface  │  │
//! │  │ - version     │  │ - databases    │  │ - series state  │  │
//! │  │ - settings    │  └────────────────┘  └────────┬────────┘  │
//! │  └───────────────┘                               │           │
//! │          steps: connections, checkpoints,        │           │
//! │                 database, conflicts, locks       │           │
//! │                     │                            │           │
//! │              ┌──────▼────────┐           ┌───────▼────────┐  │
//! │              │ QueryExecutor │ (trait)   │ SeriesPublisher│  │
//! │              └──────┬────────┘           └────────────────┘  │
//! └─────────────────────┼────────────────────────────────────────┘
//!              ┌────────┼────────┐
//!       ┌──────▼─────┐   ┌───────▼──────┐
//!       │ PgExecutor │   │ MockExecutor │
//!       │ (postgres) │   │  (Testing)   │
//!       └────────────┘   └──────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```ignore
//! use pgpulse_core::collector::{Collector, NoopPublisher, PgExecutor};
//! use pgpulse_core::CollectorConfig;
//!
//! let executor = PgExecutor::from_env()?;
//! let mut collector = Collector::new(executor, NoopPublisher, CollectorConfig::default())?;
//! let snapshot = collector.collect()?;
//! ```
//!
//! ## Testing (with MockExecutor)
//!
//! ```
//! use pgpulse_core::collector::{Collector, MockExecutor, NoopPublisher};
//! use pgpulse_core::CollectorConfig;
//!
//! let executor = MockExecutor::two_databases_v14();
//! let config = CollectorConfig::default();
//! let mut collector = Collector::new(executor, NoopPublisher, config).unwrap();
//! let snapshot = collector.collect().unwrap();
//! assert_eq!(snapshot.get("db_postgres_xact_commit"), Some(1438660));
//! ```

#[allow(clippy::module_inception)]
mod collector;
mod error;
mod flatten;
mod metadata;
pub mod mock;
pub mod pg_executor;
mod registry;
mod steps;
mod surface;
pub mod templates;
pub mod traits;

pub use collector::{Collector, CycleState};
pub use error::{CollectError, CollectStep, QueryError};
pub use flatten::{calc_percentage, collect_rows, query_scalar, safe_parse_int};
pub use metadata::{MetadataCache, RefreshWindow};
pub use mock::{MockExecutor, PublisherEvent, RecordingPublisher};
pub use pg_executor::{PgExecutor, format_postgres_error};
pub use registry::{Entity, EntityObserver, EntityRegistry, InventoryDelta};
pub use surface::{MetricSurface, SeriesState, SurfaceSeries};
pub use templates::{Algorithm, BoundSeries, LockMode, LockState};
pub use traits::{NoopPublisher, QueryExecutor, Rows, SeriesPublisher};
