//! pgpulse-core - PostgreSQL metrics collection library.
//!
//! This library provides the core functionality used by:
//! - `pgpulsed` - daemon that collects a flat metric snapshot on every tick
//!
//! The entry point is [`collector::Collector`]: each call to
//! [`collect`](collector::Collector::collect) produces one [`Snapshot`] or
//! fails as a whole.

pub mod collector;
pub mod config;
pub mod rates;
pub mod snapshot;

pub use config::{CollectorConfig, ConfigError};
pub use snapshot::Snapshot;
