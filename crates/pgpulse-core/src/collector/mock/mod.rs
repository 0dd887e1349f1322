//! Mock collaborators for testing the collector without a PostgreSQL server.
//!
//! - [`MockExecutor`] replays scripted query results, matching query text
//!   exactly and in order.
//! - [`RecordingPublisher`] records series declarations and retractions.
//! - [`scenarios`] loads PostgreSQL 14.4 fixtures captured from `psql`.

mod executor;
mod publisher;
pub mod scenarios;

pub use executor::MockExecutor;
pub use publisher::{PublisherEvent, RecordingPublisher};
