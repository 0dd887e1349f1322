//! Collection steps, one file per statistics view.
//!
//! Each step runs one query and writes its values into the cycle snapshot.
//! Per-database steps only emit values for registered databases and are
//! skipped entirely while the registry is empty.

mod checkpoints;
mod connections;
mod database;
mod locks;
