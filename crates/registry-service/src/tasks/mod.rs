//! Background tasks for the registry service.
//!
//! # Tasks
//!
//! - `purge_sweeper` - Periodically purges expired entries from configured registries

pub mod purge_sweeper;

pub use purge_sweeper::{start_purge_sweeper, PurgeSweeperConfig};
