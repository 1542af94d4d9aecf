//! Tally registry service library.
//!
//! Expiring tracked-membership registries layered over a Redis-style
//! key-value/set store, plus a scalar key store sharing the same connection.
//!
//! # Architecture
//!
//! ```text
//! caller
//! ├── MembershipRegistry ──► Entry codec ──┐
//! └── ScalarKeyStore ──────────────────────┴──► StoreAdapter ──► Redis
//! ```
//!
//! The store knows only whole-key TTLs and flat string sets. Per-element
//! expiration and retry counts live in the encoded set elements and are
//! interpreted entirely on the client side.
//!
//! # Modules
//!
//! - [`codec`] - Entry token encoding
//! - [`registry`] - Membership registry operations
//! - [`scalar`] - Scalar key store operations
//! - [`store`] - Store adapter trait
//! - [`redis`] - Redis store adapter
//! - [`tasks`] - Background purge sweeper
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types

pub mod codec;
pub mod config;
pub mod errors;
pub mod observability;
pub mod redis;
pub mod registry;
pub mod scalar;
pub mod store;
pub mod tasks;

pub use codec::{CodecError, Entry};
pub use errors::RegistryError;
pub use registry::{MemberMatch, MembershipRegistry};
pub use scalar::ScalarKeyStore;
pub use store::{StoreAdapter, StoreError};
