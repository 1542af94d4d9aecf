//! Redis store adapter.
//!
//! This module provides:
//! - `RedisStore` - [`StoreAdapter`](crate::store::StoreAdapter) over one
//!   multiplexed Redis connection
//! - Lua scripts for conditional set updates
//!
//! # Storage
//!
//! - Registries are Redis SETs, one per registry key, holding encoded tokens
//! - Scalar entries are plain string keys with native `EX` expiration

pub mod client;
pub mod lua_scripts;

pub use client::RedisStore;
