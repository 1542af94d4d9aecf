//! Test utilities for the Tally registry service.
//!
//! - [`MockStore`] - in-memory [`StoreAdapter`](registry_service::store::StoreAdapter)
//!   with failure injection and write accounting
//! - [`fixtures`] - token builders and unique registry keys
//!
//! # Example
//!
//! ```rust,ignore
//! use registry_test_utils::{fixtures, MockStore};
//!
//! let store = MockStore::new().with_tokens("jobs", &[fixtures::expired_token("job-1")]);
//! let registry = MembershipRegistry::new(store.adapter());
//!
//! assert_eq!(registry.purge_expired("jobs").await?, 1);
//! assert_eq!(store.write_count(), 1);
//! ```

pub mod fixtures;
pub mod mock_store;

pub use mock_store::{MockStore, StoreOp};
