//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for connection strings. A Redis URL
//! of the form `redis://:password@host:port` carries credentials, so it is
//! held as a [`SecretString`] from the moment it is read from the environment
//! until it is handed to the store client.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct StoreEndpoint {
//!     name: String,
//!     url: SecretString, // Debug shows "[REDACTED]"
//! }
//!
//! let endpoint = StoreEndpoint {
//!     name: "primary".to_string(),
//!     url: SecretString::from("redis://:hunter2@localhost:6379"),
//! };
//!
//! assert!(!format!("{endpoint:?}").contains("hunter2"));
//! assert_eq!(endpoint.url.expose_secret(), "redis://:hunter2@localhost:6379");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
