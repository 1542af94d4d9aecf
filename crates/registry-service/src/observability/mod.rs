//! Observability for the registry service.
//!
//! - `metrics` - Prometheus metric definitions and recorder setup

pub mod metrics;
