//! # System Module
//!
//! Read-only metrics over a Graph Store.
//!
//! Metrics are informational. They never gate any store operation and are
//! computed with integer arithmetic only.

mod metrics;

pub use metrics::*;
