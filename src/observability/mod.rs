//! Observability for nodedb
//!
//! Structured JSON line logging. Observability is read-only and never
//! affects the outcome of a store operation.

mod logger;

pub use logger::{Logger, Severity};
