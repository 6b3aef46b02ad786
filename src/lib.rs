//! nodedb - a schema-driven, persistent node database
//!
//! Typed records with cross references live in a byte-addressable store
//! and are rebuilt polymorphically from a 16-bit tag in each record header.
//!
//! - [`schema`]: kinds, field layout and relations
//! - [`registry`]: tag to kind mapping and node hydration
//! - [`db`]: allocation, hydration and cascading deletion
//! - [`model`]: the code index records built on top
//! - [`hash`]: streaming content hash for fingerprints
//! - [`store`]: the backing store and its image files

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hash;
pub mod model;
pub mod observability;
pub mod registry;
pub mod schema;
pub mod store;

pub use config::NodeDbConfig;
pub use db::NodeDb;
pub use error::{NodeError, NodeResult};
