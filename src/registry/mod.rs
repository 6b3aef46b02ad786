//! Node-type registry for nodedb
//!
//! Records carry no language-level type. The 16-bit tag in each node
//! record's header selects a factory that rebuilds the typed wrapper.
//!
//! # Design Principles
//!
//! - One tag per concrete node kind, one kind per tag
//! - Retired tags stay reserved forever
//! - An unknown tag means the index is corrupt

mod node;
mod types;

pub use node::{Node, RecordNode};
pub use types::{NodeFactory, NodeTypeRegistry};

/// Runtime identifier of a concrete node kind
pub type Tag = u16;
