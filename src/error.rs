//! Record-level errors
//!
//! Everything that can go wrong while reading, writing or hydrating a
//! record. Corruption variants mean the persisted state is inconsistent and
//! the caller should rebuild the index rather than patch one record.

use std::io;

use thiserror::Error;

use crate::registry::Tag;
use crate::schema::SchemaError;
use crate::store::{Address, StoreError};

/// Result type for record operations
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors surfaced by record operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("index corruption: unknown node tag {tag:#06x} at {address}")]
    UnknownTag { tag: Tag, address: Address },

    #[error("index corruption at {address}: {reason}")]
    Corruption { address: Address, reason: String },

    #[error("record at {address} is a {actual}, expected a {expected}")]
    KindMismatch {
        address: Address,
        expected: String,
        actual: String,
    },

    #[error("kind {kind} has no registered tag")]
    UnregisteredKind { kind: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl NodeError {
    /// Returns whether this error means the index contents are
    /// inconsistent.
    pub fn is_corruption(&self) -> bool {
        match self {
            NodeError::UnknownTag { .. } | NodeError::Corruption { .. } => true,
            NodeError::Store(e) => e.is_fatal(),
            _ => false,
        }
    }

    pub(crate) fn corruption(address: Address, reason: impl Into<String>) -> Self {
        NodeError::Corruption {
            address,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_is_corruption() {
        let err = NodeError::UnknownTag {
            tag: 0x0042,
            address: Address::new(0x100),
        };
        assert!(err.is_corruption());
        let message = err.to_string();
        assert!(message.contains("0x0042"));
        assert!(message.contains("@0x100"));
    }

    #[test]
    fn test_fatal_store_errors_are_corruption() {
        let err = NodeError::from(StoreError::data_corruption("bad block"));
        assert!(err.is_corruption());
        let err = NodeError::from(StoreError::out_of_space(1, 0));
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_config_error_is_not_corruption() {
        assert!(!NodeError::Config("bad".into()).is_corruption());
    }
}
