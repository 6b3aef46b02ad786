//! Typed views over tagged records

use std::any::Any;
use std::fmt;

use super::Tag;
use crate::store::Address;

/// A hydrated record. Implementations are cheap views over an address and
/// hold no state of their own.
pub trait Node: Any + Send + Sync + fmt::Debug {
    fn address(&self) -> Address;

    fn tag(&self) -> Tag;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Node {
    /// Returns the concrete wrapper if this node is a `T`.
    pub fn downcast_ref<T: Node>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Node>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Wrapper for kinds that need no dedicated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordNode {
    address: Address,
    tag: Tag,
}

impl RecordNode {
    pub fn new(address: Address, tag: Tag) -> Self {
        Self { address, tag }
    }
}

impl Node for RecordNode {
    fn address(&self) -> Address {
        self.address
    }

    fn tag(&self) -> Tag {
        self.tag
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
