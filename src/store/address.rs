//! Record addresses

use std::fmt;

use serde::{Deserialize, Serialize};

/// Offset of a record within the backing store.
///
/// An address is the only handle to a record. Address zero is reserved as
/// the null address and is never returned by an allocation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(u64);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    /// Number of bytes an address occupies when stored in a record
    pub const SIZE: u32 = 8;

    /// Wraps a raw offset
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw offset
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns whether this is the null address
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns `None` for the null address
    pub fn non_null(self) -> Option<Address> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Returns the address `delta` bytes further into the store.
    /// Saturates, so a wild address stays out of bounds.
    pub const fn add(self, delta: u64) -> Address {
        Address(self.0.saturating_add(delta))
    }
}

impl From<Option<Address>> for Address {
    fn from(value: Option<Address>) -> Self {
        value.unwrap_or(Address::NULL)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:#x}", self.0)
    }
}
