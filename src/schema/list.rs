//! Embedded record lists
//!
//! The record slot holds the address of the first block. Blocks are chained
//! and each holds a run of element records:
//!
//! ```text
//! [next block u64][count u32][capacity u32][element * capacity]
//! ```
//!
//! Elements never move once appended, so their addresses stay valid until
//! the owning record is deleted.

use std::fmt;

use super::field::FieldLifecycle;
use super::kind::Kind;
use crate::db::NodeDb;
use crate::error::NodeResult;
use crate::store::{Address, Store, StoreError, StoreResult};

const BLOCK_HEADER: u32 = 16;
const MIN_BLOCK_CAPACITY: u32 = 4;

/// Accessor for an ordered list of struct-kind elements.
#[derive(Clone)]
pub struct ListField {
    offset: u32,
    element: Kind,
}

impl ListField {
    pub const SIZE: u32 = Address::SIZE;

    pub(crate) fn new(offset: u32, element: Kind) -> Self {
        Self { offset, element }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn element_kind(&self) -> &Kind {
        &self.element
    }

    fn element_size(&self) -> u32 {
        self.element.size().max(1)
    }

    fn element_at(&self, block: Address, index: u32) -> Address {
        block.add(BLOCK_HEADER as u64 + index as u64 * self.element_size() as u64)
    }

    fn blocks(&self, store: &dyn Store, record: Address) -> StoreResult<Vec<Address>> {
        let mut blocks = Vec::new();
        let mut next = store.get_address(record.add(self.offset as u64))?;
        while !next.is_null() {
            blocks.push(next);
            next = store.get_address(next)?;
        }
        Ok(blocks)
    }

    fn new_block(&self, store: &mut dyn Store, capacity: u32) -> StoreResult<Address> {
        let size = capacity
            .checked_mul(self.element_size())
            .and_then(|bytes| bytes.checked_add(BLOCK_HEADER))
            .ok_or_else(|| {
                let requested = capacity as u64 * self.element_size() as u64;
                StoreError::out_of_space(requested + BLOCK_HEADER as u64, u32::MAX as u64)
            })?;
        let block = store.allocate(size)?;
        store.put_u32(block.add(12), capacity)?;
        Ok(block)
    }

    /// Adds a block of `capacity` after `last`, or as the first block.
    fn link_block(
        &self,
        store: &mut dyn Store,
        record: Address,
        last: Option<Address>,
        capacity: u32,
    ) -> StoreResult<Address> {
        let block = self.new_block(store, capacity)?;
        match last {
            Some(last) => store.put_address(last, block)?,
            None => store.put_address(record.add(self.offset as u64), block)?,
        }
        Ok(block)
    }

    /// Grows the list by one zeroed element and returns its address.
    pub fn append(&self, store: &mut dyn Store, record: Address) -> StoreResult<Address> {
        let last = self.blocks(store, record)?.last().copied();
        let block = match last {
            Some(block) if store.get_u32(block.add(8))? < store.get_u32(block.add(12))? => block,
            Some(block) => {
                let capacity = store.get_u32(block.add(12))?.saturating_mul(2);
                self.link_block(store, record, Some(block), capacity)?
            }
            None => self.link_block(store, record, None, MIN_BLOCK_CAPACITY)?,
        };
        let count = store.get_u32(block.add(8))?;
        store.put_u32(block.add(8), count + 1)?;
        Ok(self.element_at(block, count))
    }

    /// Ensures the next `additional` appends need no further allocation.
    pub fn allocate(&self, store: &mut dyn Store, record: Address, additional: u32) -> StoreResult<()> {
        if additional == 0 {
            return Ok(());
        }
        let last = self.blocks(store, record)?.last().copied();
        if let Some(block) = last {
            let count = store.get_u32(block.add(8))?;
            let capacity = store.get_u32(block.add(12))?;
            if capacity.saturating_sub(count) >= additional {
                return Ok(());
            }
        }
        self.link_block(store, record, last, additional)?;
        Ok(())
    }

    pub fn len(&self, store: &dyn Store, record: Address) -> StoreResult<usize> {
        let mut len = 0usize;
        for block in self.blocks(store, record)? {
            len += store.get_u32(block.add(8))? as usize;
        }
        Ok(len)
    }

    pub fn is_empty(&self, store: &dyn Store, record: Address) -> StoreResult<bool> {
        Ok(self.len(store, record)? == 0)
    }

    pub fn get(&self, store: &dyn Store, record: Address, index: usize) -> StoreResult<Option<Address>> {
        let mut remaining = index;
        for block in self.blocks(store, record)? {
            let count = store.get_u32(block.add(8))? as usize;
            if remaining < count {
                return Ok(Some(self.element_at(block, remaining as u32)));
            }
            remaining -= count;
        }
        Ok(None)
    }

    /// Element addresses in append order
    pub fn elements(&self, store: &dyn Store, record: Address) -> StoreResult<Vec<Address>> {
        let mut elements = Vec::new();
        for block in self.blocks(store, record)? {
            let count = store.get_u32(block.add(8))?;
            elements.extend((0..count).map(|i| self.element_at(block, i)));
        }
        Ok(elements)
    }
}

impl FieldLifecycle for ListField {
    fn destruct(&self, db: &mut NodeDb, record: Address) -> NodeResult<()> {
        let blocks = self.blocks(db.store(), record)?;
        let elements = self.elements(db.store(), record)?;
        for element in elements {
            for field in self.element.fields() {
                if let Some(lifecycle) = field.lifecycle() {
                    lifecycle.destruct(db, element)?;
                }
            }
        }
        let store = db.store_mut();
        for block in blocks {
            store.free(block)?;
        }
        store.put_address(record.add(self.offset as u64), Address::NULL)?;
        Ok(())
    }
}

impl fmt::Debug for ListField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListField")
            .field("offset", &self.offset)
            .field("element", &self.element.name())
            .finish()
    }
}
