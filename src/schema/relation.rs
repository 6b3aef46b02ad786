//! Relation fields
//!
//! Relations always come in pairs and every write updates both sides:
//!
//! - [`ManyToOne`] on the child points at a parent and is paired with a
//!   [`OneToMany`] backpointer list on the parent.
//! - [`OneToOne`] pairs one slot on each of two kinds.
//!
//! A side declared with [`Ownership::OwnedByReferent`] makes its holder owned
//! by whatever it points at. Once an owned record loses its last owner it is
//! deleted.
//!
//! Record layouts:
//!
//! ```text
//! ManyToOne slot:   [target address u64][index in target's list u32]
//! OneToMany slot:   [array address u64]
//! Backpointer array [len u32][capacity u32][address u64 * capacity]
//! OneToOne slot:    [referent address u64]
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use super::errors::{SchemaError, SchemaResult};
use super::field::FieldLifecycle;
use super::kind::KindId;
use crate::db::NodeDb;
use crate::error::{NodeError, NodeResult};
use crate::store::{Address, Store, StoreError, StoreResult};

/// Which side of a relation keeps records alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// The holder is owned by the record it points at
    OwnedByReferent,
    /// Plain reference; no cascade
    Reference,
}

/// Where a relation slot lives: offset plus the kind that declares it.
#[derive(Debug, Clone)]
pub(crate) struct RelationSide {
    pub(crate) offset: u32,
    pub(crate) kind: KindId,
    pub(crate) kind_name: String,
    pub(crate) is_node: bool,
}

impl RelationSide {
    fn slot(&self, record: Address) -> Address {
        record.add(self.offset as u64)
    }
}

const ARRAY_HEADER: u64 = 8;
const MIN_ARRAY_CAPACITY: u32 = 4;

fn array_entry(array: Address, index: u32) -> Address {
    array.add(ARRAY_HEADER + index as u64 * Address::SIZE as u64)
}

fn array_len(store: &dyn Store, list: Address) -> StoreResult<u32> {
    let array = store.get_address(list)?;
    if array.is_null() {
        return Ok(0);
    }
    store.get_u32(array)
}

fn array_get(store: &dyn Store, list: Address, index: u32) -> StoreResult<Option<Address>> {
    let array = store.get_address(list)?;
    if array.is_null() || index >= store.get_u32(array)? {
        return Ok(None);
    }
    Ok(store.get_address(array_entry(array, index))?.non_null())
}

fn new_array(store: &mut dyn Store, capacity: u32) -> StoreResult<Address> {
    let size = capacity
        .checked_mul(Address::SIZE)
        .and_then(|bytes| bytes.checked_add(ARRAY_HEADER as u32))
        .ok_or_else(|| {
            let requested = capacity as u64 * Address::SIZE as u64 + ARRAY_HEADER as u64;
            StoreError::out_of_space(requested, u32::MAX as u64)
        })?;
    let array = store.allocate(size)?;
    store.put_u32(array.add(4), capacity)?;
    Ok(array)
}

/// Appends `element` to the backpointer list at `list` and returns its index.
fn array_push(store: &mut dyn Store, list: Address, element: Address) -> StoreResult<u32> {
    let mut array = store.get_address(list)?;
    if array.is_null() {
        array = new_array(store, MIN_ARRAY_CAPACITY)?;
        store.put_address(list, array)?;
    }
    let len = store.get_u32(array)?;
    let capacity = store.get_u32(array.add(4))?;
    if len == capacity {
        let grown = new_array(store, capacity.saturating_mul(2))?;
        let mut entries = vec![0u8; len as usize * Address::SIZE as usize];
        store.read(array_entry(array, 0), &mut entries)?;
        store.write(array_entry(grown, 0), &entries)?;
        store.put_u32(grown, len)?;
        store.free(array)?;
        store.put_address(list, grown)?;
        array = grown;
    }
    store.put_address(array_entry(array, len), element)?;
    store.put_u32(array, len + 1)?;
    Ok(len)
}

/// Removes entry `index`, which must hold `expected`, by moving the last
/// entry into its place. Returns the moved entry.
fn array_swap_remove(
    store: &mut dyn Store,
    list: Address,
    index: u32,
    expected: Address,
) -> NodeResult<Option<Address>> {
    let array = store.get_address(list)?;
    let len = if array.is_null() {
        0
    } else {
        store.get_u32(array)?
    };
    if index >= len || store.get_address(array_entry(array, index))? != expected {
        return Err(NodeError::corruption(
            list,
            format!("backpointer {} not found at index {}", expected, index),
        ));
    }

    let last = len - 1;
    let mut moved = None;
    if index != last {
        let tail = store.get_address(array_entry(array, last))?;
        store.put_address(array_entry(array, index), tail)?;
        moved = Some(tail);
    }
    if last == 0 {
        store.free(array)?;
        store.put_address(list, Address::NULL)?;
    } else {
        store.put_address(array_entry(array, last), Address::NULL)?;
        store.put_u32(array, last)?;
    }
    Ok(moved)
}

/// Empties the list at `list`, returning what it held.
fn array_take(store: &mut dyn Store, list: Address) -> StoreResult<Vec<Address>> {
    let array = store.get_address(list)?;
    if array.is_null() {
        return Ok(Vec::new());
    }
    let len = store.get_u32(array)?;
    let mut entries = Vec::with_capacity(len as usize);
    for index in 0..len {
        entries.push(store.get_address(array_entry(array, index))?);
    }
    store.free(array)?;
    store.put_address(list, Address::NULL)?;
    Ok(entries)
}

struct ManyToOneDef {
    name: String,
    offset: u32,
    ownership: Ownership,
    holder_is_node: bool,
    backpointer: OnceLock<RelationSide>,
}

/// Pointer from a record to the node that lists it.
#[derive(Clone)]
pub struct ManyToOne(Arc<ManyToOneDef>);

impl ManyToOne {
    pub const SIZE: u32 = Address::SIZE + 4;

    pub(crate) fn new(name: String, offset: u32, ownership: Ownership, holder_is_node: bool) -> Self {
        Self(Arc::new(ManyToOneDef {
            name,
            offset,
            ownership,
            holder_is_node,
            backpointer: OnceLock::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn offset(&self) -> u32 {
        self.0.offset
    }

    pub fn ownership(&self) -> Ownership {
        self.0.ownership
    }

    pub(crate) fn bind(&self, side: RelationSide) -> SchemaResult<()> {
        self.0
            .backpointer
            .set(side)
            .map_err(|_| SchemaError::inverse_already_bound(&self.0.name))
    }

    fn backpointer(&self) -> SchemaResult<&RelationSide> {
        self.0
            .backpointer
            .get()
            .ok_or_else(|| SchemaError::unbound_relation(&self.0.name))
    }

    fn slot(&self, record: Address) -> Address {
        record.add(self.0.offset as u64)
    }

    fn cascades(&self) -> bool {
        self.0.ownership == Ownership::OwnedByReferent && self.0.holder_is_node
    }

    pub fn get(&self, store: &dyn Store, record: Address) -> StoreResult<Option<Address>> {
        Ok(store.get_address(self.slot(record))?.non_null())
    }

    /// Points `record` at `target`, moving it between backpointer lists.
    /// Clearing an owning pointer deletes `record`.
    pub fn put(&self, db: &mut NodeDb, record: Address, target: Option<Address>) -> NodeResult<()> {
        let side = self.backpointer()?;
        let previous = self.get(db.store(), record)?;
        if previous == target {
            return Ok(());
        }
        if let Some(target) = target {
            if side.is_node {
                db.check_kind_id(target, side.kind, &side.kind_name)?;
            }
        }

        let store = db.store_mut();
        if let Some(previous) = previous {
            self.unlink(store, side, previous, record)?;
        }
        match target {
            Some(target) => {
                let index = array_push(store, side.slot(target), record)?;
                store.put_address(self.slot(record), target)?;
                store.put_u32(self.slot(record).add(Address::SIZE as u64), index)?;
            }
            None => self.clear_slot(store, record)?,
        }

        if target.is_none() && self.cascades() {
            db.delete_if_unowned(record)?;
        }
        Ok(())
    }

    fn clear_slot(&self, store: &mut dyn Store, record: Address) -> StoreResult<()> {
        store.clear(self.slot(record), Self::SIZE as usize)
    }

    fn unlink(
        &self,
        store: &mut dyn Store,
        side: &RelationSide,
        target: Address,
        record: Address,
    ) -> NodeResult<()> {
        let index_slot = self.slot(record).add(Address::SIZE as u64);
        let index = store.get_u32(index_slot)?;
        if let Some(moved) = array_swap_remove(store, side.slot(target), index, record)? {
            store.put_u32(self.slot(moved).add(Address::SIZE as u64), index)?;
        }
        Ok(())
    }
}

impl FieldLifecycle for ManyToOne {
    fn destruct(&self, db: &mut NodeDb, record: Address) -> NodeResult<()> {
        if let Some(target) = self.get(db.store(), record)? {
            let side = self.backpointer()?;
            let store = db.store_mut();
            self.unlink(store, side, target, record)?;
            self.clear_slot(store, record)?;
        }
        Ok(())
    }

    fn owns_record(&self) -> bool {
        self.0.ownership == Ownership::OwnedByReferent
    }

    fn has_owner(&self, store: &dyn Store, record: Address) -> StoreResult<bool> {
        Ok(self.owns_record() && self.get(store, record)?.is_some())
    }
}

impl fmt::Debug for ManyToOne {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyToOne")
            .field("name", &self.0.name)
            .field("offset", &self.0.offset)
            .field("ownership", &self.0.ownership)
            .finish()
    }
}

struct OneToManyDef {
    offset: u32,
    forward: ManyToOne,
}

/// Backpointer list of every record whose [`ManyToOne`] points here.
///
/// Appends keep insertion order; removing an entry moves the last entry
/// into its place.
#[derive(Clone)]
pub struct OneToMany(Arc<OneToManyDef>);

impl OneToMany {
    pub const SIZE: u32 = Address::SIZE;

    pub(crate) fn new(offset: u32, forward: ManyToOne) -> Self {
        Self(Arc::new(OneToManyDef { offset, forward }))
    }

    pub fn offset(&self) -> u32 {
        self.0.offset
    }

    /// The pointer field this list mirrors
    pub fn forward(&self) -> &ManyToOne {
        &self.0.forward
    }

    fn list(&self, record: Address) -> Address {
        record.add(self.0.offset as u64)
    }

    pub fn len(&self, store: &dyn Store, record: Address) -> StoreResult<usize> {
        Ok(array_len(store, self.list(record))? as usize)
    }

    pub fn is_empty(&self, store: &dyn Store, record: Address) -> StoreResult<bool> {
        Ok(self.len(store, record)? == 0)
    }

    pub fn get(&self, store: &dyn Store, record: Address, index: usize) -> StoreResult<Option<Address>> {
        match u32::try_from(index) {
            Ok(index) => array_get(store, self.list(record), index),
            Err(_) => Ok(None),
        }
    }

    pub fn to_vec(&self, store: &dyn Store, record: Address) -> StoreResult<Vec<Address>> {
        let list = self.list(record);
        let len = array_len(store, list)?;
        let mut entries = Vec::with_capacity(len as usize);
        for index in 0..len {
            if let Some(entry) = array_get(store, list, index)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

impl FieldLifecycle for OneToMany {
    fn destruct(&self, db: &mut NodeDb, record: Address) -> NodeResult<()> {
        let forward = &self.0.forward;
        let children = array_take(db.store_mut(), self.list(record))?;
        for &child in &children {
            forward.clear_slot(db.store_mut(), child)?;
        }
        if forward.cascades() {
            for child in children {
                db.delete_if_unowned(child)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for OneToMany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneToMany")
            .field("offset", &self.0.offset)
            .field("forward", &self.0.forward.name())
            .finish()
    }
}

#[derive(Debug)]
struct OneToOneSide {
    side: RelationSide,
    ownership: Ownership,
}

impl OneToOneSide {
    fn cascades(&self) -> bool {
        self.ownership == Ownership::OwnedByReferent && self.side.is_node
    }
}

struct OneToOneDef {
    name: String,
    this: OneToOneSide,
    inverse: OnceLock<OneToOneSide>,
}

/// One slot of a one-to-one pair.
#[derive(Clone)]
pub struct OneToOne(Arc<OneToOneDef>);

impl OneToOne {
    pub const SIZE: u32 = Address::SIZE;

    pub(crate) fn new(name: String, ownership: Ownership, side: RelationSide) -> Self {
        Self(Arc::new(OneToOneDef {
            name,
            this: OneToOneSide { side, ownership },
            inverse: OnceLock::new(),
        }))
    }

    /// Binds `a` and `b` as each other's inverse.
    pub(crate) fn pair(a: &OneToOne, b: &OneToOne) -> SchemaResult<()> {
        if b.0.inverse.get().is_some() {
            return Err(SchemaError::inverse_already_bound(&b.0.name));
        }
        a.0.inverse
            .set(OneToOneSide {
                side: b.0.this.side.clone(),
                ownership: b.0.this.ownership,
            })
            .map_err(|_| SchemaError::inverse_already_bound(&a.0.name))?;
        b.0.inverse
            .set(OneToOneSide {
                side: a.0.this.side.clone(),
                ownership: a.0.this.ownership,
            })
            .map_err(|_| SchemaError::inverse_already_bound(&b.0.name))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn offset(&self) -> u32 {
        self.0.this.side.offset
    }

    pub fn ownership(&self) -> Ownership {
        self.0.this.ownership
    }

    fn inverse(&self) -> SchemaResult<&OneToOneSide> {
        self.0
            .inverse
            .get()
            .ok_or_else(|| SchemaError::unbound_relation(&self.0.name))
    }

    pub fn get(&self, store: &dyn Store, record: Address) -> StoreResult<Option<Address>> {
        Ok(store.get_address(self.0.this.side.slot(record))?.non_null())
    }

    /// Links `record` and `target`, detaching whatever either was linked
    /// to before. Records left without their owner are deleted.
    pub fn put(&self, db: &mut NodeDb, record: Address, target: Option<Address>) -> NodeResult<()> {
        let this = &self.0.this;
        let inverse = self.inverse()?;
        let previous = self.get(db.store(), record)?;
        if previous == target {
            return Ok(());
        }
        if let Some(target) = target {
            if inverse.side.is_node {
                db.check_kind_id(target, inverse.side.kind, &inverse.side.kind_name)?;
            }
        }

        let mut orphans = Vec::new();
        let store = db.store_mut();
        if let Some(previous) = previous {
            store.put_address(inverse.side.slot(previous), Address::NULL)?;
            if inverse.cascades() {
                orphans.push(previous);
            }
        }
        if let Some(target) = target {
            let back = inverse.side.slot(target);
            if let Some(partner) = store.get_address(back)?.non_null() {
                store.put_address(this.side.slot(partner), Address::NULL)?;
                if this.cascades() {
                    orphans.push(partner);
                }
            }
            store.put_address(back, record)?;
        }
        store.put_address(this.side.slot(record), target.into())?;

        if target.is_none() && this.cascades() {
            orphans.push(record);
        }
        for orphan in orphans {
            db.delete_if_unowned(orphan)?;
        }
        Ok(())
    }
}

impl FieldLifecycle for OneToOne {
    fn destruct(&self, db: &mut NodeDb, record: Address) -> NodeResult<()> {
        let Some(target) = self.get(db.store(), record)? else {
            return Ok(());
        };
        let inverse = self.inverse()?;
        let store = db.store_mut();
        store.put_address(inverse.side.slot(target), Address::NULL)?;
        store.put_address(self.0.this.side.slot(record), Address::NULL)?;
        if inverse.cascades() {
            db.delete_if_unowned(target)?;
        }
        Ok(())
    }

    fn owns_record(&self) -> bool {
        self.0.this.ownership == Ownership::OwnedByReferent
    }

    fn has_owner(&self, store: &dyn Store, record: Address) -> StoreResult<bool> {
        Ok(self.owns_record() && self.get(store, record)?.is_some())
    }
}

impl fmt::Debug for OneToOne {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneToOne")
            .field("name", &self.0.name)
            .field("offset", &self.0.this.side.offset)
            .field("ownership", &self.0.this.ownership)
            .field("bound", &self.0.inverse.get().is_some())
            .finish()
    }
}
