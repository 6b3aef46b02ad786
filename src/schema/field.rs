//! Scalar and string field accessors
//!
//! An accessor is bound to one offset inside its kind. It reads and writes
//! that slot on any record of the kind or of a subtype.

use std::fmt;
use std::marker::PhantomData;

use crate::db::NodeDb;
use crate::error::NodeResult;
use crate::store::{Address, Store, StoreResult};

/// Per-field behavior when a record is deleted or checked for owners.
///
/// Only fields that hold references (strings, lists, relations) carry a
/// lifecycle; plain scalars have nothing to release.
pub trait FieldLifecycle: Send + Sync {
    /// Releases everything the field holds for `record`, unlinking the
    /// other side of relations.
    fn destruct(&self, db: &mut NodeDb, record: Address) -> NodeResult<()>;

    /// Whether this field can keep its record alive.
    fn owns_record(&self) -> bool {
        false
    }

    /// Whether `record` currently has an owner through this field.
    fn has_owner(&self, _store: &dyn Store, _record: Address) -> StoreResult<bool> {
        Ok(false)
    }
}

/// Fixed-width value that can live in a record slot.
pub trait Scalar: Copy + fmt::Debug + Send + Sync + 'static {
    /// Bytes occupied in the record
    const SIZE: u32;
    /// Name used in layout dumps
    const TYPE_NAME: &'static str;

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self>;
    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()>;
}

impl Scalar for bool {
    const SIZE: u32 = 1;
    const TYPE_NAME: &'static str = "bool";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        Ok(store.get_u8(address)? != 0)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_u8(address, self as u8)
    }
}

impl Scalar for i8 {
    const SIZE: u32 = 1;
    const TYPE_NAME: &'static str = "byte";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_i8(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_i8(address, self)
    }
}

impl Scalar for i16 {
    const SIZE: u32 = 2;
    const TYPE_NAME: &'static str = "short";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_i16(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_i16(address, self)
    }
}

/// UTF-16 code unit
impl Scalar for u16 {
    const SIZE: u32 = 2;
    const TYPE_NAME: &'static str = "char";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_u16(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_u16(address, self)
    }
}

impl Scalar for i32 {
    const SIZE: u32 = 4;
    const TYPE_NAME: &'static str = "int";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_i32(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_i32(address, self)
    }
}

impl Scalar for i64 {
    const SIZE: u32 = 8;
    const TYPE_NAME: &'static str = "long";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_i64(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_i64(address, self)
    }
}

impl Scalar for f32 {
    const SIZE: u32 = 4;
    const TYPE_NAME: &'static str = "float";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_f32(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_f32(address, self)
    }
}

impl Scalar for f64 {
    const SIZE: u32 = 8;
    const TYPE_NAME: &'static str = "double";

    fn load(store: &dyn Store, address: Address) -> StoreResult<Self> {
        store.get_f64(address)
    }

    fn save(self, store: &mut dyn Store, address: Address) -> StoreResult<()> {
        store.put_f64(address, self)
    }
}

/// Accessor for a fixed-width scalar slot.
#[derive(Debug, Clone, Copy)]
pub struct ScalarField<T> {
    offset: u32,
    _marker: PhantomData<fn() -> T>,
}

pub type BoolField = ScalarField<bool>;
pub type ByteField = ScalarField<i8>;
pub type ShortField = ScalarField<i16>;
pub type CharField = ScalarField<u16>;
pub type IntField = ScalarField<i32>;
pub type LongField = ScalarField<i64>;
pub type FloatField = ScalarField<f32>;
pub type DoubleField = ScalarField<f64>;

impl<T: Scalar> ScalarField<T> {
    pub(crate) fn new(offset: u32) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    /// Offset of the slot from the start of the record
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn get(&self, store: &dyn Store, record: Address) -> StoreResult<T> {
        T::load(store, record.add(self.offset as u64))
    }

    pub fn put(&self, store: &mut dyn Store, record: Address, value: T) -> StoreResult<()> {
        value.save(store, record.add(self.offset as u64))
    }
}

/// Accessor for a string slot. The slot holds the address of a separately
/// allocated string block which the record owns.
#[derive(Debug, Clone, Copy)]
pub struct StringField {
    offset: u32,
}

impl StringField {
    /// Bytes occupied in the record
    pub const SIZE: u32 = Address::SIZE;

    pub(crate) fn new(offset: u32) -> Self {
        Self { offset }
    }

    /// Offset of the slot from the start of the record
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Reads the string; an unset slot reads as the empty string.
    pub fn get(&self, store: &dyn Store, record: Address) -> StoreResult<String> {
        let block = store.get_address(record.add(self.offset as u64))?;
        store.get_string(block)
    }

    /// Replaces the string, releasing the previous block.
    pub fn put(&self, store: &mut dyn Store, record: Address, value: &str) -> StoreResult<()> {
        let slot = record.add(self.offset as u64);
        let previous = store.get_address(slot)?;
        let block = store.new_string(value)?;
        store.put_address(slot, block)?;
        store.free(previous)
    }

    fn release(&self, store: &mut dyn Store, record: Address) -> StoreResult<()> {
        let slot = record.add(self.offset as u64);
        let block = store.get_address(slot)?;
        store.put_address(slot, Address::NULL)?;
        store.free(block)
    }
}

impl FieldLifecycle for StringField {
    fn destruct(&self, db: &mut NodeDb, record: Address) -> NodeResult<()> {
        self.release(db.store_mut(), record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_scalar_slots_are_independent() {
        let mut store = MemoryStore::new();
        let record = store.allocate(16).unwrap();
        let int_field = IntField::new(0);
        let byte_field = ByteField::new(4);
        let double_field = DoubleField::new(5);

        int_field.put(&mut store, record, i32::MIN).unwrap();
        byte_field.put(&mut store, record, -1).unwrap();
        double_field.put(&mut store, record, f64::NAN).unwrap();

        assert_eq!(int_field.get(&store, record).unwrap(), i32::MIN);
        assert_eq!(byte_field.get(&store, record).unwrap(), -1);
        assert_eq!(
            double_field.get(&store, record).unwrap().to_bits(),
            f64::NAN.to_bits()
        );
    }

    #[test]
    fn test_bool_field() {
        let mut store = MemoryStore::new();
        let record = store.allocate(1).unwrap();
        let field = BoolField::new(0);
        assert!(!field.get(&store, record).unwrap());
        field.put(&mut store, record, true).unwrap();
        assert!(field.get(&store, record).unwrap());
    }

    #[test]
    fn test_string_replace_frees_previous_block() {
        let mut store = MemoryStore::new();
        let record = store.allocate(StringField::SIZE).unwrap();
        let field = StringField::new(0);

        assert_eq!(field.get(&store, record).unwrap(), "");
        field.put(&mut store, record, "first").unwrap();
        let blocks = store.allocated_blocks();
        field.put(&mut store, record, "second").unwrap();

        assert_eq!(field.get(&store, record).unwrap(), "second");
        assert_eq!(store.allocated_blocks(), blocks);
        assert_eq!(store.free_block_count(), 1);
    }

    #[test]
    fn test_string_release() {
        let mut store = MemoryStore::new();
        let record = store.allocate(StringField::SIZE).unwrap();
        let field = StringField::new(0);
        field.put(&mut store, record, "gone").unwrap();
        field.release(&mut store, record).unwrap();
        assert_eq!(field.get(&store, record).unwrap(), "");
        assert_eq!(store.allocated_blocks(), 1);
    }
}
