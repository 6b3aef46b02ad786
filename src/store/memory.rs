//! In-memory backing store
//!
//! Layout:
//!
//! ```text
//! +------------------------+ 0
//! | reserved (null area)   |
//! +------------------------+ DATA_AREA_OFFSET
//! | size|flags (u32 LE)    | block header
//! | payload ...            | <- address handed out
//! +------------------------+
//! | size|flags (u32 LE)    |
//! | payload ...            |
//! +------------------------+ top
//! ```
//!
//! The buffer grows in whole chunks. Freed blocks are kept on a free list
//! keyed by exact payload size and handed out again, zeroed.

use std::any::Any;
use std::collections::BTreeMap;

use super::address::Address;
use super::backend::Store;
use super::errors::{StoreError, StoreResult};

/// Growth granularity of the backing buffer
pub const CHUNK_SIZE: usize = 4 * 1024;

/// Size of the per-block header
pub const BLOCK_HEADER_SIZE: u64 = 4;

/// First byte that may belong to a block; everything before it is the
/// reserved null area.
pub const DATA_AREA_OFFSET: u64 = 8;

/// Header bit marking a block as free
const FREE_FLAG: u32 = 0x8000_0000;

/// Default maximum size (1 GiB)
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;

/// A growable byte vector implementing [`Store`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: Vec<u8>,
    /// End of the last block
    top: u64,
    max_size: u64,
    free_blocks: BTreeMap<u32, Vec<u64>>,
    allocated_blocks: usize,
}

impl MemoryStore {
    /// Creates an empty store with the default limits.
    pub fn new() -> Self {
        Self::with_limits(CHUNK_SIZE as u64, DEFAULT_MAX_SIZE)
    }

    /// Creates an empty store that reserves `initial_capacity` bytes up
    /// front and refuses to grow past `max_size` bytes.
    pub fn with_limits(initial_capacity: u64, max_size: u64) -> Self {
        let mut data = Vec::with_capacity(initial_capacity.min(max_size) as usize);
        data.resize(CHUNK_SIZE, 0);
        Self {
            data,
            top: DATA_AREA_OFFSET,
            max_size,
            free_blocks: BTreeMap::new(),
            allocated_blocks: 0,
        }
    }

    /// Rebuilds a store from the used area of a saved image.
    ///
    /// Walks every block header to rebuild the free list; a header that
    /// does not describe a block inside `bytes` is corruption.
    pub fn from_bytes(bytes: Vec<u8>, max_size: u64) -> StoreResult<Self> {
        let top = bytes.len() as u64;
        if top < DATA_AREA_OFFSET {
            return Err(StoreError::data_corruption(format!(
                "image too short: {} bytes",
                top
            )));
        }
        if top > max_size {
            return Err(StoreError::out_of_space(top, max_size));
        }

        let mut store = Self {
            data: bytes,
            top,
            max_size,
            free_blocks: BTreeMap::new(),
            allocated_blocks: 0,
        };

        let mut offset = DATA_AREA_OFFSET;
        while offset < top {
            let header = store.header_at(offset)?;
            let size = header & !FREE_FLAG;
            let end = offset + BLOCK_HEADER_SIZE + size as u64;
            if size == 0 || end > top {
                return Err(StoreError::corruption_at(
                    Address::new(offset),
                    format!("invalid block header {:#010x}", header),
                ));
            }
            if header & FREE_FLAG != 0 {
                store
                    .free_blocks
                    .entry(size)
                    .or_default()
                    .push(offset + BLOCK_HEADER_SIZE);
            } else {
                store.allocated_blocks += 1;
            }
            offset = end;
        }

        let padded = round_up_to_chunk(top as usize);
        store.data.resize(padded, 0);
        Ok(store)
    }

    /// Returns the used area (null area and all blocks).
    pub fn used_bytes(&self) -> &[u8] {
        &self.data[..self.top as usize]
    }

    /// Returns the number of bytes in use, including headers.
    pub fn used_len(&self) -> u64 {
        self.top
    }

    /// Returns the configured maximum size.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Returns the number of live (not freed) blocks.
    pub fn allocated_blocks(&self) -> usize {
        self.allocated_blocks
    }

    /// Returns the number of freed blocks awaiting reuse.
    pub fn free_block_count(&self) -> usize {
        self.free_blocks.values().map(Vec::len).sum()
    }

    /// Returns the payload size of the live block at `address`.
    pub fn block_size(&self, address: Address) -> StoreResult<u32> {
        self.live_header(address)
    }

    fn header_at(&self, offset: u64) -> StoreResult<u32> {
        let start = offset as usize;
        let bytes = self
            .data
            .get(start..start + BLOCK_HEADER_SIZE as usize)
            .ok_or_else(|| StoreError::out_of_bounds(Address::new(offset), 4))?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn set_header(&mut self, offset: u64, header: u32) {
        let start = offset as usize;
        self.data[start..start + BLOCK_HEADER_SIZE as usize].copy_from_slice(&header.to_le_bytes());
    }

    /// Validates that `address` is the payload start of a live block and
    /// returns its size.
    fn live_header(&self, address: Address) -> StoreResult<u32> {
        let raw = address.get();
        if raw < DATA_AREA_OFFSET + BLOCK_HEADER_SIZE || raw > self.top {
            return Err(StoreError::out_of_bounds(address, 0));
        }
        let header = self.header_at(raw - BLOCK_HEADER_SIZE)?;
        if header & FREE_FLAG != 0 {
            return Err(StoreError::corruption_at(address, "block already freed"));
        }
        let past_top = raw
            .checked_add(header as u64)
            .map_or(true, |end| end > self.top);
        if header == 0 || past_top {
            return Err(StoreError::corruption_at(
                address,
                format!("invalid block header {:#010x}", header),
            ));
        }
        Ok(header)
    }

    fn check_range(&self, address: Address, len: usize) -> StoreResult<usize> {
        let start = address.get();
        let end = start
            .checked_add(len as u64)
            .ok_or_else(|| StoreError::out_of_bounds(address, len))?;
        if start < DATA_AREA_OFFSET || end > self.top {
            return Err(StoreError::out_of_bounds(address, len));
        }
        Ok(start as usize)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn read(&self, address: Address, buf: &mut [u8]) -> StoreResult<()> {
        let start = self.check_range(address, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, address: Address, data: &[u8]) -> StoreResult<()> {
        let start = self.check_range(address, data.len())?;
        self.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn allocate(&mut self, size: u32) -> StoreResult<Address> {
        // Zero-sized blocks would make header walks ambiguous
        let size = size.max(1);
        if size & FREE_FLAG != 0 {
            return Err(StoreError::out_of_space(size as u64, self.max_size));
        }

        if let Some(payload) = self.free_blocks.get_mut(&size).and_then(Vec::pop) {
            self.set_header(payload - BLOCK_HEADER_SIZE, size);
            let start = payload as usize;
            self.data[start..start + size as usize].fill(0);
            self.allocated_blocks += 1;
            return Ok(Address::new(payload));
        }

        let header_offset = self.top;
        let end = header_offset + BLOCK_HEADER_SIZE + size as u64;
        if end > self.max_size {
            return Err(StoreError::out_of_space(size as u64, self.max_size));
        }
        if end as usize > self.data.len() {
            self.data.resize(round_up_to_chunk(end as usize), 0);
        }
        self.set_header(header_offset, size);
        self.top = end;
        self.allocated_blocks += 1;
        Ok(Address::new(header_offset + BLOCK_HEADER_SIZE))
    }

    fn free(&mut self, address: Address) -> StoreResult<()> {
        if address.is_null() {
            return Ok(());
        }
        let size = self.live_header(address)?;
        self.set_header(address.get() - BLOCK_HEADER_SIZE, size | FREE_FLAG);
        self.free_blocks.entry(size).or_default().push(address.get());
        self.allocated_blocks -= 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extent(&self) -> u64 {
        self.top
    }
}

fn round_up_to_chunk(len: usize) -> usize {
    len.div_ceil(CHUNK_SIZE) * CHUNK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorCode;

    #[test]
    fn test_allocate_never_returns_null() {
        let mut store = MemoryStore::new();
        let address = store.allocate(4).unwrap();
        assert!(!address.is_null());
        assert!(address.get() >= DATA_AREA_OFFSET + BLOCK_HEADER_SIZE);
    }

    #[test]
    fn test_allocations_do_not_overlap() {
        let mut store = MemoryStore::new();
        let a = store.allocate(16).unwrap();
        let b = store.allocate(16).unwrap();
        assert!(b.get() >= a.get() + 16);
    }

    #[test]
    fn test_typed_round_trip() {
        let mut store = MemoryStore::new();
        let address = store.allocate(32).unwrap();
        store.put_i32(address, -42).unwrap();
        store.put_f64(address.add(4), -0.0).unwrap();
        store.put_u16(address.add(12), 0xfeff).unwrap();
        assert_eq!(store.get_i32(address).unwrap(), -42);
        assert_eq!(store.get_f64(address.add(4)).unwrap().to_bits(), (-0.0f64).to_bits());
        assert_eq!(store.get_u16(address.add(12)).unwrap(), 0xfeff);
    }

    #[test]
    fn test_strings() {
        let mut store = MemoryStore::new();
        let s = store.new_string("java/lang/String").unwrap();
        assert_eq!(store.get_string(s).unwrap(), "java/lang/String");
        assert_eq!(store.new_string("").unwrap(), Address::NULL);
        assert_eq!(store.get_string(Address::NULL).unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8_is_corruption() {
        let mut store = MemoryStore::new();
        let block = store.allocate(6).unwrap();
        store.put_u32(block, 2).unwrap();
        store.write(block.add(4), &[0xff, 0xfe]).unwrap();
        let err = store.get_string(block).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdDataCorruption);
    }

    #[test]
    fn test_null_dereference_is_out_of_bounds() {
        let store = MemoryStore::new();
        let err = store.get_u32(Address::NULL).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdStoreOutOfBounds);
    }

    #[test]
    fn test_wild_address_is_out_of_bounds() {
        let mut store = MemoryStore::new();
        store.allocate(16).unwrap();
        let wild = Address::new(u64::MAX - 1);
        let err = store.get_u32(wild).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdStoreOutOfBounds);
        assert!(store.get_u64(wild.add(8)).is_err());
        assert!(store.block_size(wild).is_err());
        assert!(store.free(wild).is_err());
    }

    #[test]
    fn test_corrupt_string_length_is_out_of_bounds() {
        let mut store = MemoryStore::new();
        let block = store.allocate(8).unwrap();
        store.put_u32(block, u32::MAX).unwrap();
        let err = store.get_string(block).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdStoreOutOfBounds);
    }

    #[test]
    fn test_freed_block_is_reused_zeroed() {
        let mut store = MemoryStore::new();
        let first = store.allocate(8).unwrap();
        store.put_u64(first, u64::MAX).unwrap();
        store.free(first).unwrap();
        assert_eq!(store.free_block_count(), 1);

        let second = store.allocate(8).unwrap();
        assert_eq!(second, first);
        assert_eq!(store.get_u64(second).unwrap(), 0);
        assert_eq!(store.free_block_count(), 0);
    }

    #[test]
    fn test_double_free_is_corruption() {
        let mut store = MemoryStore::new();
        let block = store.allocate(8).unwrap();
        store.free(block).unwrap();
        let err = store.free(block).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdDataCorruption);
    }

    #[test]
    fn test_grows_in_chunks_until_max_size() {
        let mut store = MemoryStore::with_limits(0, 3 * CHUNK_SIZE as u64);
        store.allocate(CHUNK_SIZE as u32).unwrap();
        store.allocate(CHUNK_SIZE as u32).unwrap();
        let err = store.allocate(CHUNK_SIZE as u32).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdStoreOutOfSpace);
    }

    #[test]
    fn test_from_bytes_rebuilds_free_list() {
        let mut store = MemoryStore::new();
        let a = store.allocate(12).unwrap();
        let _b = store.allocate(20).unwrap();
        store.free(a).unwrap();

        let copy = MemoryStore::from_bytes(store.used_bytes().to_vec(), DEFAULT_MAX_SIZE).unwrap();
        assert_eq!(copy.allocated_blocks(), 1);
        assert_eq!(copy.free_block_count(), 1);
        assert_eq!(copy.used_len(), store.used_len());
    }

    #[test]
    fn test_from_bytes_rejects_bad_header() {
        let mut store = MemoryStore::new();
        store.allocate(12).unwrap();
        let mut bytes = store.used_bytes().to_vec();
        // Header claims a block far past the end
        bytes[DATA_AREA_OFFSET as usize..DATA_AREA_OFFSET as usize + 4]
            .copy_from_slice(&1000u32.to_le_bytes());
        let err = MemoryStore::from_bytes(bytes, DEFAULT_MAX_SIZE).unwrap_err();
        assert_eq!(err.code(), StoreErrorCode::NdDataCorruption);
    }
}
