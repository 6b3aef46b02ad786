//! # Backing Store Trait
//!
//! The byte-addressable medium records live in. Implementations provide raw
//! reads, writes and block allocation; the typed accessors are built on top
//! and fix the on-store encoding (little-endian, strings as
//! `[u32 length][UTF-8 bytes]` blocks referenced by address).

use std::any::Any;

use super::address::Address;
use super::errors::{StoreError, StoreResult};

/// Growable byte-addressable storage.
///
/// The store owns any locking or transaction discipline. Callers hold `&mut`
/// for the duration of a write.
pub trait Store: Send + std::fmt::Debug {
    /// Fill `buf` with the bytes starting at `address`
    fn read(&self, address: Address, buf: &mut [u8]) -> StoreResult<()>;

    /// Overwrite the bytes starting at `address`
    fn write(&mut self, address: Address, data: &[u8]) -> StoreResult<()>;

    /// Allocate a zeroed block of at least `size` bytes
    fn allocate(&mut self, size: u32) -> StoreResult<Address>;

    /// Release a block returned by [`Store::allocate`]. Freeing the null
    /// address is a no-op.
    fn free(&mut self, address: Address) -> StoreResult<()>;

    /// Downcast support for callers that need the concrete store back
    fn as_any(&self) -> &dyn Any;

    /// End of the addressable area. Every read past it fails.
    fn extent(&self) -> u64;

    /// Zero `len` bytes starting at `address`
    fn clear(&mut self, address: Address, len: usize) -> StoreResult<()> {
        self.write(address, &vec![0u8; len])
    }

    fn get_u8(&self, address: Address) -> StoreResult<u8> {
        let mut buf = [0u8; 1];
        self.read(address, &mut buf)?;
        Ok(buf[0])
    }

    fn put_u8(&mut self, address: Address, value: u8) -> StoreResult<()> {
        self.write(address, &[value])
    }

    fn get_i8(&self, address: Address) -> StoreResult<i8> {
        Ok(self.get_u8(address)? as i8)
    }

    fn put_i8(&mut self, address: Address, value: i8) -> StoreResult<()> {
        self.put_u8(address, value as u8)
    }

    fn get_u16(&self, address: Address) -> StoreResult<u16> {
        let mut buf = [0u8; 2];
        self.read(address, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn put_u16(&mut self, address: Address, value: u16) -> StoreResult<()> {
        self.write(address, &value.to_le_bytes())
    }

    fn get_i16(&self, address: Address) -> StoreResult<i16> {
        Ok(self.get_u16(address)? as i16)
    }

    fn put_i16(&mut self, address: Address, value: i16) -> StoreResult<()> {
        self.put_u16(address, value as u16)
    }

    fn get_u32(&self, address: Address) -> StoreResult<u32> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn put_u32(&mut self, address: Address, value: u32) -> StoreResult<()> {
        self.write(address, &value.to_le_bytes())
    }

    fn get_i32(&self, address: Address) -> StoreResult<i32> {
        Ok(self.get_u32(address)? as i32)
    }

    fn put_i32(&mut self, address: Address, value: i32) -> StoreResult<()> {
        self.put_u32(address, value as u32)
    }

    fn get_u64(&self, address: Address) -> StoreResult<u64> {
        let mut buf = [0u8; 8];
        self.read(address, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn put_u64(&mut self, address: Address, value: u64) -> StoreResult<()> {
        self.write(address, &value.to_le_bytes())
    }

    fn get_i64(&self, address: Address) -> StoreResult<i64> {
        Ok(self.get_u64(address)? as i64)
    }

    fn put_i64(&mut self, address: Address, value: i64) -> StoreResult<()> {
        self.put_u64(address, value as u64)
    }

    /// Floats are stored as their raw bits, so NaN payloads and signed
    /// zeros survive a round trip.
    fn get_f32(&self, address: Address) -> StoreResult<f32> {
        Ok(f32::from_bits(self.get_u32(address)?))
    }

    fn put_f32(&mut self, address: Address, value: f32) -> StoreResult<()> {
        self.put_u32(address, value.to_bits())
    }

    fn get_f64(&self, address: Address) -> StoreResult<f64> {
        Ok(f64::from_bits(self.get_u64(address)?))
    }

    fn put_f64(&mut self, address: Address, value: f64) -> StoreResult<()> {
        self.put_u64(address, value.to_bits())
    }

    fn get_address(&self, address: Address) -> StoreResult<Address> {
        Ok(Address::new(self.get_u64(address)?))
    }

    fn put_address(&mut self, address: Address, value: Address) -> StoreResult<()> {
        self.put_u64(address, value.get())
    }

    /// Store a string in its own block. The empty string is stored as the
    /// null address.
    fn new_string(&mut self, value: &str) -> StoreResult<Address> {
        if value.is_empty() {
            return Ok(Address::NULL);
        }
        let len = u32::try_from(value.len())
            .map_err(|_| StoreError::out_of_space(value.len() as u64, u32::MAX as u64))?;
        let block = self.allocate(4 + len)?;
        self.put_u32(block, len)?;
        self.write(block.add(4), value.as_bytes())?;
        Ok(block)
    }

    /// Read a string written by [`Store::new_string`]. The null address
    /// reads as the empty string.
    fn get_string(&self, address: Address) -> StoreResult<String> {
        if address.is_null() {
            return Ok(String::new());
        }
        let len = self.get_u32(address)? as usize;
        let body = address.add(4);
        if body.get().saturating_add(len as u64) > self.extent() {
            return Err(StoreError::out_of_bounds(body, len));
        }
        let mut bytes = vec![0u8; len];
        self.read(body, &mut bytes)?;
        String::from_utf8(bytes)
            .map_err(|e| StoreError::corruption_at(address, format!("invalid UTF-8 string: {}", e)))
    }
}
