//! Backing store for nodedb
//!
//! Records live in a byte-addressable, growable medium. This layer only
//! hands out blocks and moves bytes; it knows nothing about kinds or tags.
//!
//! # Design Principles
//!
//! - Addresses are stable for the lifetime of a block
//! - Address zero is the null address and is never allocated
//! - Freed blocks are reclaimed by the store, not by callers
//! - All multi-byte values are little-endian

mod address;
mod backend;
mod errors;
mod image;
mod memory;

pub use address::Address;
pub use backend::Store;
pub use errors::{Severity, StoreError, StoreErrorCode, StoreResult};
pub use image::{decode_image, encode_image, load_image, save_image, IMAGE_VERSION};
pub use memory::{MemoryStore, BLOCK_HEADER_SIZE, CHUNK_SIZE, DATA_AREA_OFFSET, DEFAULT_MAX_SIZE};
