//! Store image files
//!
//! A [`MemoryStore`] can be saved to and reloaded from a single file:
//!
//! ```text
//! +------------------+
//! | Magic "NDBI"     | (4 bytes)
//! +------------------+
//! | Format Version   | (u32 LE)
//! +------------------+
//! | Data Length      | (u64 LE)
//! +------------------+
//! | Data             | (used area of the store)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 of everything above)
//! +------------------+
//! ```
//!
//! Any mismatch on load is reported as data corruption; a corrupt image is
//! never partially loaded.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crc32fast::Hasher;

use super::errors::{StoreError, StoreResult};
use super::memory::MemoryStore;
use crate::observability::Logger;

const MAGIC: &[u8; 4] = b"NDBI";

/// Current image format version
pub const IMAGE_VERSION: u32 = 1;

const HEADER_SIZE: usize = 4 + 4 + 8;
const CHECKSUM_SIZE: usize = 4;

/// Serializes the used area of `store` into image bytes.
pub fn encode_image(store: &MemoryStore) -> Vec<u8> {
    let data = store.used_bytes();
    let mut image = Vec::with_capacity(HEADER_SIZE + data.len() + CHECKSUM_SIZE);
    image.extend_from_slice(MAGIC);
    image.extend_from_slice(&IMAGE_VERSION.to_le_bytes());
    image.extend_from_slice(&(data.len() as u64).to_le_bytes());
    image.extend_from_slice(data);

    let mut hasher = Hasher::new();
    hasher.update(&image);
    image.extend_from_slice(&hasher.finalize().to_le_bytes());
    image
}

/// Verifies and decodes image bytes into a store limited to `max_size`.
pub fn decode_image(image: &[u8], max_size: u64) -> StoreResult<MemoryStore> {
    if image.len() < HEADER_SIZE + CHECKSUM_SIZE {
        return Err(StoreError::data_corruption(format!(
            "image truncated: {} bytes",
            image.len()
        )));
    }

    let checksum_offset = image.len() - CHECKSUM_SIZE;
    let stored = u32::from_le_bytes([
        image[checksum_offset],
        image[checksum_offset + 1],
        image[checksum_offset + 2],
        image[checksum_offset + 3],
    ]);
    let mut hasher = Hasher::new();
    hasher.update(&image[..checksum_offset]);
    let computed = hasher.finalize();
    if computed != stored {
        return Err(StoreError::data_corruption(format!(
            "image checksum mismatch: computed {:08x}, stored {:08x}",
            computed, stored
        )));
    }

    if &image[0..4] != MAGIC {
        return Err(StoreError::data_corruption("not a store image"));
    }
    let version = u32::from_le_bytes([image[4], image[5], image[6], image[7]]);
    if version != IMAGE_VERSION {
        return Err(StoreError::data_corruption(format!(
            "unsupported image version {}",
            version
        )));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&image[8..16]);
    let data_len = u64::from_le_bytes(len_bytes);
    if data_len != (checksum_offset - HEADER_SIZE) as u64 {
        return Err(StoreError::data_corruption(format!(
            "image length mismatch: header says {}, found {}",
            data_len,
            checksum_offset - HEADER_SIZE
        )));
    }

    MemoryStore::from_bytes(image[HEADER_SIZE..checksum_offset].to_vec(), max_size)
}

/// Writes `store` to `path`, replacing any previous image.
pub fn save_image(store: &MemoryStore, path: &Path) -> StoreResult<()> {
    let image = encode_image(store);
    let mut file = File::create(path).map_err(|e| {
        StoreError::io_error(format!("failed to create {}", path.display()), e)
    })?;
    file.write_all(&image)
        .and_then(|_| file.sync_all())
        .map_err(|e| StoreError::io_error(format!("failed to write {}", path.display()), e))?;

    Logger::info(
        "STORE_IMAGE_SAVED",
        &[
            ("bytes", &image.len().to_string()),
            ("path", &path.display().to_string()),
        ],
    );
    Ok(())
}

/// Loads the image at `path`.
pub fn load_image(path: &Path, max_size: u64) -> StoreResult<MemoryStore> {
    let image = fs::read(path)
        .map_err(|e| StoreError::io_error(format!("failed to read {}", path.display()), e))?;

    match decode_image(&image, max_size) {
        Ok(store) => {
            Logger::info(
                "STORE_IMAGE_LOADED",
                &[
                    ("blocks", &store.allocated_blocks().to_string()),
                    ("path", &path.display().to_string()),
                ],
            );
            Ok(store)
        }
        Err(e) => {
            Logger::error(
                "STORE_IMAGE_CORRUPT",
                &[
                    ("path", &path.display().to_string()),
                    ("reason", e.message()),
                ],
            );
            Err(e)
        }
    }
}
