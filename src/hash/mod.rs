//! Content fingerprinting for nodedb
//!
//! A streaming 64-bit hash of character content, independent of how the
//! content is chunked. Used to detect whether indexed sources changed.

mod stream;

pub use stream::{hash, hash_file, hash_reader, split_hash, StreamHasher};
