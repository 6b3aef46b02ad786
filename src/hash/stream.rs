//! Streaming 64-bit content hasher
//!
//! Based on Bob Jenkins' lookup3 mixing. Text is consumed as UTF-16 code
//! units, two at a time, so the result only depends on the sequence of code
//! units and never on how the text was split into chunks. File contents are
//! hashed byte by byte, each byte widened to one unit.
//!
//! ```text
//! units:  u0 u1 | u2 u3 | u4 u5 | u6 u7 ...
//! fold:    a    |  b    |  c, mix | a ...
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Fixed seed (digits of pi).
const SEED: u64 = 3141592653589793238;

/// Buffer size for file hashing.
const READ_CHUNK: usize = 64 * 1024;

/// Raw hash of the empty input. Every result is XORed with this value so
/// that hashing nothing yields zero.
const EMPTY_HASH: u64 = StreamHasher::new().finish_raw();

/// Computes the 64-bit hash of text delivered as ordered chunks.
///
/// The hasher is single-use: [`StreamHasher::compute_hash`] consumes it.
#[derive(Debug, Clone)]
pub struct StreamHasher {
    a: u32,
    b: u32,
    c: u32,
    /// Position within the current six-unit group
    state: u8,
    /// First unit of an incomplete pair
    pending: u16,
}

impl StreamHasher {
    /// Creates a hasher seeded with the fixed constant.
    pub const fn new() -> Self {
        let low = SEED as u32;
        Self {
            a: low,
            b: low,
            c: low.wrapping_add((SEED >> 32) as u32),
            state: 0,
            pending: 0,
        }
    }

    /// Adds the next chunk of text.
    pub fn add_chunk(&mut self, chunk: &str) {
        for unit in chunk.encode_utf16() {
            self.push(unit);
        }
    }

    /// Adds the next chunk of UTF-16 code units. A chunk may end between
    /// the two halves of a surrogate pair.
    pub fn add_utf16_chunk(&mut self, chunk: &[u16]) {
        for &unit in chunk {
            self.push(unit);
        }
    }

    /// Adds the next chunk of raw bytes, one unit per byte. ASCII bytes
    /// hash the same as the equivalent text.
    pub fn add_bytes(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.push(byte as u16);
        }
    }

    /// Finishes the hash.
    pub fn compute_hash(self) -> u64 {
        self.finish_raw() ^ EMPTY_HASH
    }

    fn push(&mut self, unit: u16) {
        match self.state {
            0 | 2 | 4 => self.pending = unit,
            1 => self.a = self.a.wrapping_add(pair(self.pending, unit)),
            3 => self.b = self.b.wrapping_add(pair(self.pending, unit)),
            _ => {
                self.c = self.c.wrapping_add(pair(self.pending, unit));
                let (a, b, c) = mix(self.a, self.b, self.c);
                self.a = a;
                self.b = b;
                self.c = c;
            }
        }
        self.state = if self.state == 5 { 0 } else { self.state + 1 };
    }

    const fn finish_raw(self) -> u64 {
        let mut a = self.a;
        let mut b = self.b;
        let mut c = self.c;
        match self.state {
            1 => a = a.wrapping_add(self.pending as u32),
            3 => b = b.wrapping_add(self.pending as u32),
            5 => c = c.wrapping_add(self.pending as u32),
            _ => {}
        }
        let (_, b, c) = final_mix(a, b, c);
        (c as u64) | ((b as u64) << 32)
    }
}

impl Default for StreamHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes a complete string in one call.
pub fn hash(text: &str) -> u64 {
    let mut hasher = StreamHasher::new();
    hasher.add_chunk(text);
    hasher.compute_hash()
}

/// Hashes everything a reader yields, one buffer at a time.
pub fn hash_reader<R: Read>(reader: R) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(READ_CHUNK, reader);
    let mut hasher = StreamHasher::new();
    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            break;
        }
        hasher.add_bytes(chunk);
        let consumed = chunk.len();
        reader.consume(consumed);
    }
    Ok(hasher.compute_hash())
}

/// Hashes the contents of a file without loading it whole.
pub fn hash_file(path: &Path) -> io::Result<u64> {
    hash_reader(File::open(path)?)
}

/// Splits a hash into its (high, low) 32-bit halves.
pub fn split_hash(hash: u64) -> (u32, u32) {
    ((hash >> 32) as u32, hash as u32)
}

const fn pair(first: u16, second: u16) -> u32 {
    (first as u32) | ((second as u32) << 16)
}

/// Reversible mix applied after every three pairs.
const fn mix(mut a: u32, mut b: u32, mut c: u32) -> (u32, u32, u32) {
    a = a.wrapping_sub(c);
    a ^= c.rotate_left(4);
    c = c.wrapping_add(b);

    b = b.wrapping_sub(a);
    b ^= a.rotate_left(6);
    a = a.wrapping_add(c);

    c = c.wrapping_sub(b);
    c ^= b.rotate_left(8);
    b = b.wrapping_add(a);

    a = a.wrapping_sub(c);
    a ^= c.rotate_left(16);
    c = c.wrapping_add(b);

    b = b.wrapping_sub(a);
    b ^= a.rotate_left(19);
    a = a.wrapping_add(c);

    c = c.wrapping_sub(b);
    c ^= b.rotate_left(4);
    b = b.wrapping_add(a);

    (a, b, c)
}

/// Final, non-reversible mix; the entropy ends up in b and c.
const fn final_mix(mut a: u32, mut b: u32, mut c: u32) -> (u32, u32, u32) {
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(14));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(11));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(25));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(16));
    a ^= c;
    a = a.wrapping_sub(c.rotate_left(4));
    b ^= a;
    b = b.wrapping_sub(a.rotate_left(14));
    c ^= b;
    c = c.wrapping_sub(b.rotate_left(24));
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_hashes_to_zero() {
        assert_eq!(StreamHasher::new().compute_hash(), 0);
        assert_eq!(hash(""), 0);
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let mut hasher = StreamHasher::new();
        hasher.add_chunk("");
        hasher.add_chunk("abc");
        hasher.add_chunk("");
        assert_eq!(hasher.compute_hash(), hash("abc"));
    }

    #[test]
    fn test_every_split_point_matches_single_chunk() {
        let text = "public static final int MAX_VALUE = 0x7fffffff;";
        let expected = hash(text);
        for split in 0..=text.len() {
            let mut hasher = StreamHasher::new();
            hasher.add_chunk(&text[..split]);
            hasher.add_chunk(&text[split..]);
            assert_eq!(hasher.compute_hash(), expected, "split at {}", split);
        }
    }

    #[test]
    fn test_surrogate_pair_split_across_chunks() {
        let text = "a\u{1F600}b";
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut hasher = StreamHasher::new();
        hasher.add_utf16_chunk(&units[..2]);
        hasher.add_utf16_chunk(&units[2..]);
        assert_eq!(hasher.compute_hash(), hash(text));
    }

    #[test]
    fn test_trailing_partial_pair_changes_hash() {
        // Lengths 1..=6 exercise every accumulator and the partial-pair fold
        let values: Vec<u64> = (1..=6).map(|n| hash(&"x".repeat(n))).collect();
        for (i, a) in values.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &values[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_ascii_bytes_match_text() {
        let text = "class A { int x; }";
        let mut hasher = StreamHasher::new();
        hasher.add_bytes(text.as_bytes());
        assert_eq!(hasher.compute_hash(), hash(text));
    }

    #[test]
    fn test_high_bytes_are_distinct() {
        let hash_of = |bytes: &[u8]| hash_reader(bytes).unwrap();
        let a = hash_of(&[0xca, 0xfe, 0xba, 0xbe, 0x80]);
        let b = hash_of(&[0xca, 0xfe, 0xba, 0xbe, 0x81]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_reader_spanning_several_buffers() {
        let bytes: Vec<u8> = (0..READ_CHUNK * 2 + 3).map(|i| (i % 251) as u8).collect();
        let mut hasher = StreamHasher::new();
        for piece in bytes.chunks(7) {
            hasher.add_bytes(piece);
        }
        assert_eq!(hash_reader(&bytes[..]).unwrap(), hasher.compute_hash());
    }

    #[test]
    fn test_split_hash_halves() {
        let value = 0x1234_5678_9abc_def0;
        assert_eq!(split_hash(value), (0x1234_5678, 0x9abc_def0));
    }
}
