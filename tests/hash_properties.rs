//! Content Hash Property Tests
//!
//! - Chunk boundaries never change the result
//! - Empty input hashes to zero
//! - Single character mutations flip about half the output bits

use nodedb::hash::{hash, split_hash, StreamHasher};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Helper Functions
// =============================================================================

fn random_text(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| rng.gen_range(b' '..=b'~') as char)
        .collect()
}

fn hash_in_chunks(text: &str, cuts: &[usize]) -> u64 {
    let mut hasher = StreamHasher::new();
    let mut start = 0;
    for &cut in cuts {
        hasher.add_chunk(&text[start..cut]);
        start = cut;
    }
    hasher.add_chunk(&text[start..]);
    hasher.compute_hash()
}

// =============================================================================
// Determinism Tests
// =============================================================================

/// Random partitions of a string hash the same as the whole string.
#[test]
fn test_random_partitions_match_single_chunk() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let len = rng.gen_range(0..80);
        let text = random_text(&mut rng, len);
        let mut cuts: Vec<usize> = (0..rng.gen_range(0..6))
            .map(|_| rng.gen_range(0..=len))
            .collect();
        cuts.sort_unstable();
        assert_eq!(hash_in_chunks(&text, &cuts), hash(&text), "text {:?}", text);
    }
}

/// The same text hashes the same way every time.
#[test]
fn test_hash_is_deterministic() {
    let text = "public static final int MAX_VALUE = 0x7fffffff;";
    let first = hash(text);
    for _ in 0..100 {
        assert_eq!(hash(text), first);
    }
}

// =============================================================================
// Empty Input Tests
// =============================================================================

#[test]
fn test_empty_input_is_zero() {
    assert_eq!(hash(""), 0);
    assert_eq!(StreamHasher::new().compute_hash(), 0);
}

/// No short string collides with the empty input.
#[test]
fn test_non_empty_input_is_never_zero() {
    let mut rng = StdRng::seed_from_u64(7);
    for len in 1..64 {
        let text = random_text(&mut rng, len);
        assert_ne!(hash(&text), 0, "text {:?}", text);
    }
}

// =============================================================================
// Distribution Tests
// =============================================================================

/// Average Hamming distance after one character mutation exceeds 20 bits.
#[test]
fn test_single_character_avalanche() {
    let mut rng = StdRng::seed_from_u64(0xa5a5);
    let text = random_text(&mut rng, 256);
    let original = hash(&text);

    let trials = 1000;
    let mut flipped = 0u64;
    for _ in 0..trials {
        let mut bytes = text.clone().into_bytes();
        let pos = rng.gen_range(0..bytes.len());
        let old = bytes[pos];
        let mut new = old;
        while new == old {
            new = rng.gen_range(b' '..=b'~');
        }
        bytes[pos] = new;
        let mutated = String::from_utf8(bytes).unwrap();
        flipped += (hash(&mutated) ^ original).count_ones() as u64;
    }

    let average = flipped as f64 / trials as f64;
    assert!(average > 20.0, "average hamming distance {}", average);
}

#[test]
fn test_split_halves_recombine() {
    let h = hash("java.lang.String");
    let (high, low) = split_hash(h);
    assert_eq!(((high as u64) << 32) | low as u64, h);
}
