//! MinHash signature construction
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerutils.cpp
//!            (minhash routines and the version >= 3 Broder-style sketch)
//!
//! Two interchangeable schemes share one contract, discriminated solely
//! by the index-format version:
//!
//! - Versions 0-2: a family of `num_hashes` universal hash functions
//!   `h_i(x) = (a_i * x + b_i) mod PRIME`; signature position `i` is the
//!   minimum of `h_i` over the k-mer set. The `a`/`b` seeds are drawn
//!   once at build time and persisted in the index file so queries
//!   replay the exact same family.
//! - Version >= 3: one FNV-1a hash over every k-mer code; the signature
//!   is the sorted `num_hashes` smallest distinct values (bottom-k).
//!   No per-index seeds exist, and large k-mer sets hash once instead
//!   of `num_hashes` times.
//!
//! The signature is always exactly `num_hashes` long, and every value
//! is reduced to the index's storage width up front (for bottom-k this
//! happens before selection, keeping the sketch sorted in stored value
//! space). An empty k-mer set produces the sentinel fill (zero for the
//! seeded family, width-reduced `u32::MAX` padding for bottom-k); such
//! sequences never enter the bucket table, so the sentinel is never
//! compared against real data.

use rand::Rng;

/// Fixed modulus of the seeded hash family: 2^20 + 7, prime.
pub const MINHASH_PRIME: u64 = 1_048_583;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over a byte slice.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a of one k-mer code (little-endian bytes).
#[inline]
pub fn hash_kmer(code: u32) -> u32 {
    fnv1a(&code.to_le_bytes())
}

/// One application of the seeded family.
#[inline]
fn uhash(a: u32, b: u32, x: u32) -> u32 {
    ((a as u64 * x as u64 + b as u64) % MINHASH_PRIME) as u32
}

/// Signature scheme selected by the header version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureScheme {
    /// Versions 0-2: persisted `a`/`b` seed vectors, one per hash
    /// function.
    Seeded { a: Vec<u32>, b: Vec<u32> },
    /// Version >= 3: hash-function-free bottom-k sketch.
    BottomK,
}

/// Draw the persisted seed family for a version 0-2 index.
///
/// `a` is odd and nonzero (an odd multiplier is invertible mod 2^w and
/// never collapses the family), `b` nonzero; both below the modulus.
/// Called exactly once at build time; searches must read the persisted
/// seeds back rather than regenerate them.
pub fn generate_seeds<R: Rng>(rng: &mut R, num_hashes: usize) -> (Vec<u32>, Vec<u32>) {
    let mut a = Vec::with_capacity(num_hashes);
    let mut b = Vec::with_capacity(num_hashes);
    for _ in 0..num_hashes {
        let mut m = rng.gen_range(1..MINHASH_PRIME as u32);
        if m % 2 == 0 {
            m -= 1;
        }
        a.push(m);
        b.push(rng.gen_range(1..MINHASH_PRIME as u32));
    }
    (a, b)
}

/// Build the `num_hashes`-length signature of a k-mer set, with every
/// value reduced by `mask` to the index's storage width.
///
/// The reduction happens *before* bottom-k selection, so a sorted
/// sketch stays sorted in the stored value space and its padding is
/// `u32::MAX & mask`. The k-mer set is consumed in arbitrary order;
/// both schemes are order-independent.
pub fn build_signature(
    kmers: &rustc_hash::FxHashSet<u32>,
    num_hashes: usize,
    scheme: &SignatureScheme,
    mask: u32,
) -> Vec<u32> {
    match scheme {
        SignatureScheme::Seeded { a, b } => {
            debug_assert_eq!(a.len(), num_hashes);
            let mut signature = vec![0u32; num_hashes];
            if kmers.is_empty() {
                return signature;
            }
            for (i, slot) in signature.iter_mut().enumerate() {
                let mut min = u32::MAX;
                for &kmer in kmers {
                    let h = uhash(a[i], b[i], kmer);
                    if h < min {
                        min = h;
                    }
                }
                *slot = min & mask;
            }
            signature
        }
        SignatureScheme::BottomK => {
            let mut hashes: Vec<u32> = kmers.iter().map(|&k| hash_kmer(k) & mask).collect();
            hashes.sort_unstable();
            hashes.dedup();
            hashes.truncate(num_hashes);
            hashes.resize(num_hashes, u32::MAX & mask);
            hashes
        }
    }
}

/// MinHash agreement-rate estimator of Jaccard similarity for the
/// seeded family: the fraction of signature positions at which the
/// two vectors agree.
pub fn estimate_similarity(x: &[u32], y: &[u32]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    if x.is_empty() {
        return 0.0;
    }
    let agree = x.iter().zip(y).filter(|(a, b)| a == b).count();
    agree as f64 / x.len() as f64
}

/// Jaccard estimator for sorted bottom-k sketches: the size of the
/// sorted-merge intersection over the sketch length. Positional
/// agreement would be wrong here — one extra small hash value shifts
/// every later position — so the sketches are compared as sorted
/// sets. `pad` is the width-reduced `u32::MAX` fill of short sketches
/// and never counts as shared.
pub fn sketch_similarity(x: &[u32], y: &[u32], pad: u32) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    if x.is_empty() {
        return 0.0;
    }
    let mut i = 0;
    let mut j = 0;
    let mut shared = 0usize;
    while i < x.len() && j < y.len() && x[i] != pad && y[j] != pad {
        match x[i].cmp(&y[j]) {
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    shared as f64 / x.len() as f64
}
