//! LSH candidate generation: banding and Buhler sampling
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerutils.cpp
//!
//! Two strategies turn a signature into bucket ids:
//!
//! - **Banding**: the `H` signature values are split into `H /
//!   rows_per_band` disjoint bands of `rows_per_band` consecutive
//!   values; each band hashes to one bucket. Two signatures share a
//!   bucket iff some band is identical between them — the standard
//!   LSH trade-off (wider bands: fewer false positives, more false
//!   negatives).
//! - **Buhler sampling**: `sample_l` random subsets of `sample_k`
//!   positions out of `H`, drawn once at build time and persisted in
//!   the index file; each subset's values hash to one bucket
//!   (Buhler 2001, locality-sensitive hashing for gapped seeds).
//!
//! Band and sample counts are format parameters fixed at build time;
//! a query hashed with different parameters cannot probe the index.

use rand::Rng;

use super::minhash::fnv1a;

/// Number of entries in the bucket table: 2^24 + 1. Format-constant
/// across all versions; band/sample hashes are reduced modulo this.
pub const KMER_LSH_SIZE: usize = 0x0100_0001;

/// Hash a run of signature values to a bucket id.
#[inline]
fn bucket_hash(values: &[u32]) -> u32 {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    (fnv1a(&bytes) as usize % KMER_LSH_SIZE) as u32
}

/// Band `signature` into `signature.len() / rows_per_band` buckets.
///
/// `signature.len()` must be a multiple of `rows_per_band`; the
/// builder validates that before any signature exists.
pub fn band_hashes(signature: &[u32], rows_per_band: usize) -> Vec<u32> {
    debug_assert!(rows_per_band > 0);
    debug_assert_eq!(signature.len() % rows_per_band, 0);
    signature.chunks_exact(rows_per_band).map(bucket_hash).collect()
}

/// Persisted Buhler sample table: `l` subsets of `k` positions each,
/// stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTable {
    pub sample_k: usize,
    pub sample_l: usize,
    /// `sample_l * sample_k` position indices into the signature.
    pub positions: Vec<u32>,
}

impl SampleTable {
    pub fn from_positions(sample_k: usize, sample_l: usize, positions: Vec<u32>) -> Self {
        debug_assert_eq!(positions.len(), sample_k * sample_l);
        SampleTable { sample_k, sample_l, positions }
    }

    fn row(&self, i: usize) -> &[u32] {
        &self.positions[i * self.sample_k..(i + 1) * self.sample_k]
    }
}

/// Draw the persisted sample table: `sample_l` subsets of `sample_k`
/// distinct positions out of `num_hashes`. Called once at build time,
/// like the minhash seeds.
pub fn generate_sample_table<R: Rng>(
    rng: &mut R,
    num_hashes: usize,
    sample_k: usize,
    sample_l: usize,
) -> SampleTable {
    debug_assert!(sample_k <= num_hashes);
    let mut positions = Vec::with_capacity(sample_k * sample_l);
    let mut scratch: Vec<u32> = (0..num_hashes as u32).collect();
    for _ in 0..sample_l {
        // Partial Fisher-Yates: the first sample_k entries become one
        // subset.
        for i in 0..sample_k {
            let j = rng.gen_range(i..num_hashes);
            scratch.swap(i, j);
        }
        positions.extend_from_slice(&scratch[..sample_k]);
    }
    SampleTable::from_positions(sample_k, sample_l, positions)
}

/// Hash the signature at each persisted subset's positions: one bucket
/// id per subset.
pub fn sample_hashes(signature: &[u32], table: &SampleTable) -> Vec<u32> {
    let mut out = Vec::with_capacity(table.sample_l);
    let mut values = vec![0u32; table.sample_k];
    for i in 0..table.sample_l {
        for (slot, &pos) in values.iter_mut().zip(table.row(i)) {
            *slot = signature[pos as usize];
        }
        out.push(bucket_hash(&values));
    }
    out
}
