//! K-mer extraction over reduced alphabets
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerutils.cpp
//!
//! Every overlapping window of `k` residues is translated to the
//! reduced alphabet and packed into one u32 positional code:
//!
//! ```text
//! code = sum over i in 0..k of symbol[i] * alphabet_size^i
//! ```
//!
//! Windows containing an untranslatable residue (X, ambiguity codes,
//! stop, gap — including residues overwritten by the low-complexity
//! masker) contribute no k-mer. A sequence shorter than `k` yields an
//! empty set; that is a recoverable condition, not a failure.
//!
//! # Overrepresented k-mer extension
//!
//! Very common (k-1)-mers make low-information k-mers dominate the
//! MinHash signature. The index carries a persisted list of such
//! (k-1)-mer codes; when a window's leading (k-1)-mer is on the list,
//! the extractor emits the window extended by one extra residue (a
//! (k+1)-code) instead of the plain k-mer, provided the extension
//! residue exists and is valid. Builder and query read the same list
//! from the index file, so both sides extend identically.

use rustc_hash::FxHashSet;

use super::alphabet::{KmerAlphabet, INVALID_RESIDUE};

/// Largest `k` such that a (k+1)-residue extended code still fits in
/// u32 for the given alphabet.
pub fn max_kmer_size(alphabet: KmerAlphabet) -> u32 {
    let base = alphabet.size() as u64;
    let mut k = 0u32;
    let mut span = base; // code space of (k+1) symbols
    while span * base <= u32::MAX as u64 + 1 {
        span *= base;
        k += 1;
    }
    k
}

/// Pack `k` consecutive reduced symbols starting at `pos` into a code.
/// Returns `None` if any symbol in the window is invalid.
#[inline]
fn pack_window(symbols: &[u8], pos: usize, k: usize, base: u32) -> Option<u32> {
    let mut code = 0u32;
    let mut scale = 1u32;
    for &s in &symbols[pos..pos + k] {
        if s == INVALID_RESIDUE {
            return None;
        }
        code = code.wrapping_add(s as u32 * scale);
        scale = scale.wrapping_mul(base);
    }
    Some(code)
}

/// Extract the k-mer code set of `residues` (ASCII amino acids).
///
/// `overrep` is the index's persisted overrepresented-(k-1)-mer list;
/// pass `None` when the index carries none.
pub fn extract_kmers(
    residues: &[u8],
    k: usize,
    alphabet: KmerAlphabet,
    overrep: Option<&FxHashSet<u32>>,
) -> FxHashSet<u32> {
    let mut kmers = FxHashSet::default();
    if k == 0 || residues.len() < k {
        return kmers;
    }

    let base = alphabet.size();
    let symbols: Vec<u8> = residues.iter().map(|&r| alphabet.translate(r)).collect();

    for pos in 0..=(symbols.len() - k) {
        let Some(code) = pack_window(&symbols, pos, k, base) else {
            continue;
        };
        if let Some(list) = overrep {
            if k > 1 {
                // Leading (k-1)-mer: drop the highest-order symbol.
                let prefix = code % base.pow((k - 1) as u32);
                if list.contains(&prefix) {
                    if let Some(extended) = pack_window(&symbols, pos, k + 1, base) {
                        kmers.insert(extended);
                        continue;
                    }
                    // No valid extension residue: fall through to the
                    // plain k-mer rather than losing the window.
                }
            }
        }
        kmers.insert(code);
    }
    kmers
}
