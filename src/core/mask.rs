//! Low-complexity masking for k-mer extraction
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerutils.cpp
//!            (s_MinhashSequences applies SEG-style masking before
//!            k-mer extraction when the index was built with masking on)
//!
//! The prefilter does not need full SEG; low-complexity stretches only
//! have to be kept out of the k-mer set so that repeats do not dominate
//! the MinHash signature. A windowed Shannon-entropy filter over the
//! 20-letter alphabet is enough for that: windows whose residue
//! entropy falls below a cutoff are overwritten with X, and the k-mer
//! extractor skips any window containing X.
//!
//! The masking flag is persisted in the index header; query sequences
//! are masked iff the index was built masked, so both sides hash the
//! same residue stream.

/// Window length for the entropy computation.
pub const MASK_WINDOW: usize = 12;

/// Entropy cutoff in bits. A 12-residue window drawn from a uniform
/// 20-letter alphabet has entropy near log2(12) = 3.58; homopolymer
/// and short-period repeats fall well under 2.2.
pub const MASK_CUTOFF: f64 = 2.2;

/// Masked residue written over low-complexity stretches. The k-mer
/// alphabet maps it to `INVALID_RESIDUE`, so masked windows produce no
/// k-mers.
pub const MASK_RESIDUE: u8 = b'X';

/// A half-open masked interval over the input sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskedInterval {
    pub start: usize,
    pub end: usize,
}

#[inline]
fn residue_class(residue: u8) -> Option<usize> {
    match residue.to_ascii_uppercase() {
        c @ b'A'..=b'Z' if c != b'B' && c != b'J' && c != b'O' && c != b'U' && c != b'X' && c != b'Z' => {
            Some((c - b'A') as usize)
        }
        _ => None,
    }
}

fn window_entropy(counts: &[u32; 26], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Find low-complexity intervals in `residues`. Overlapping windows
/// below the cutoff are merged into maximal intervals.
pub fn find_masked_intervals(residues: &[u8]) -> Vec<MaskedInterval> {
    let mut intervals: Vec<MaskedInterval> = Vec::new();
    if residues.len() < MASK_WINDOW {
        return intervals;
    }

    for start in 0..=(residues.len() - MASK_WINDOW) {
        let window = &residues[start..start + MASK_WINDOW];
        let mut counts = [0u32; 26];
        let mut total = 0usize;
        for &r in window {
            if let Some(class) = residue_class(r) {
                counts[class] += 1;
                total += 1;
            }
        }
        // Windows dominated by already-invalid residues are left alone;
        // the extractor skips them anyway.
        if total * 2 < MASK_WINDOW {
            continue;
        }
        if window_entropy(&counts, total) < MASK_CUTOFF {
            let end = start + MASK_WINDOW;
            match intervals.last_mut() {
                Some(last) if last.end >= start => last.end = end,
                _ => intervals.push(MaskedInterval { start, end }),
            }
        }
    }
    intervals
}

/// Overwrite low-complexity stretches with `MASK_RESIDUE` in place.
/// Returns the number of residues masked.
pub fn mask_low_complexity(residues: &mut [u8]) -> usize {
    let mut masked = 0usize;
    for interval in find_masked_intervals(residues) {
        for r in &mut residues[interval.start..interval.end] {
            *r = MASK_RESIDUE;
        }
        masked += interval.end - interval.start;
    }
    masked
}
