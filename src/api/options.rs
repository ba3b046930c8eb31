//! Search options and up-front validation
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmeroptions.cpp
//!            (CBlastKmerOptions::Validate)
//!
//! Configuration errors are raised at validation time, before any
//! query runs; they are fatal to the call, not to the process.

use anyhow::{bail, Result};

/// Options consumed by one batch search. Index parameters (k,
/// alphabet, hash counts) are not here — they live in the index
/// header and cannot be overridden per query.
#[derive(Debug, Clone)]
pub struct KmerOptions {
    /// Minimum estimated Jaccard similarity for a reported hit, in
    /// (0, 1].
    pub threshold: f64,
    /// Independent bucket agreements required before a candidate is
    /// scored; 0 selects the index's alphabet-appropriate default.
    pub min_hits: u32,
    /// Cap on reported hits per query; 0 means unbounded.
    pub max_target_seqs: usize,
}

impl Default for KmerOptions {
    fn default() -> Self {
        KmerOptions { threshold: 0.1, min_hits: 0, max_target_seqs: 500 }
    }
}

impl KmerOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            bail!("similarity threshold {} outside (0, 1]", self.threshold);
        }
        // min_hits and max_target_seqs are unsigned; 0 carries the
        // documented "auto"/"unbounded" meaning, so nothing else can
        // be invalid here.
        Ok(())
    }
}
