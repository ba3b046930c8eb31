//! Core k-mer MinHash/LSH algorithms
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/
//!
//! Everything in this module is pure computation shared by the index
//! builder and the query engine: alphabet reduction, k-mer extraction,
//! low-complexity masking, signature construction, and LSH candidate
//! generation. The on-disk format and the search pipeline live in
//! `crate::index` and `crate::engine`.

pub mod alphabet;
pub mod banding;
pub mod diagnostics;
pub mod kmer;
pub mod mask;
pub mod minhash;
