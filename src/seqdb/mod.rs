//! Sequence database collaborator
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmer.cpp
//!            (the engine consumes CSeqDB only through ordinal-id
//!            residue access and an optional GI/OID allow list)
//!
//! The k-mer engine never parses a database format of its own; it sees
//! an ordered, immutable collection of protein sequences addressed by
//! ordinal id (OID). `FastaDatabase` is the bundled implementation,
//! loading one FASTA volume into memory with `bio::io::fasta` the same
//! way the alignment engines load their subjects.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bio::io::fasta;
use rustc_hash::{FxHashMap, FxHashSet};

/// Random access to one database volume by OID. Implementations must
/// be immutable for the lifetime of a search.
pub trait SequenceDatabase: Sync {
    fn num_sequences(&self) -> u32;
    /// Raw ASCII residues of one sequence. Panics on an out-of-range
    /// OID; OIDs are dense by construction.
    fn residues(&self, oid: u32) -> &[u8];
    /// External identifier owned by the database.
    fn seq_id(&self, oid: u32) -> &str;
}

/// In-memory FASTA-backed volume.
pub struct FastaDatabase {
    ids: Vec<String>,
    seqs: Vec<Vec<u8>>,
    by_id: FxHashMap<String, u32>,
}

impl FastaDatabase {
    /// Load a FASTA volume. A missing or unreadable file is a
    /// batch-level error: no query against this database can succeed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = fasta::Reader::from_file(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        let mut ids = Vec::new();
        let mut seqs = Vec::new();
        let mut by_id = FxHashMap::default();
        for record in reader.records() {
            let record = record
                .with_context(|| format!("bad FASTA record in {}", path.display()))?;
            let id = record
                .id()
                .split_whitespace()
                .next()
                .unwrap_or("unknown")
                .to_string();
            by_id.insert(id.clone(), ids.len() as u32);
            ids.push(id);
            seqs.push(record.seq().to_vec());
        }
        if seqs.is_empty() {
            return Err(anyhow!("database {} contains no sequences", path.display()));
        }
        Ok(FastaDatabase { ids, seqs, by_id })
    }

    /// Reverse lookup used by id-list filtering.
    pub fn oid_of(&self, id: &str) -> Option<u32> {
        self.by_id.get(id).copied()
    }
}

impl SequenceDatabase for FastaDatabase {
    fn num_sequences(&self) -> u32 {
        self.seqs.len() as u32
    }

    fn residues(&self, oid: u32) -> &[u8] {
        &self.seqs[oid as usize]
    }

    fn seq_id(&self, oid: u32) -> &str {
        &self.ids[oid as usize]
    }
}

/// OID allow/deny list applied when a ranked result is finalized.
/// Exactly one polarity is active at a time; the `Option<OidFilter>`
/// at the call site encodes "no filtering".
#[derive(Debug, Clone)]
pub enum OidFilter {
    /// Keep only these OIDs.
    Positive(FxHashSet<u32>),
    /// Drop these OIDs.
    Negative(FxHashSet<u32>),
}

impl OidFilter {
    #[inline]
    pub fn allows(&self, oid: u32) -> bool {
        match self {
            OidFilter::Positive(set) => set.contains(&oid),
            OidFilter::Negative(set) => !set.contains(&oid),
        }
    }
}
