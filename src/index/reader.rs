//! Memory-mapped index reader
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/mhfile.cpp
//!            (CMinHashFile maps both files and hands out typed views)
//!
//! Both files of the index pair are mapped read-only at open time and
//! shared by every concurrent search; all accessors are pure reads
//! over the mapping, so no locking exists anywhere in the search path.
//! The aux tables (seeds, sample table, overrepresented k-mers) are
//! small and read once into owned vectors at open.
//!
//! Open fails fast with a typed error when either file is missing,
//! zero-length, or the header disagrees with the mapped sizes; a
//! reader must never silently mis-interpret bytes (a missing and a
//! zero-length file are deliberately equally fatal — callers that want
//! to skip volumes without a k-mer index can match on
//! `IndexOpenError::Missing`).

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::core::alphabet::KmerAlphabet;
use crate::core::banding::{SampleTable, KMER_LSH_SIZE};
use crate::core::minhash::SignatureScheme;
use crate::index::format::{
    HeaderError, IndexHeader, BUCKET_TABLE_BYTES, DATA_EXT, HEADER_BYTES, INDEX_EXT,
};

#[derive(Debug, Error)]
pub enum IndexOpenError {
    #[error("index file not found: {0}")]
    Missing(PathBuf),
    #[error("index file is empty: {0}")]
    Empty(PathBuf),
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad index header in {path}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },
    #[error("{path}: {what} ({expected} bytes expected, {actual} mapped)")]
    SizeMismatch {
        path: PathBuf,
        what: &'static str,
        expected: u64,
        actual: u64,
    },
}

fn map_whole(path: &Path) -> Result<Mmap, IndexOpenError> {
    if !path.exists() {
        return Err(IndexOpenError::Missing(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| IndexOpenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let len = file
        .metadata()
        .map_err(|source| IndexOpenError::Io { path: path.to_path_buf(), source })?
        .len();
    if len == 0 {
        return Err(IndexOpenError::Empty(path.to_path_buf()));
    }
    // Safety: the file pair is immutable for the lifetime of a search
    // session; rebuilding while readers hold the mapping is
    // unsupported.
    let mmap = unsafe {
        MmapOptions::new().map(&file).map_err(|source| IndexOpenError::Io {
            path: path.to_path_buf(),
            source,
        })?
    };
    Ok(mmap)
}

#[inline]
fn read_u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let slice = bytes.get(offset..end)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// A read-only view of one index file pair.
#[derive(Debug)]
pub struct MinHashIndex {
    header: IndexHeader,
    index: Mmap,
    data: Mmap,
    seeds: Option<(Vec<u32>, Vec<u32>)>,
    sample_table: Option<SampleTable>,
    overrep: FxHashSet<u32>,
}

impl MinHashIndex {
    /// Map `basename.pki` / `basename.pkd` and validate the header
    /// against both mappings.
    pub fn open(basename: &Path) -> Result<Self, IndexOpenError> {
        let index_path = basename.with_extension(INDEX_EXT);
        let data_path = basename.with_extension(DATA_EXT);

        let index = map_whole(&index_path)?;
        let data = map_whole(&data_path)?;

        let header = IndexHeader::decode(&index).map_err(|source| IndexOpenError::Header {
            path: index_path.clone(),
            source,
        })?;

        if header.lsh_offset != HEADER_BYTES as u64
            || header.lsh_bytes != BUCKET_TABLE_BYTES as u64
        {
            return Err(IndexOpenError::SizeMismatch {
                path: index_path.clone(),
                what: "bucket table offset/size disagree with the format",
                expected: (HEADER_BYTES + BUCKET_TABLE_BYTES) as u64,
                actual: header.lsh_offset + header.lsh_bytes,
            });
        }
        let aux_end = header.aux_offset + header.aux_bytes() as u64;
        if (index.len() as u64) < aux_end {
            return Err(IndexOpenError::SizeMismatch {
                path: index_path.clone(),
                what: "index file shorter than header-declared tables",
                expected: aux_end,
                actual: index.len() as u64,
            });
        }
        let data_expected = header.num_sequences as u64 * header.record_bytes() as u64;
        if data.len() as u64 != data_expected {
            return Err(IndexOpenError::SizeMismatch {
                path: data_path,
                what: "data file size disagrees with header",
                expected: data_expected,
                actual: data.len() as u64,
            });
        }

        let mut cursor = header.aux_offset as usize;
        let mut take_u32s = |n: usize| -> Vec<u32> {
            let mut out = Vec::with_capacity(n);
            for _ in 0..n {
                // aux_end bound checked above
                out.push(read_u32_at(&index, cursor).unwrap_or(0));
                cursor += 4;
            }
            out
        };

        let seeds = if header.uses_seeds() {
            let a = take_u32s(header.num_hashes as usize);
            let b = take_u32s(header.num_hashes as usize);
            Some((a, b))
        } else {
            None
        };
        let sample_table = if header.uses_sampling() {
            let positions = take_u32s(header.sample_l as usize * header.sample_k as usize);
            Some(SampleTable::from_positions(
                header.sample_k as usize,
                header.sample_l as usize,
                positions,
            ))
        } else {
            None
        };
        let overrep: FxHashSet<u32> =
            take_u32s(header.num_overrep_kmers as usize).into_iter().collect();

        Ok(MinHashIndex { header, index, data, seeds, sample_table, overrep })
    }

    #[inline]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// The signature scheme this index was built with, reconstructed
    /// from the header version and the persisted seeds.
    pub fn scheme(&self) -> SignatureScheme {
        match &self.seeds {
            Some((a, b)) => SignatureScheme::Seeded { a: a.clone(), b: b.clone() },
            None => SignatureScheme::BottomK,
        }
    }

    pub fn seeds(&self) -> Option<(&[u32], &[u32])> {
        self.seeds.as_ref().map(|(a, b)| (a.as_slice(), b.as_slice()))
    }

    pub fn sample_table(&self) -> Option<&SampleTable> {
        self.sample_table.as_ref()
    }

    pub fn overrep_kmers(&self) -> &FxHashSet<u32> {
        &self.overrep
    }

    /// Bucket-table entry: byte offset of the bucket's chain, or
    /// `None` when the bucket is empty or out of range.
    pub fn bucket(&self, bucket_id: u32) -> Option<u64> {
        if bucket_id as usize >= KMER_LSH_SIZE {
            return None;
        }
        let offset = HEADER_BYTES + bucket_id as usize * 8;
        let slice = self.index.get(offset..offset + 8)?;
        let entry = u64::from_le_bytes([
            slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
        ]);
        if entry == 0 {
            None
        } else {
            Some(entry)
        }
    }

    /// Read one bucket's chain: the OIDs of every sequence that hashed
    /// into the bucket. A chain offset outside the mapping yields an
    /// empty chain.
    pub fn chain_oids(&self, chain_offset: u64) -> Vec<u32> {
        let base = chain_offset as usize;
        let Some(count) = read_u32_at(&self.index, base) else {
            return Vec::new();
        };
        let mut oids = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            match read_u32_at(&self.index, base + 4 + i * 4) {
                Some(oid) => oids.push(oid),
                None => break,
            }
        }
        oids
    }

    /// All OIDs in one bucket (empty when the bucket is unoccupied).
    pub fn bucket_oids(&self, bucket_id: u32) -> Vec<u32> {
        match self.bucket(bucket_id) {
            Some(offset) => self.chain_oids(offset),
            None => Vec::new(),
        }
    }

    /// The stored `(oid, signature)` record for one sequence. Values
    /// come back width-reduced, exactly as stored. `None` when `oid`
    /// is out of range.
    pub fn signature_record(&self, oid: u32) -> Option<(u32, Vec<u32>)> {
        if oid >= self.header.num_sequences {
            return None;
        }
        let width = self.header.width;
        let record = self.header.record_bytes();
        let base = record * oid as usize;
        let bytes = self.data.get(base..base + record)?;
        let stored_oid = width.decode(bytes, 0);
        let mut signature = Vec::with_capacity(self.header.num_hashes as usize);
        for i in 0..self.header.num_hashes as usize {
            signature.push(width.decode(bytes, (i + 1) * width.bytes()));
        }
        Some((stored_oid, signature))
    }

    /// Default number of independent bucket agreements required before
    /// a candidate is scored, when the caller does not override it.
    /// The 10-letter alphabet collides more, so it demands a second
    /// agreement.
    pub fn default_min_hits(&self) -> u32 {
        match self.header.alphabet {
            KmerAlphabet::Reduced15 => 1,
            KmerAlphabet::Reduced10 => 2,
        }
    }
}
