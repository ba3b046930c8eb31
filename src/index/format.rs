//! On-disk layout of the k-mer index file pair
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/mhfile.hpp
//!            ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerindex.cpp
//!
//! An index is two files sharing a basename:
//!
//! - `basename.pki` (index file):
//!   header | bucket table | aux tables | bucket chains
//!   - header: fixed 80 bytes, little endian (fields below)
//!   - bucket table: `KMER_LSH_SIZE` u64 entries; a nonzero entry is
//!     the byte offset, within this file, of that bucket's chain
//!   - aux tables at `aux_offset`: for versions 0-2 the persisted
//!     minhash seeds `a[H] b[H]` (u32 each); when `sample_l > 0` the
//!     Buhler sample table (`sample_l * sample_k` u32); then
//!     `num_overrep_kmers` u32 overrepresented-(k-1)-mer codes
//!   - chains: per occupied bucket, `[count: u32][oid: u32; count]`
//! - `basename.pkd` (data file): one fixed-width record per OID in OID
//!   order: `(H+1)` values at `data_width` bytes each — the stored OID
//!   (truncated to the width) followed by the H signature values
//!   reduced modulo `2^(8*width)`. Record offset is
//!   `width * (H+1) * oid`, giving O(1) random access.
//!
//! Everything here is layout: sizes, offsets, header encode/decode,
//! and the storage-width arithmetic. File I/O lives in the builder and
//! reader.

use thiserror::Error;

use crate::core::alphabet::KmerAlphabet;
use crate::core::banding::KMER_LSH_SIZE;

/// Index file extension (header, bucket table, aux tables, chains).
pub const INDEX_EXT: &str = "pki";
/// Data file extension (fixed-width signature records).
pub const DATA_EXT: &str = "pkd";

/// Size of the fixed header at the start of the index file.
pub const HEADER_BYTES: usize = 80;

/// Size of the bucket table: one u64 per bucket.
pub const BUCKET_TABLE_BYTES: usize = KMER_LSH_SIZE * 8;

/// Newest format version this crate reads and writes.
pub const CURRENT_VERSION: u32 = 3;

/// First version carrying a Buhler sample table.
pub const MIN_SAMPLING_VERSION: u32 = 2;

/// First version using the bottom-k sketch instead of the seeded
/// family.
pub const MIN_BOTTOMK_VERSION: u32 = 3;

/// Default query chunk length in residues.
pub const DEFAULT_CHUNK_SIZE: u32 = 150;

/// Overlap between consecutive query chunks.
pub const CHUNK_OVERLAP: usize = 30;

/// Per-value storage width of the data file.
///
/// The width is chosen at build time (`compression`); signature values
/// are reduced modulo `2^(8*width)` before they are stored *and*
/// before band hashes are computed, so build and search band the same
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    One,
    Two,
    Four,
}

impl Width {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Width::One),
            2 => Some(Width::Two),
            4 => Some(Width::Four),
            _ => None,
        }
    }

    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
        }
    }

    /// Bit mask of the stored range.
    #[inline]
    pub fn mask(self) -> u32 {
        match self {
            Width::One => 0xFF,
            Width::Two => 0xFFFF,
            Width::Four => u32::MAX,
        }
    }

    /// Reduce a hash value to the stored range.
    #[inline]
    pub fn compress(self, value: u32) -> u32 {
        value & self.mask()
    }

    /// Decode one stored value at `offset` within `bytes`. The caller
    /// guarantees `offset + width` is in range.
    #[inline]
    pub fn decode(self, bytes: &[u8], offset: usize) -> u32 {
        match self {
            Width::One => bytes[offset] as u32,
            Width::Two => u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as u32,
            Width::Four => u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]),
        }
    }

    /// Append one value at this width.
    #[inline]
    pub fn encode_into(self, value: u32, out: &mut Vec<u8>) {
        match self {
            Width::One => out.push(value as u8),
            Width::Two => out.extend_from_slice(&(value as u16).to_le_bytes()),
            Width::Four => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Header decode failures, wrapped into `IndexOpenError` by the reader.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("index header truncated: {0} bytes, need {HEADER_BYTES}")]
    Truncated(usize),
    #[error("unsupported index format version {0} (newest supported: {CURRENT_VERSION})")]
    UnsupportedVersion(u32),
    #[error("unknown alphabet code {0}")]
    UnknownAlphabet(u32),
    #[error("unsupported storage width {0}")]
    UnsupportedWidth(u32),
    #[error("num_hashes is zero")]
    ZeroHashes,
    #[error("rows_per_band {rows} does not divide num_hashes {hashes}")]
    BandMismatch { rows: u32, hashes: u32 },
    #[error("header selects neither banding nor sampling")]
    NoCandidateScheme,
    #[error("sample table present but version {0} predates sampling support")]
    SamplingUnsupported(u32),
    #[error("chunk size {0} does not exceed the chunk overlap {CHUNK_OVERLAP}")]
    ChunkSizeTooSmall(u32),
    #[error("aux tables at byte {actual} but bucket table ends at byte {expected}")]
    MisalignedAux { expected: u64, actual: u64 },
}

/// The fixed 80-byte index header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub num_sequences: u32,
    pub num_hashes: u32,
    pub do_mask: bool,
    pub kmer_size: u32,
    pub alphabet: KmerAlphabet,
    pub width: Width,
    /// Rows per LSH band; 0 when Buhler sampling is in use.
    pub rows_per_band: u32,
    /// Buhler subset size; 0 when banding is in use.
    pub sample_k: u32,
    /// Buhler subset count; 0 when banding is in use.
    pub sample_l: u32,
    pub chunk_size: u32,
    pub num_overrep_kmers: u32,
    /// Byte offset of the bucket table within the index file.
    pub lsh_offset: u64,
    /// Byte size of the bucket table.
    pub lsh_bytes: u64,
    /// Byte offset of the aux tables (seeds / sample table / overrep
    /// list) within the index file.
    pub aux_offset: u64,
}

impl IndexHeader {
    /// True when candidate generation uses Buhler sampling rather than
    /// banding.
    #[inline]
    pub fn uses_sampling(&self) -> bool {
        self.sample_l > 0
    }

    /// True when signatures are seeded-family minhash (versions 0-2).
    #[inline]
    pub fn uses_seeds(&self) -> bool {
        self.version < MIN_BOTTOMK_VERSION
    }

    /// Number of bucket ids per signature.
    #[inline]
    pub fn hashes_per_signature(&self) -> usize {
        if self.uses_sampling() {
            self.sample_l as usize
        } else {
            (self.num_hashes / self.rows_per_band) as usize
        }
    }

    /// Byte length of one data-file record.
    #[inline]
    pub fn record_bytes(&self) -> usize {
        self.width.bytes() * (self.num_hashes as usize + 1)
    }

    /// Byte size of the aux tables following `aux_offset`.
    pub fn aux_bytes(&self) -> usize {
        let mut bytes = 0usize;
        if self.uses_seeds() {
            bytes += 2 * self.num_hashes as usize * 4;
        }
        if self.uses_sampling() {
            bytes += self.sample_l as usize * self.sample_k as usize * 4;
        }
        bytes += self.num_overrep_kmers as usize * 4;
        bytes
    }

    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        let words = [
            self.version,
            self.num_sequences,
            self.num_hashes,
            self.do_mask as u32,
            self.kmer_size,
            self.alphabet.as_u32(),
            self.width.bytes() as u32,
            self.rows_per_band,
            self.sample_k,
            self.sample_l,
            self.chunk_size,
            self.num_overrep_kmers,
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&w.to_le_bytes());
        }
        out[48..56].copy_from_slice(&self.lsh_offset.to_le_bytes());
        out[56..64].copy_from_slice(&self.lsh_bytes.to_le_bytes());
        out[64..72].copy_from_slice(&self.aux_offset.to_le_bytes());
        // bytes 72..80 reserved
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_BYTES {
            return Err(HeaderError::Truncated(bytes.len()));
        }
        let word = |i: usize| {
            u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        let long = |o: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[o..o + 8]);
            u64::from_le_bytes(b)
        };

        let version = word(0);
        if version > CURRENT_VERSION {
            return Err(HeaderError::UnsupportedVersion(version));
        }
        let num_hashes = word(2);
        if num_hashes == 0 {
            return Err(HeaderError::ZeroHashes);
        }
        let alphabet = KmerAlphabet::from_u32(word(5))
            .ok_or_else(|| HeaderError::UnknownAlphabet(word(5)))?;
        let width =
            Width::from_u32(word(6)).ok_or_else(|| HeaderError::UnsupportedWidth(word(6)))?;

        let rows_per_band = word(7);
        let sample_k = word(8);
        let sample_l = word(9);
        if rows_per_band == 0 && sample_l == 0 {
            return Err(HeaderError::NoCandidateScheme);
        }
        if rows_per_band > 0 && num_hashes % rows_per_band != 0 {
            return Err(HeaderError::BandMismatch { rows: rows_per_band, hashes: num_hashes });
        }
        if sample_l > 0 && version < MIN_SAMPLING_VERSION {
            return Err(HeaderError::SamplingUnsupported(version));
        }
        // The query engine steps by chunk_size - overlap; a chunk size
        // at or under the overlap can never have been written by a
        // valid builder.
        let chunk_size = word(10);
        if chunk_size as usize <= CHUNK_OVERLAP {
            return Err(HeaderError::ChunkSizeTooSmall(chunk_size));
        }
        let lsh_offset = long(48);
        let lsh_bytes = long(56);
        let aux_offset = long(64);
        if aux_offset != lsh_offset + lsh_bytes {
            return Err(HeaderError::MisalignedAux {
                expected: lsh_offset + lsh_bytes,
                actual: aux_offset,
            });
        }

        Ok(IndexHeader {
            version,
            num_sequences: word(1),
            num_hashes,
            do_mask: word(3) != 0,
            kmer_size: word(4),
            alphabet,
            width,
            rows_per_band,
            sample_k,
            sample_l,
            chunk_size,
            num_overrep_kmers: word(11),
            lsh_offset,
            lsh_bytes,
            aux_offset,
        })
    }
}
