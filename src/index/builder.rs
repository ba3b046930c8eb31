//! Index construction
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerindex.cpp
//!            (CBlastKmerBuildIndex)
//!
//! For every sequence of the database volume the builder extracts
//! k-mers, computes the MinHash signature, and derives the LSH bucket
//! ids. The work is partitioned over contiguous OID blocks across the
//! rayon pool; each worker fills private buffers, and a single
//! finalization pass merges them in OID order before anything touches
//! a file. No worker ever writes another worker's OID range, so the
//! build needs no shared mutable state.
//!
//! Output is one file pair per volume (`.pki` + `.pkd`, layout in
//! `crate::index::format`); volumes are never merged.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::alphabet::KmerAlphabet;
use crate::core::banding::{
    band_hashes, generate_sample_table, sample_hashes, SampleTable, KMER_LSH_SIZE,
};
use crate::core::kmer::{extract_kmers, max_kmer_size};
use crate::core::mask::mask_low_complexity;
use crate::core::minhash::{build_signature, generate_seeds, SignatureScheme};
use crate::index::format::{
    IndexHeader, Width, BUCKET_TABLE_BYTES, CHUNK_OVERLAP, CURRENT_VERSION, DATA_EXT,
    DEFAULT_CHUNK_SIZE, HEADER_BYTES, INDEX_EXT, MIN_SAMPLING_VERSION,
};
use crate::seqdb::SequenceDatabase;

/// OIDs per parallel work unit. Blocks are contiguous and processed in
/// order-preserving fashion, so the merged output is OID-sorted by
/// construction.
const OID_BLOCK: usize = 1024;

/// Build-time parameters. Everything here except `rng_seed` and
/// `verbose` ends up in the index header.
#[derive(Debug, Clone)]
pub struct BuildParams {
    pub version: u32,
    pub kmer_size: u32,
    pub num_hashes: u32,
    /// Rows per LSH band; set to 0 to use Buhler sampling instead.
    pub rows_per_band: u32,
    pub sample_k: u32,
    pub sample_l: u32,
    pub width: Width,
    pub alphabet: KmerAlphabet,
    pub chunk_size: u32,
    pub do_mask: bool,
    /// Overrepresented (k-1)-mer codes persisted into the index.
    pub overrep_kmers: Vec<u32>,
    /// Seed for the build-time RNG (minhash seeds, sample table). The
    /// drawn values are persisted, never regenerated at query time.
    pub rng_seed: u64,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            version: CURRENT_VERSION,
            kmer_size: 5,
            num_hashes: 128,
            rows_per_band: 2,
            sample_k: 0,
            sample_l: 0,
            width: Width::Two,
            alphabet: KmerAlphabet::Reduced15,
            chunk_size: DEFAULT_CHUNK_SIZE,
            do_mask: true,
            overrep_kmers: Vec::new(),
            rng_seed: 0xB10C_5EED,
        }
    }
}

impl BuildParams {
    /// Configuration errors are fatal before any sequence is touched.
    pub fn validate(&self) -> Result<()> {
        if self.version > CURRENT_VERSION {
            bail!("cannot build index version {} (newest: {CURRENT_VERSION})", self.version);
        }
        if self.num_hashes == 0 {
            bail!("num_hashes must be positive");
        }
        let max_k = max_kmer_size(self.alphabet);
        if self.kmer_size == 0 || self.kmer_size > max_k {
            bail!(
                "kmer_size {} out of range 1..={max_k} for the {}-letter alphabet",
                self.kmer_size,
                self.alphabet.size()
            );
        }
        let banding = self.rows_per_band > 0;
        let sampling = self.sample_l > 0;
        if banding == sampling {
            bail!("exactly one of banding (rows_per_band) and sampling (sample_l) must be set");
        }
        if banding && self.num_hashes % self.rows_per_band != 0 {
            bail!(
                "rows_per_band {} does not divide num_hashes {}",
                self.rows_per_band,
                self.num_hashes
            );
        }
        if sampling {
            if self.version < MIN_SAMPLING_VERSION {
                bail!("Buhler sampling requires index version >= {MIN_SAMPLING_VERSION}");
            }
            if self.sample_k == 0 || self.sample_k > self.num_hashes {
                bail!("sample_k {} out of range 1..={}", self.sample_k, self.num_hashes);
            }
        }
        if self.chunk_size as usize <= CHUNK_OVERLAP {
            bail!("chunk_size {} must exceed the chunk overlap {CHUNK_OVERLAP}", self.chunk_size);
        }
        Ok(())
    }

    fn to_header(&self, num_sequences: u32) -> IndexHeader {
        IndexHeader {
            version: self.version,
            num_sequences,
            num_hashes: self.num_hashes,
            do_mask: self.do_mask,
            kmer_size: self.kmer_size,
            alphabet: self.alphabet,
            width: self.width,
            rows_per_band: self.rows_per_band,
            sample_k: if self.sample_l > 0 { self.sample_k } else { 0 },
            sample_l: self.sample_l,
            chunk_size: self.chunk_size,
            num_overrep_kmers: self.overrep_kmers.len() as u32,
            lsh_offset: HEADER_BYTES as u64,
            lsh_bytes: BUCKET_TABLE_BYTES as u64,
            aux_offset: (HEADER_BYTES + BUCKET_TABLE_BYTES) as u64,
        }
    }
}

/// Compute one sequence's width-reduced signature under the index
/// parameters, or `None` when the sequence yields no k-mers (shorter
/// than k, fully masked, or all-invalid residues).
///
/// Shared verbatim between build and query so both sides hash the
/// exact same residue stream.
pub fn sequence_signature(
    residues: &[u8],
    header: &IndexHeader,
    scheme: &SignatureScheme,
    overrep: &FxHashSet<u32>,
) -> Option<Vec<u32>> {
    let kmers = if header.do_mask {
        let mut masked = residues.to_vec();
        mask_low_complexity(&mut masked);
        extract_kmers(
            &masked,
            header.kmer_size as usize,
            header.alphabet,
            (!overrep.is_empty()).then_some(overrep),
        )
    } else {
        extract_kmers(
            residues,
            header.kmer_size as usize,
            header.alphabet,
            (!overrep.is_empty()).then_some(overrep),
        )
    };
    if kmers.is_empty() {
        return None;
    }
    Some(build_signature(
        &kmers,
        header.num_hashes as usize,
        scheme,
        header.width.mask(),
    ))
}

/// Bucket ids of one width-reduced signature under the index's
/// candidate-generation scheme.
pub fn signature_buckets(
    signature: &[u32],
    header: &IndexHeader,
    sample_table: Option<&SampleTable>,
) -> Vec<u32> {
    match sample_table {
        Some(table) => sample_hashes(signature, table),
        None => band_hashes(signature, header.rows_per_band as usize),
    }
}

struct SequenceEntry {
    /// Width-reduced signature, or `None` for degenerate sequences
    /// (those get a sentinel record and no bucket entries).
    signature: Option<Vec<u32>>,
    buckets: Vec<u32>,
}

/// Build the index file pair for one database volume at
/// `basename.pki` / `basename.pkd`.
pub fn build_index(
    db: &dyn SequenceDatabase,
    params: &BuildParams,
    basename: &Path,
    verbose: bool,
) -> Result<()> {
    params.validate()?;
    let num_sequences = db.num_sequences();
    let header = params.to_header(num_sequences);

    // Draw the hash family / sample table once; both are persisted so
    // searches replay them instead of regenerating.
    let mut rng = StdRng::seed_from_u64(params.rng_seed);
    let scheme = if header.uses_seeds() {
        let (a, b) = generate_seeds(&mut rng, params.num_hashes as usize);
        SignatureScheme::Seeded { a, b }
    } else {
        SignatureScheme::BottomK
    };
    let sample_table = header.uses_sampling().then(|| {
        generate_sample_table(
            &mut rng,
            params.num_hashes as usize,
            params.sample_k as usize,
            params.sample_l as usize,
        )
    });
    let overrep: FxHashSet<u32> = params.overrep_kmers.iter().copied().collect();

    let progress = if verbose {
        let bar = ProgressBar::new(num_sequences as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} [{elapsed_precise}] {bar:40} {pos}/{len} sequences",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("hashing");
        Some(bar)
    } else {
        None
    };

    // Phase 1: parallel over contiguous OID blocks; block order is
    // preserved by the ordered collect, so the merged vector is
    // OID-sorted without any post-sort.
    let num_blocks = (num_sequences as usize).div_ceil(OID_BLOCK);
    let entries: Vec<SequenceEntry> = (0..num_blocks)
        .into_par_iter()
        .flat_map_iter(|block| {
            let start = block * OID_BLOCK;
            let end = ((block + 1) * OID_BLOCK).min(num_sequences as usize);
            let mut out = Vec::with_capacity(end - start);
            for oid in start..end {
                let signature =
                    sequence_signature(db.residues(oid as u32), &header, &scheme, &overrep);
                let buckets = match &signature {
                    Some(sig) => signature_buckets(sig, &header, sample_table.as_ref()),
                    None => Vec::new(),
                };
                out.push(SequenceEntry { signature, buckets });
            }
            if let Some(bar) = &progress {
                bar.inc((end - start) as u64);
            }
            out
        })
        .collect();

    if let Some(bar) = &progress {
        bar.finish_with_message("hashed");
    }
    if verbose {
        eprintln!("Merging bucket chains...");
    }

    // Phase 2: single-threaded merge in OID order.
    let mut chains: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    for (oid, entry) in entries.iter().enumerate() {
        for &bucket in &entry.buckets {
            chains.entry(bucket).or_default().push(oid as u32);
        }
    }

    // Assign chain offsets behind the aux tables, in ascending bucket
    // order for a deterministic file image.
    let mut occupied: Vec<u32> = chains.keys().copied().collect();
    occupied.sort_unstable();
    let chains_start = header.aux_offset + header.aux_bytes() as u64;
    let mut bucket_table = vec![0u64; KMER_LSH_SIZE];
    let mut offset = chains_start;
    for &bucket in &occupied {
        bucket_table[bucket as usize] = offset;
        offset += 4 + 4 * chains[&bucket].len() as u64;
    }

    write_index_file(
        &basename.with_extension(INDEX_EXT),
        &header,
        &scheme,
        sample_table.as_ref(),
        &params.overrep_kmers,
        &bucket_table,
        &occupied,
        &chains,
    )?;
    write_data_file(&basename.with_extension(DATA_EXT), &header, &entries)?;

    if verbose {
        eprintln!(
            "Indexed {} sequences into {} occupied buckets",
            num_sequences,
            occupied.len()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_index_file(
    path: &Path,
    header: &IndexHeader,
    scheme: &SignatureScheme,
    sample_table: Option<&SampleTable>,
    overrep: &[u32],
    bucket_table: &[u64],
    occupied: &[u32],
    chains: &FxHashMap<u32, Vec<u32>>,
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create index file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&header.encode())?;
    for entry in bucket_table {
        writer.write_all(&entry.to_le_bytes())?;
    }
    if let SignatureScheme::Seeded { a, b } = scheme {
        for v in a.iter().chain(b) {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    if let Some(table) = sample_table {
        for v in &table.positions {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    for v in overrep {
        writer.write_all(&v.to_le_bytes())?;
    }
    for bucket in occupied {
        let oids = &chains[bucket];
        writer.write_all(&(oids.len() as u32).to_le_bytes())?;
        for oid in oids {
            writer.write_all(&oid.to_le_bytes())?;
        }
    }
    writer.flush().context("failed to flush index file")?;
    Ok(())
}

fn write_data_file(path: &Path, header: &IndexHeader, entries: &[SequenceEntry]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create data file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let width = header.width;

    // Sentinel record for degenerate sequences: the sequence exists at
    // its fixed offset but carries the scheme's empty-set fill and is
    // never referenced by any bucket chain.
    let sentinel_value = if header.uses_seeds() { 0 } else { width.compress(u32::MAX) };
    let mut record = Vec::with_capacity(header.record_bytes());
    for (oid, entry) in entries.iter().enumerate() {
        record.clear();
        width.encode_into(width.compress(oid as u32), &mut record);
        match &entry.signature {
            Some(signature) => {
                for &v in signature {
                    width.encode_into(v, &mut record);
                }
            }
            None => {
                for _ in 0..header.num_hashes {
                    width.encode_into(sentinel_value, &mut record);
                }
            }
        }
        writer.write_all(&record)?;
    }
    writer.flush().context("failed to flush data file")?;
    Ok(())
}
