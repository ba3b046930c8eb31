//! `klash index` - build the index file pair for one database volume

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::core::alphabet::KmerAlphabet;
use crate::index::builder::{build_index, BuildParams};
use crate::index::format::{Width, CURRENT_VERSION, DEFAULT_CHUNK_SIZE};
use crate::seqdb::{FastaDatabase, SequenceDatabase};

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Protein FASTA database volume to index
    #[arg(short, long)]
    pub db: PathBuf,

    /// Output basename (writes <out>.pki and <out>.pkd)
    #[arg(short, long)]
    pub out: PathBuf,

    /// K-mer length
    #[arg(short = 'k', long, default_value_t = 5)]
    pub kmer_size: u32,

    /// Number of hash functions (signature length)
    #[arg(long, default_value_t = 128)]
    pub num_hashes: u32,

    /// Signature rows per LSH band (0 with --sample-l)
    #[arg(long, default_value_t = 2)]
    pub rows_per_band: u32,

    /// Buhler sampling: positions per sample
    #[arg(long, default_value_t = 0)]
    pub sample_k: u32,

    /// Buhler sampling: number of samples (enables sampling, requires
    /// --rows-per-band 0)
    #[arg(long, default_value_t = 0)]
    pub sample_l: u32,

    /// Per-value storage width in bytes (1, 2, or 4)
    #[arg(long, default_value_t = 2)]
    pub width: u32,

    /// Reduced alphabet size (15 or 10)
    #[arg(long, default_value_t = 15)]
    pub alphabet: u32,

    /// Index format version to write
    #[arg(long, default_value_t = CURRENT_VERSION)]
    pub format_version: u32,

    /// Query chunk size recorded in the header
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Disable low-complexity masking before k-mer extraction
    #[arg(long, default_value_t = false)]
    pub no_mask: bool,

    /// Seed for the build-time RNG (hash family / sample table)
    #[arg(long, default_value_t = 0xB10C_5EED)]
    pub seed: u64,

    /// Worker threads
    #[arg(long, default_value_t = num_cpus_default())]
    pub num_threads: usize,

    /// Print progress
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

fn num_cpus_default() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

pub fn run(args: IndexArgs) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build_global()
        .context("failed to build thread pool")?;

    let alphabet = match args.alphabet {
        15 => KmerAlphabet::Reduced15,
        10 => KmerAlphabet::Reduced10,
        other => bail!("unsupported alphabet size {other} (use 15 or 10)"),
    };
    let Some(width) = Width::from_u32(args.width) else {
        bail!("unsupported storage width {} (use 1, 2, or 4)", args.width);
    };

    let params = BuildParams {
        version: args.format_version,
        kmer_size: args.kmer_size,
        num_hashes: args.num_hashes,
        rows_per_band: args.rows_per_band,
        sample_k: args.sample_k,
        sample_l: args.sample_l,
        width,
        alphabet,
        chunk_size: args.chunk_size,
        do_mask: !args.no_mask,
        overrep_kmers: Vec::new(),
        rng_seed: args.seed,
    };

    if args.verbose {
        eprintln!("Reading database {}...", args.db.display());
    }
    let db = FastaDatabase::from_path(&args.db)?;
    if args.verbose {
        eprintln!("Indexing {} sequences...", db.num_sequences());
    }
    build_index(&db, &params, &args.out, args.verbose)?;
    Ok(())
}
