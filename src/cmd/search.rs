//! `klash search` - run queries against a built index

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bio::io::fasta;
use clap::Args;
use rustc_hash::FxHashSet;

use crate::api::options::KmerOptions;
use crate::api::search::{run_search, Query};
use crate::index::reader::MinHashIndex;
use crate::seqdb::{FastaDatabase, OidFilter, SequenceDatabase};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Index basename (expects <index>.pki and <index>.pkd)
    #[arg(short, long)]
    pub index: PathBuf,

    /// Protein FASTA database the index was built from
    #[arg(short, long)]
    pub db: PathBuf,

    /// Query FASTA
    #[arg(short, long)]
    pub query: PathBuf,

    /// Minimum estimated Jaccard similarity, in (0, 1]
    #[arg(short, long, default_value_t = 0.1)]
    pub threshold: f64,

    /// Bucket agreements required before a candidate is scored
    /// (0 = alphabet-based default)
    #[arg(long, default_value_t = 0)]
    pub min_hits: u32,

    /// Maximum reported hits per query (0 = unbounded)
    #[arg(long, default_value_t = 500)]
    pub max_target_seqs: usize,

    /// Restrict hits to the ids in this file (one per line)
    #[arg(long, conflicts_with = "negative_seqidlist")]
    pub seqidlist: Option<PathBuf>,

    /// Exclude the ids in this file (one per line)
    #[arg(long)]
    pub negative_seqidlist: Option<PathBuf>,

    /// Output path (default: stdout)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

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

fn read_id_list(path: &Path, db: &FastaDatabase) -> Result<FxHashSet<u32>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read id list {}", path.display()))?;
    let mut oids = FxHashSet::default();
    for id in text.split_whitespace() {
        // Ids absent from this volume simply never match; the list may
        // span volumes.
        if let Some(oid) = db.oid_of(id) {
            oids.insert(oid);
        }
    }
    Ok(oids)
}

fn read_queries(path: &Path) -> Result<Vec<Query>> {
    let reader = fasta::Reader::from_file(path)
        .with_context(|| format!("failed to open query file {}", path.display()))?;
    let mut queries = Vec::new();
    for record in reader.records() {
        let record = record
            .with_context(|| format!("malformed FASTA record in {}", path.display()))?;
        let id = record.id().split_whitespace().next().unwrap_or("unknown").to_string();
        queries.push((id, record.seq().to_vec()));
    }
    Ok(queries)
}

pub fn run(args: SearchArgs) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build_global()
        .context("failed to build thread pool")?;

    if args.verbose {
        eprintln!("Opening index {}...", args.index.display());
    }
    let index = MinHashIndex::open(&args.index)?;

    if args.verbose {
        eprintln!("Reading database {}...", args.db.display());
    }
    let db = FastaDatabase::from_path(&args.db)?;
    if db.num_sequences() != index.header().num_sequences {
        bail!(
            "database {} has {} sequences but the index was built over {}",
            args.db.display(),
            db.num_sequences(),
            index.header().num_sequences
        );
    }

    let filter = match (&args.seqidlist, &args.negative_seqidlist) {
        (Some(path), None) => Some(OidFilter::Positive(read_id_list(path, &db)?)),
        (None, Some(path)) => Some(OidFilter::Negative(read_id_list(path, &db)?)),
        (None, None) => None,
        (Some(_), Some(_)) => unreachable!("clap rejects both id lists at once"),
    };

    if args.verbose {
        eprintln!("Reading queries {}...", args.query.display());
    }
    let queries = read_queries(&args.query)?;
    if queries.is_empty() {
        bail!("query file {} contains no sequences", args.query.display());
    }

    let options = KmerOptions {
        threshold: args.threshold,
        min_hits: args.min_hits,
        max_target_seqs: args.max_target_seqs,
    };
    let results = run_search(&index, &queries, &options, filter.as_ref())?;

    // Per-query warnings go to stderr; the hit table stays clean.
    for result in results.iter() {
        if let Some(message) = result.message() {
            eprintln!("Warning: query {}: {}", result.query_id(), message);
        }
    }
    results.write_output(&db, args.out.as_ref())?;
    Ok(())
}
