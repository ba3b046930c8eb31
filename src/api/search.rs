//! Batch search entry point
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmer.cpp
//!            (CBlastKmerSearch::Run)
//!
//! Validates options once, then runs every query of the batch through
//! the engine on the rayon pool. All workers read the same mapped
//! index; the aggregated result set preserves the caller's query
//! order independent of completion order.

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::api::options::KmerOptions;
use crate::core::diagnostics::{diagnostics_enabled, BatchSummary};
use crate::engine::query::KmerSearcher;
use crate::engine::results::ResultSet;
use crate::index::reader::MinHashIndex;
use crate::seqdb::OidFilter;

/// One named query: (identifier, ASCII residues).
pub type Query = (String, Vec<u8>);

/// Search every query against one open index.
///
/// Batch-level failures (invalid options) are returned as errors
/// before any per-query work; per-query degenerate conditions land in
/// the individual results instead.
pub fn run_search(
    index: &MinHashIndex,
    queries: &[Query],
    options: &KmerOptions,
    filter: Option<&OidFilter>,
) -> Result<ResultSet> {
    options.validate().context("invalid k-mer search options")?;

    let searcher = KmerSearcher::new(
        index,
        options.threshold,
        options.min_hits,
        options.max_target_seqs,
        filter,
    );

    let results: Vec<_> = queries
        .par_iter()
        .map(|(id, residues)| searcher.search_one(id, residues))
        .collect();

    if diagnostics_enabled() {
        let mut summary = BatchSummary::default();
        for result in &results {
            summary.absorb(result.counters(), result.has_warnings() || result.has_errors());
        }
        summary.print_summary();
    }

    Ok(ResultSet::aggregate(results))
}
