//! Per-query search pipeline
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmer.cpp
//!            (CBlastKmer::x_SearchTarget and friends)
//!
//! Each query moves through a fixed sequence of states:
//!
//! ```text
//! Received -> Chunked -> Hashed -> CandidatesGathered -> Scored
//!          -> Ranked -> Finalized
//! ```
//!
//! with a side exit to Degenerate (terminal, recoverable) when the
//! query yields no k-mers at all — shorter than k, entirely masked, or
//! all-invalid residues. Degenerate is a per-query warning, never an
//! error for the batch.
//!
//! The pipeline only reads the shared memory-mapped index, so
//! independent queries run on rayon workers with no synchronization;
//! chunk processing order cannot affect the ranked result because the
//! candidate union and the per-candidate max-over-chunks score are
//! order-independent.

use std::ops::Range;

use rustc_hash::FxHashMap;

use crate::core::diagnostics::QueryCounters;
use crate::core::minhash::{estimate_similarity, sketch_similarity, SignatureScheme};
use crate::engine::results::{QueryResult, ScoredHit, Severity};
use crate::index::builder::{sequence_signature, signature_buckets};
use crate::index::format::CHUNK_OVERLAP;
use crate::index::reader::MinHashIndex;
use crate::seqdb::OidFilter;

/// Split a query of `len` residues into overlapping chunk ranges.
///
/// MinHash agreement degrades when the compared sequences differ a lot
/// in length; chunking keeps each comparison length-balanced. Queries
/// at or under the chunk size stay whole; longer queries advance by
/// `chunk_size - CHUNK_OVERLAP` with the final chunk clamped to the
/// sequence end.
pub fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    if len <= chunk_size {
        return vec![0..len];
    }
    let step = chunk_size - CHUNK_OVERLAP;
    let mut ranges = Vec::new();
    let mut start = 0usize;
    loop {
        if start + chunk_size >= len {
            ranges.push(start..len);
            break;
        }
        ranges.push(start..start + chunk_size);
        start += step;
    }
    ranges
}

/// One search session over an open index: resolved options plus the
/// index's persisted hash family, shared read-only across queries.
pub struct KmerSearcher<'a> {
    index: &'a MinHashIndex,
    scheme: SignatureScheme,
    threshold: f64,
    min_hits: u32,
    max_targets: usize,
    filter: Option<&'a OidFilter>,
}

impl<'a> KmerSearcher<'a> {
    /// `min_hits == 0` selects the index's alphabet-appropriate
    /// default. Options are validated before this point.
    pub fn new(
        index: &'a MinHashIndex,
        threshold: f64,
        min_hits: u32,
        max_targets: usize,
        filter: Option<&'a OidFilter>,
    ) -> Self {
        let min_hits = if min_hits == 0 { index.default_min_hits() } else { min_hits };
        KmerSearcher {
            index,
            scheme: index.scheme(),
            threshold,
            min_hits,
            max_targets,
            filter,
        }
    }

    pub fn min_hits(&self) -> u32 {
        self.min_hits
    }

    /// Run one query through the whole state machine.
    pub fn search_one(&self, query_id: &str, residues: &[u8]) -> QueryResult {
        let header = self.index.header();
        let mut counters = QueryCounters::default();

        // Received -> Chunked -> Hashed: one signature per chunk.
        // Chunks that individually yield no k-mers are dropped; the
        // query is Degenerate only when every chunk does.
        let chunks = chunk_ranges(residues.len(), header.chunk_size as usize);
        let signatures: Vec<Vec<u32>> = chunks
            .into_iter()
            .filter_map(|range| {
                sequence_signature(
                    &residues[range],
                    header,
                    &self.scheme,
                    self.index.overrep_kmers(),
                )
            })
            .collect();
        if signatures.is_empty() {
            return QueryResult::degenerate(
                query_id.to_string(),
                counters,
                Severity::Warning,
                format!(
                    "query yields no k-mers (shorter than k={} or fully masked)",
                    header.kmer_size
                ),
            );
        }

        // Hashed -> CandidatesGathered: probe the bucket table with
        // every chunk's band/sample hashes; count independent bucket
        // agreements per candidate OID.
        let mut agreements: FxHashMap<u32, u32> = FxHashMap::default();
        for signature in &signatures {
            for bucket in signature_buckets(signature, header, self.index.sample_table()) {
                for oid in self.index.bucket_oids(bucket) {
                    counters.hit_count += 1;
                    *agreements.entry(oid).or_insert(0) += 1;
                }
            }
        }
        counters.oids_considered = agreements.len();

        // CandidatesGathered -> Scored: only candidates with enough
        // independent agreements are worth a signature fetch. Sorted
        // OID order keeps counters and ties deterministic across
        // thread counts.
        let mut candidates: Vec<u32> = agreements
            .iter()
            .filter(|&(_, &count)| count >= self.min_hits)
            .map(|(&oid, _)| oid)
            .collect();
        candidates.sort_unstable();

        let sketch_pad = header.width.compress(u32::MAX);
        let mut scored: Vec<ScoredHit> = Vec::with_capacity(candidates.len());
        for oid in candidates {
            let Some((_, stored)) = self.index.signature_record(oid) else {
                continue;
            };
            counters.jd_oid_count += 1;
            let mut best = 0.0f64;
            for signature in &signatures {
                counters.jd_count += 1;
                let similarity = match &self.scheme {
                    SignatureScheme::Seeded { .. } => estimate_similarity(signature, &stored),
                    SignatureScheme::BottomK => sketch_similarity(signature, &stored, sketch_pad),
                };
                if similarity > best {
                    best = similarity;
                }
            }
            scored.push(ScoredHit { oid, score: best });
        }

        // Scored -> Ranked: threshold, descending score, ascending OID
        // on ties, then the target-sequence cap.
        scored.retain(|hit| hit.score >= self.threshold);
        scored.sort_by(|x, y| {
            y.score
                .partial_cmp(&x.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.oid.cmp(&y.oid))
        });
        if self.max_targets > 0 {
            scored.truncate(self.max_targets);
        }

        // Ranked -> Finalized: at most one of positive/negative id
        // list trims the ranked hits.
        if let Some(filter) = self.filter {
            scored.retain(|hit| filter.allows(hit.oid));
        }
        counters.total_matches = scored.len();

        QueryResult::finalized(query_id.to_string(), scored, counters)
    }
}
