//! Diagnostic counters for the k-mer search pipeline
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerresults.cpp
//!            (TBlastKmerPrelimScores carries per-query counters)
//!
//! Each query owns one `QueryCounters` value, filled in as the pipeline
//! runs and frozen into the query's result. The counters are part of
//! the result's public contract: tests verify them, and callers use
//! them to understand where candidates were lost.
//!
//! A batch-level summary (enabled via the KLASH_DIAGNOSTICS environment
//! variable) aggregates the per-query counters at the end of a run.

/// Check if the end-of-run diagnostic summary is enabled.
pub fn diagnostics_enabled() -> bool {
    std::env::var("KLASH_DIAGNOSTICS")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Per-query pipeline counters.
///
/// Owned exclusively by one query's task until the result is handed to
/// the aggregator, so plain integers suffice (no atomics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounters {
    /// Bucket hits examined across all chunks and bands/samples.
    pub hit_count: usize,
    /// Distinct candidate OIDs gathered from the bucket table.
    pub oids_considered: usize,
    /// Signature-agreement (Jaccard-distance) evaluations performed.
    pub jd_count: usize,
    /// Distinct OIDs that reached the scoring stage.
    pub jd_oid_count: usize,
    /// Hits surviving threshold, cap, and id-list filtering.
    pub total_matches: usize,
}

/// Batch summary printed when `KLASH_DIAGNOSTICS=1`.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub queries: usize,
    pub degenerate_queries: usize,
    pub totals: QueryCounters,
}

impl BatchSummary {
    pub fn absorb(&mut self, counters: &QueryCounters, degenerate: bool) {
        self.queries += 1;
        if degenerate {
            self.degenerate_queries += 1;
        }
        self.totals.hit_count += counters.hit_count;
        self.totals.oids_considered += counters.oids_considered;
        self.totals.jd_count += counters.jd_count;
        self.totals.jd_oid_count += counters.jd_oid_count;
        self.totals.total_matches += counters.total_matches;
    }

    /// Print a summary of all counters for the batch.
    pub fn print_summary(&self) {
        eprintln!("\n=== KLASH Pipeline Diagnostics ===");
        eprintln!("Queries:");
        eprintln!("  Processed:                  {}", self.queries);
        eprintln!("  Degenerate (no k-mers):     {}", self.degenerate_queries);
        eprintln!("Candidate Stage:");
        eprintln!("  Bucket hits examined:       {}", self.totals.hit_count);
        eprintln!("  Candidate OIDs gathered:    {}", self.totals.oids_considered);
        eprintln!("Scoring Stage:");
        eprintln!("  Signature comparisons:      {}", self.totals.jd_count);
        eprintln!("  OIDs scored:                {}", self.totals.jd_oid_count);
        eprintln!("Output:");
        eprintln!("  Total matches:              {}", self.totals.total_matches);
    }
}
