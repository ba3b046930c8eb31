//! Per-query results and the batch result set
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerresults.cpp
//!            (CBlastKmerResults / CBlastKmerResultsSet)
//!
//! Failures local to one query never abort siblings: a degenerate
//! query (shorter than k, fully masked) is swallowed into that query's
//! result as a warning, and callers must inspect each result rather
//! than rely on a batch-level error. The result set preserves the
//! caller-supplied query order in its positional index regardless of
//! which worker finished first, and looking up an unknown query id
//! yields `None`, not an error.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::core::diagnostics::QueryCounters;
use crate::seqdb::SequenceDatabase;

/// Severity attached to a degenerate or failed query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One scored database hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
    pub oid: u32,
    /// Estimated Jaccard similarity in [0, 1].
    pub score: f64,
}

/// Immutable outcome of one query's trip through the engine.
#[derive(Debug, Clone)]
pub struct QueryResult {
    query_id: String,
    hits: Vec<ScoredHit>,
    counters: QueryCounters,
    status: Option<(Severity, String)>,
}

impl QueryResult {
    /// A query that reached the Finalized state.
    pub fn finalized(query_id: String, hits: Vec<ScoredHit>, counters: QueryCounters) -> Self {
        QueryResult { query_id, hits, counters, status: None }
    }

    /// A query that exited through the Degenerate state: empty score
    /// vector, a severity, and a message.
    pub fn degenerate(
        query_id: String,
        counters: QueryCounters,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        QueryResult { query_id, hits: Vec::new(), counters, status: Some((severity, message.into())) }
    }

    /// An empty result for a query that never reached the engine
    /// (batch-level failure reported per query by the caller).
    pub fn empty(query_id: String, severity: Severity, message: impl Into<String>) -> Self {
        Self::degenerate(query_id, QueryCounters::default(), severity, message)
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn hits(&self) -> &[ScoredHit] {
        &self.hits
    }

    pub fn counters(&self) -> &QueryCounters {
        &self.counters
    }

    pub fn has_warnings(&self) -> bool {
        matches!(self.status, Some((Severity::Warning, _)))
    }

    pub fn has_errors(&self) -> bool {
        matches!(self.status, Some((Severity::Error, _)))
    }

    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().map(|(_, m)| m.as_str())
    }
}

/// Batch result set, indexed both positionally (caller query order)
/// and by query identifier.
pub struct ResultSet {
    results: Vec<QueryResult>,
    by_id: FxHashMap<String, usize>,
}

impl ResultSet {
    /// Collect per-query results, preserving the given order. On
    /// duplicate query ids the first occurrence wins the id index;
    /// positional access still reaches every result.
    pub fn aggregate(results: Vec<QueryResult>) -> Self {
        let mut by_id = FxHashMap::default();
        for (i, result) in results.iter().enumerate() {
            by_id.entry(result.query_id.clone()).or_insert(i);
        }
        ResultSet { results, by_id }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueryResult> {
        self.results.get(index)
    }

    /// Lookup by query identifier; an unknown id is `None`, never an
    /// error.
    pub fn get_by_id(&self, query_id: &str) -> Option<&QueryResult> {
        self.by_id.get(query_id).map(|&i| &self.results[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResult> {
        self.results.iter()
    }

    /// Write tab-separated hits (query id, subject id, similarity),
    /// grouped per query in caller order. Degenerate queries emit a
    /// comment line with their message.
    pub fn write_output(
        &self,
        db: &dyn SequenceDatabase,
        out_path: Option<&PathBuf>,
    ) -> Result<()> {
        let stdout = io::stdout();
        let mut writer: Box<dyn Write> = if let Some(path) = out_path {
            Box::new(BufWriter::new(File::create(path)?))
        } else {
            Box::new(BufWriter::new(stdout.lock()))
        };

        for result in &self.results {
            if let Some(message) = result.message() {
                writeln!(writer, "# {}: {}", result.query_id, message)?;
                continue;
            }
            for hit in result.hits() {
                writeln!(
                    writer,
                    "{}\t{}\t{:.4}",
                    result.query_id,
                    db.seq_id(hit.oid),
                    hit.score
                )?;
            }
        }
        Ok(())
    }
}
