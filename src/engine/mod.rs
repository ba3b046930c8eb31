//! Search-time engine: per-query pipeline and result aggregation
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmer.cpp
//!            ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerresults.cpp

pub mod query;
pub mod results;
