//! High-level search API
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmer.hpp
//!
//! - `options` - option struct and validation
//! - `search` - batch entry point over an open index

pub mod options;
pub mod search;
