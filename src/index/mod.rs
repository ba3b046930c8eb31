//! On-disk k-mer index: format, builder, and mmap reader
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerindex.cpp
//!            ncbi-blast/c++/src/algo/blast/proteinkmer/mhfile.cpp

pub mod builder;
pub mod format;
pub mod reader;
