//! Reduced amino-acid alphabets for k-mer hashing
//!
//! Reference: ncbi-blast/c++/src/algo/blast/proteinkmer/blastkmerutils.cpp
//!
//! The k-mer prefilter does not hash raw residues; it first collapses the
//! 20-letter amino-acid alphabet into a reduced grouping so that
//! conservative substitutions still produce identical k-mer codes. Two
//! groupings are supported, both from the compressed alphabets evaluated
//! for protein BLAST word matching (Shiryev et al. 2007):
//!
//! - 15 letters: A / C / D / E / FY / G / H / IV / KR / LM / N / P / Q / ST / W
//! - 10 letters: AST / C / DN / EQ / FY / G / HW / ILMV / KR / P
//!
//! The alphabet choice is a persisted index parameter. A query must be
//! translated with the same alphabet as the index it searches, so the
//! value travels in the index header, never in per-query options.

/// Sentinel for residues with no reduced-alphabet group (X, B, Z, U, O,
/// gaps, stop). K-mer windows containing this value are skipped.
pub const INVALID_RESIDUE: u8 = 0xFF;

/// Build a 256-entry ASCII translation table from group strings.
/// Upper- and lower-case residues map to the same group.
const fn build_table(groups: &[&[u8]]) -> [u8; 256] {
    let mut table = [INVALID_RESIDUE; 256];
    let mut g = 0;
    while g < groups.len() {
        let members = groups[g];
        let mut m = 0;
        while m < members.len() {
            let c = members[m];
            table[c as usize] = g as u8;
            table[(c + 32) as usize] = g as u8; // lower case
            m += 1;
        }
        g += 1;
    }
    table
}

const TABLE_15: [u8; 256] = build_table(&[
    b"A", b"C", b"D", b"E", b"FY", b"G", b"H", b"IV", b"KR", b"LM", b"N",
    b"P", b"Q", b"ST", b"W",
]);

const TABLE_10: [u8; 256] = build_table(&[
    b"AST", b"C", b"DN", b"EQ", b"FY", b"G", b"HW", b"ILMV", b"KR", b"P",
]);

/// Reduced alphabet selector, persisted in the index header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmerAlphabet {
    /// 15-letter grouping (header value 0). The default.
    Reduced15,
    /// 10-letter grouping (header value 1). Coarser, more sensitive,
    /// noisier buckets.
    Reduced10,
}

impl KmerAlphabet {
    /// Decode the header's alphabet field. Unknown values are a format
    /// error handled by the caller.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(KmerAlphabet::Reduced15),
            1 => Some(KmerAlphabet::Reduced10),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            KmerAlphabet::Reduced15 => 0,
            KmerAlphabet::Reduced10 => 1,
        }
    }

    /// Number of groups in the reduced alphabet; the base of the k-mer
    /// positional code.
    #[inline]
    pub fn size(self) -> u32 {
        match self {
            KmerAlphabet::Reduced15 => 15,
            KmerAlphabet::Reduced10 => 10,
        }
    }

    #[inline]
    fn table(self) -> &'static [u8; 256] {
        match self {
            KmerAlphabet::Reduced15 => &TABLE_15,
            KmerAlphabet::Reduced10 => &TABLE_10,
        }
    }

    /// Translate one ASCII residue to its group index, or
    /// `INVALID_RESIDUE` if it has no group.
    #[inline]
    pub fn translate(self, residue: u8) -> u8 {
        self.table()[residue as usize]
    }
}
