//! Shared fixtures for KLASH tests

use std::io::Write;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use KLASH::index::builder::{build_index, BuildParams};
use KLASH::index::reader::MinHashIndex;
use KLASH::seqdb::{FastaDatabase, SequenceDatabase};

pub const AMINO_ACIDS: &[u8; 20] = b"ACDEFGHIKLMNPQRSTVWY";

/// Deterministic random protein of the full 20-letter alphabet.
pub fn random_protein(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| AMINO_ACIDS[rng.gen_range(0..20)]).collect()
}

/// Point-mutate `fraction` of the residues, deterministically.
pub fn mutate(rng: &mut StdRng, residues: &[u8], fraction: f64) -> Vec<u8> {
    let mut out = residues.to_vec();
    let count = ((residues.len() as f64) * fraction).round() as usize;
    for _ in 0..count {
        let pos = rng.gen_range(0..out.len());
        out[pos] = AMINO_ACIDS[rng.gen_range(0..20)];
    }
    out
}

pub fn write_fasta(path: &Path, records: &[(String, Vec<u8>)]) {
    let mut file = std::fs::File::create(path).expect("create fasta");
    for (id, seq) in records {
        writeln!(file, ">{id}").unwrap();
        file.write_all(seq).unwrap();
        writeln!(file).unwrap();
    }
}

/// A built index over a synthetic database. The temp directory is
/// held only to keep the files alive.
pub struct Fixture {
    _dir: TempDir,
    pub basename: PathBuf,
    pub db: FastaDatabase,
}

impl Fixture {
    /// Build an index over `records` with the given parameters.
    pub fn build(records: Vec<(String, Vec<u8>)>, params: &BuildParams) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let fasta = dir.path().join("volume.fasta");
        write_fasta(&fasta, &records);
        let db = FastaDatabase::from_path(&fasta).expect("load fasta");
        assert_eq!(db.num_sequences() as usize, records.len());

        let basename = dir.path().join("volume");
        build_index(&db, params, &basename, false).expect("build index");
        Fixture { _dir: dir, basename, db }
    }

    pub fn open(&self) -> MinHashIndex {
        MinHashIndex::open(&self.basename).expect("open index")
    }
}

/// Standard small database: five close relatives of one 200-residue
/// protein followed by five unrelated proteins.
pub fn relatives_database() -> Vec<(String, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(42);
    let base = random_protein(&mut rng, 200);
    let mut records = Vec::new();
    records.push(("rel0".to_string(), base.clone()));
    for i in 1..5 {
        records.push((format!("rel{i}"), mutate(&mut rng, &base, 0.03)));
    }
    for i in 0..5 {
        records.push((format!("unrel{i}"), random_protein(&mut rng, 200)));
    }
    records
}
