//! On-disk format and reader tests

use std::fs::File;
use std::io::Write;

use rustc_hash::FxHashSet;
use tempfile::TempDir;

use KLASH::core::alphabet::KmerAlphabet;
use KLASH::core::minhash::SignatureScheme;
use KLASH::index::builder::{sequence_signature, BuildParams};
use KLASH::index::format::Width;
use KLASH::index::reader::{IndexOpenError, MinHashIndex};
use KLASH::seqdb::SequenceDatabase;

use crate::helpers::{relatives_database, Fixture};

#[test]
fn signature_records_round_trip_bottom_k() {
    let params = BuildParams::default();
    let fixture = Fixture::build(relatives_database(), &params);
    let index = fixture.open();
    let overrep = FxHashSet::default();

    assert_eq!(index.scheme(), SignatureScheme::BottomK);
    for oid in 0..fixture.db.num_sequences() {
        let expected = sequence_signature(
            fixture.db.residues(oid),
            index.header(),
            &index.scheme(),
            &overrep,
        )
        .expect("200-residue sequences always yield k-mers");
        let (_, stored) = index.signature_record(oid).expect("record in range");
        assert_eq!(stored, expected, "oid {oid}");
    }
}

#[test]
fn signature_records_round_trip_seeded_family() {
    let params = BuildParams { version: 1, width: Width::Four, ..Default::default() };
    let fixture = Fixture::build(relatives_database(), &params);
    let index = fixture.open();
    let overrep = FxHashSet::default();

    let (a, b) = index.seeds().expect("version 1 persists seeds");
    assert_eq!(a.len(), 128);
    assert_eq!(b.len(), 128);

    let scheme = index.scheme();
    for oid in 0..fixture.db.num_sequences() {
        let expected =
            sequence_signature(fixture.db.residues(oid), index.header(), &scheme, &overrep)
                .unwrap();
        let (stored_oid, stored) = index.signature_record(oid).unwrap();
        // Width::Four stores the exact OID.
        assert_eq!(stored_oid, oid);
        assert_eq!(stored, expected);
    }
}

#[test]
fn header_reflects_build_parameters() {
    let params = BuildParams {
        kmer_size: 4,
        num_hashes: 64,
        rows_per_band: 4,
        alphabet: KmerAlphabet::Reduced10,
        do_mask: false,
        ..Default::default()
    };
    let fixture = Fixture::build(relatives_database(), &params);
    let index = fixture.open();
    let header = index.header();

    assert_eq!(header.kmer_size, 4);
    assert_eq!(header.num_hashes, 64);
    assert_eq!(header.rows_per_band, 4);
    assert_eq!(header.alphabet, KmerAlphabet::Reduced10);
    assert!(!header.do_mask);
    assert_eq!(header.num_sequences, 10);
    assert_eq!(header.hashes_per_signature(), 16);
    // 10-letter alphabet demands two bucket agreements by default.
    assert_eq!(index.default_min_hits(), 2);
}

#[test]
fn buckets_contain_indexed_oids() {
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let index = fixture.open();
    let overrep = FxHashSet::default();

    // Every sequence's own band hashes must lead back to its OID.
    let scheme = index.scheme();
    for oid in 0..fixture.db.num_sequences() {
        let signature =
            sequence_signature(fixture.db.residues(oid), index.header(), &scheme, &overrep)
                .unwrap();
        let buckets =
            KLASH::index::builder::signature_buckets(&signature, index.header(), None);
        let found = buckets.iter().any(|&b| index.bucket_oids(b).contains(&oid));
        assert!(found, "oid {oid} unreachable through its own buckets");
    }
}

#[test]
fn open_missing_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = MinHashIndex::open(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, IndexOpenError::Missing(_)));
}

#[test]
fn open_zero_length_is_fatal() {
    let dir = TempDir::new().unwrap();
    File::create(dir.path().join("vol.pki")).unwrap();
    File::create(dir.path().join("vol.pkd")).unwrap();
    let err = MinHashIndex::open(&dir.path().join("vol")).unwrap_err();
    assert!(matches!(err, IndexOpenError::Empty(_)));
}

#[test]
fn open_rejects_unknown_version() {
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    // Corrupt the version word in place.
    let path = fixture.basename.with_extension("pki");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
    let mut file = File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    drop(file);

    let err = MinHashIndex::open(&fixture.basename).unwrap_err();
    assert!(matches!(err, IndexOpenError::Header { .. }));
}

#[test]
fn open_rejects_undersized_chunk_size() {
    // A chunk size at or under the overlap would underflow the query
    // chunking step; the reader must refuse the header instead of
    // letting the first long query blow up mid-search.
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let path = fixture.basename.with_extension("pki");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[40..44].copy_from_slice(&10u32.to_le_bytes()); // chunk_size word
    let mut file = File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    drop(file);

    let err = MinHashIndex::open(&fixture.basename).unwrap_err();
    assert!(matches!(err, IndexOpenError::Header { .. }));
}

#[test]
fn open_rejects_skewed_aux_offset() {
    // An aux offset that disagrees with the bucket-table extent would
    // make the reader parse seed/sample bytes from the wrong place.
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let path = fixture.basename.with_extension("pki");
    let mut bytes = std::fs::read(&path).unwrap();
    let skewed = u64::from_le_bytes(bytes[64..72].try_into().unwrap()) + 16;
    bytes[64..72].copy_from_slice(&skewed.to_le_bytes());
    let mut file = File::create(&path).unwrap();
    file.write_all(&bytes).unwrap();
    drop(file);

    let err = MinHashIndex::open(&fixture.basename).unwrap_err();
    assert!(matches!(err, IndexOpenError::Header { .. }));
}

#[test]
fn open_rejects_truncated_data_file() {
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let path = fixture.basename.with_extension("pkd");
    let bytes = std::fs::read(&path).unwrap();
    let mut file = File::create(&path).unwrap();
    file.write_all(&bytes[..bytes.len() / 2]).unwrap();
    drop(file);

    let err = MinHashIndex::open(&fixture.basename).unwrap_err();
    assert!(matches!(err, IndexOpenError::SizeMismatch { .. }));
}

#[test]
fn build_rejects_bad_parameters() {
    let db = relatives_database();
    for params in [
        BuildParams { kmer_size: 0, ..Default::default() },
        BuildParams { kmer_size: 12, ..Default::default() },
        BuildParams { rows_per_band: 3, ..Default::default() }, // 3 ∤ 128
        BuildParams { rows_per_band: 0, ..Default::default() }, // no scheme
        BuildParams { rows_per_band: 2, sample_l: 4, sample_k: 8, ..Default::default() },
        BuildParams { version: 1, rows_per_band: 0, sample_l: 4, sample_k: 8, ..Default::default() },
    ] {
        assert!(params.validate().is_err(), "{params:?} should fail validation");
        // And the same failure surfaces from build_index before any IO.
        let dir = TempDir::new().unwrap();
        let fasta = dir.path().join("v.fasta");
        crate::helpers::write_fasta(&fasta, &db);
        let loaded = KLASH::seqdb::FastaDatabase::from_path(&fasta).unwrap();
        assert!(KLASH::index::builder::build_index(
            &loaded,
            &params,
            &dir.path().join("v"),
            false
        )
        .is_err());
    }
}

#[test]
fn sampling_index_round_trips() {
    let params = BuildParams {
        rows_per_band: 0,
        sample_k: 3,
        sample_l: 16,
        ..Default::default()
    };
    let fixture = Fixture::build(relatives_database(), &params);
    let index = fixture.open();

    let table = index.sample_table().expect("sampling index persists its table");
    assert_eq!(table.sample_k, 3);
    assert_eq!(table.sample_l, 16);
    assert_eq!(table.positions.len(), 48);
    assert!(table.positions.iter().all(|&p| p < 128));
    assert_eq!(index.header().hashes_per_signature(), 16);
}
