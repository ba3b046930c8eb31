//! End-to-end hashing scenarios: chunking, signatures, banding

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;

use KLASH::api::options::KmerOptions;
use KLASH::api::search::run_search;
use KLASH::core::banding::KMER_LSH_SIZE;
use KLASH::engine::query::chunk_ranges;
use KLASH::index::builder::{sequence_signature, signature_buckets, BuildParams};
use KLASH::seqdb::SequenceDatabase;

use crate::helpers::{random_protein, relatives_database, Fixture};

/// A 240-residue query under the default parameters (chunk size 150,
/// k = 5, 128 hashes, 15-letter alphabet, two rows per band): two
/// chunks, a 128-value signature per chunk, 64 bucket ids per chunk.
#[test]
fn default_parameters_shape_the_pipeline() {
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let index = fixture.open();
    let header = index.header();
    let scheme = index.scheme();
    let overrep = FxHashSet::default();

    let mut rng = StdRng::seed_from_u64(11);
    let query = random_protein(&mut rng, 240);

    let chunks = chunk_ranges(query.len(), header.chunk_size as usize);
    assert_eq!(chunks, vec![0..150, 120..240]);

    for range in chunks {
        let signature = sequence_signature(&query[range], header, &scheme, &overrep)
            .expect("a 120+ residue random protein always yields k-mers");
        assert_eq!(signature.len(), 128);

        let buckets = signature_buckets(&signature, header, None);
        assert_eq!(buckets.len(), 64);
        assert!(buckets.iter().all(|&b| (b as usize) < KMER_LSH_SIZE));
    }
}

/// Pinned hash vector: a fixed 240-residue protein whose signature and
/// band-hash values were computed independently from the published
/// constants (FNV-1a over little-endian k-mer codes, 16-bit bottom-k
/// sketch, bucket hashes modulo 2^24 + 1). Any drift in the alphabet
/// tables, k-mer packing, hash function, width reduction, or banding
/// changes these literals.
#[test]
fn fixed_query_hashes_to_pinned_values() {
    const QUERY: &[u8] = b"GHWFKAMPNICRTLVDSYQEGEYQHTCRAFVSNPDKWLMIDAKRNTCHPQ\
LYFSGMWVEIEVQKSDAHRIFYNTGCPMWLPSDHMCFYQWEVKATGINRLASECFTLMQGDRVPNYKWIHFDHWVYCI\
KLNEPSTAGRMQNRHSKPVDWCEALITFYMGQFNLYAGQMRHKPVWSCEITDICLDKWYPVETQMSGAFNHRSDQGAW\
CMHIPTYENLVRFKQWGIYLRVTKSNFAHDPECM";
    assert_eq!(QUERY.len(), 240);

    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let index = fixture.open();
    let header = index.header();
    let scheme = index.scheme();
    let overrep = FxHashSet::default();

    let chunks = chunk_ranges(QUERY.len(), header.chunk_size as usize);
    assert_eq!(chunks, vec![0..150, 120..240]);

    // First chunk: 146 distinct sketch values, truncated to the
    // smallest 128.
    let first = sequence_signature(&QUERY[0..150], header, &scheme, &overrep).unwrap();
    assert_eq!(first[..8], [223, 272, 315, 639, 709, 1263, 2319, 3162]);
    assert_eq!(first[124..], [55526, 55758, 56266, 57235]);
    let first_bands = signature_buckets(&first, header, None);
    assert_eq!(first_bands.len(), 64);
    assert_eq!(first_bands[..4], [16_361_502, 14_593_004, 3_514_150, 3_170_198]);
    assert_eq!(first_bands[63], 10_381_873);

    // Second chunk: 116 distinct values, padded with the 16-bit fill
    // from position 116 on.
    let second = sequence_signature(&QUERY[120..240], header, &scheme, &overrep).unwrap();
    assert_eq!(second[..8], [223, 1412, 2310, 2319, 3509, 3549, 3600, 3753]);
    assert_eq!(second[115], 65_426);
    assert!(second[116..].iter().all(|&v| v == 0xFFFF));
    let second_bands = signature_buckets(&second, header, None);
    assert_eq!(second_bands[..4], [15_325_685, 10_080_806, 9_452_528, 3_335_931]);
    assert_eq!(second_bands[63], 3_167_322);
}

#[test]
fn hashing_is_reproducible() {
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let index = fixture.open();
    let header = index.header();
    let scheme = index.scheme();
    let overrep = FxHashSet::default();

    let mut rng = StdRng::seed_from_u64(12);
    let residues = random_protein(&mut rng, 150);

    let first = sequence_signature(&residues, header, &scheme, &overrep).unwrap();
    let second = sequence_signature(&residues, header, &scheme, &overrep).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        signature_buckets(&first, header, None),
        signature_buckets(&second, header, None)
    );
}

#[test]
fn signature_values_fit_the_storage_width() {
    // Width::Two stores 16-bit values; the sketch must already live in
    // that range (and stay sorted) when the bands are hashed.
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let index = fixture.open();
    let scheme = index.scheme();
    let overrep = FxHashSet::default();

    let mut rng = StdRng::seed_from_u64(13);
    let residues = random_protein(&mut rng, 200);
    let signature = sequence_signature(&residues, index.header(), &scheme, &overrep).unwrap();
    assert!(signature.iter().all(|&v| v <= 0xFFFF));
    for w in signature.windows(2) {
        assert!(w[0] <= w[1]);
    }
}

#[test]
fn invalid_residues_break_kmer_windows() {
    let fixture = Fixture::build(relatives_database(), &BuildParams::default());
    let index = fixture.open();
    let scheme = index.scheme();
    let overrep = FxHashSet::default();

    // Nothing but ambiguity codes: no window of 5 valid residues.
    let junk = vec![b'X'; 40];
    assert!(sequence_signature(&junk, index.header(), &scheme, &overrep).is_none());

    // An X in the middle splits the windows but both sides still hash.
    let mut rng = StdRng::seed_from_u64(14);
    let mut split = random_protein(&mut rng, 60);
    split[30] = b'X';
    assert!(sequence_signature(&split, index.header(), &scheme, &overrep).is_some());
}

#[test]
fn overrepresented_kmer_list_round_trips_into_search() {
    // Codes of (k-1)-mers, k = 5, 15-letter alphabet: < 15^4.
    let params = BuildParams {
        overrep_kmers: vec![100, 2_000, 50_000],
        ..Default::default()
    };
    let fixture = Fixture::build(relatives_database(), &params);
    let index = fixture.open();

    let persisted = index.overrep_kmers();
    assert_eq!(persisted.len(), 3);
    for code in [100, 2_000, 50_000] {
        assert!(persisted.contains(&code));
    }

    // Query-side hashing with the persisted list reproduces the stored
    // records exactly.
    let scheme = index.scheme();
    for oid in 0..fixture.db.num_sequences() {
        let expected =
            sequence_signature(fixture.db.residues(oid), index.header(), &scheme, persisted)
                .unwrap();
        let (_, stored) = index.signature_record(oid).unwrap();
        assert_eq!(stored, expected, "oid {oid}");
    }
}

#[test]
fn sampling_index_searches_end_to_end() {
    let records = relatives_database();
    // Version 2: seeded family with a Buhler sample table.
    let params = BuildParams {
        version: 2,
        rows_per_band: 0,
        sample_k: 3,
        sample_l: 32,
        ..Default::default()
    };
    let fixture = Fixture::build(records.clone(), &params);
    let index = fixture.open();

    let options = KmerOptions { threshold: 0.05, min_hits: 1, ..Default::default() };
    let queries = vec![("rel0".to_string(), records[0].1.clone())];
    let results = run_search(&index, &queries, &options, None).unwrap();
    let result = results.get_by_id("rel0").unwrap();

    // The sampled buckets still recover the indexed copy of the query.
    assert!(result.hits().iter().any(|h| h.oid == 0));
    assert_eq!(result.hits()[0].oid, 0);
}
