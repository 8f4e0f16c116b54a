use jingwei::bloom::CountingBloomFilter;
use jingwei::graph::{BloomDbg, FilterSizing, GraphConfig};
use jingwei::hashing::{canonical, reverse_complement, KmerHasher, PairedHasher};
use jingwei::kernel::fragment::{connect_pair, FragmentOutcome, JoinKind};
use jingwei::kernel::{ScreeningFilter, TraversalParams};
use jingwei::populate::{populate_sources, PopulateMode, PopulateOptions};
use jingwei::snapshot::{load_graph, save_graph};
use seqpack::OptionPair;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

fn graph(k: usize, d_read: usize, d_frag: usize) -> BloomDbg {
    BloomDbg::new(
        GraphConfig {
            k,
            num_hashes: 3,
            stranded: false,
            d_read,
            d_frag,
        },
        FilterSizing {
            dbg_bits: 1 << 20,
            cbf_bytes: 1 << 20,
            pkbf_bits: Some(1 << 18),
            rpkbf_bits: Some(1 << 18),
        },
    )
    .unwrap()
}

fn populate(graph: &BloomDbg, seq: &[u8]) {
    for kmer in graph.get_kmers(seq) {
        graph.insert_hash(kmer.canonical);
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("jingwei_it").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn populate_makes_every_kmer_a_member() {
    let graph = graph(5, 3, 8);
    let seq = b"AAACCCGGGTTT";
    populate(&graph, seq);
    let kmers = graph.get_kmers(seq);
    assert_eq!(kmers.len(), seq.len() - 5 + 1);
    for kmer in &kmers {
        assert!(graph.contains(kmer));
    }
    // walk edges: each consecutive pair is a live successor link
    for window in kmers.windows(2) {
        let succ = graph.successors(&window[0]);
        assert!(succ.iter().any(|s| s.canonical == window[1].canonical));
    }
    // the first k-mer's one surviving successor
    let succ = graph.successors(&kmers[0]);
    assert_eq!(succ.len(), 1);
    assert_eq!(succ[0].bases, b"AACCC");
    assert_eq!(graph.assemble(&kmers), seq);
}

#[test]
fn canonical_hash_ignores_strand() {
    let seq = b"ATCCGTAGAACTTGGATGCAGGATTACCAGAT";
    let rc = reverse_complement(seq);
    let k = 9;
    let mut forward = Vec::new();
    let mut hasher = KmerHasher::new(seq, k);
    while hasher.roll() {
        forward.push(canonical(hasher.forward_hash(), hasher.reverse_hash()));
    }
    let mut backward = Vec::new();
    let mut hasher = KmerHasher::new(&rc, k);
    while hasher.roll() {
        backward.push(canonical(hasher.forward_hash(), hasher.reverse_hash()));
    }
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn counts_accumulate_across_sequences() {
    let graph = graph(4, 3, 8);
    // ACGT occurs exactly once in each sequence
    populate(&graph, b"AACGTA");
    populate(&graph, b"CACGTC");
    let kmer = &graph.get_kmers(b"ACGT")[0];
    assert_eq!(graph.count(kmer), 2);

    // repeat-rich inputs: ACGT shows up three times across the two
    // sequences, so the conservative count lands at three or more
    let graph = graph_with_k4();
    populate(&graph, b"ACGTACGT");
    populate(&graph, b"CGTACGTA");
    let kmer = &graph.get_kmers(b"ACGT")[0];
    assert!(graph.count(kmer) >= 3);
}

fn graph_with_k4() -> BloomDbg {
    graph(4, 3, 8)
}

#[test]
fn paired_kmers_at_distance_three() {
    let graph = graph(4, 3, 3);
    let seq = b"AAAACCCCGGGG";
    populate(&graph, seq);
    let mut hasher = PairedHasher::new(seq, 4, 3, false);
    while hasher.roll() {
        let (tail, head) = hasher.pair();
        graph.add_paired_frag(tail, head);
    }
    let kmers = graph.get_kmers(seq);
    // (K_0, K_3) = (AAAA, ACCC)
    assert!(graph.contains_paired_frag(&kmers[0], &kmers[3]));
    assert!(!graph.contains_paired_frag(&kmers[3], &kmers[0]));
}

#[test]
fn counting_filter_saturates() {
    let cbf = CountingBloomFilter::with_size(1 << 14, 3).unwrap();
    for _ in 0..300 {
        cbf.increment(0xBEEF);
    }
    assert_eq!(cbf.count(0xBEEF), 255);
}

#[test]
fn screening_rejects_the_second_emission() {
    let graph = graph(5, 3, 8);
    let seq = b"ATCCGTAGAACTTGGATGCA";
    populate(&graph, seq);
    let kmers = graph.get_kmers(seq);
    let screen = ScreeningFilter::new(1 << 20, 3).unwrap();
    assert!(!screen.is_represented(&kmers, 0.9));
    screen.record(&kmers);
    assert!(screen.is_represented(&kmers, 0.9));
}

#[test]
fn mate_overlap_reconstructs_the_fragment() {
    let graph = graph(4, 3, 8);
    populate(&graph, b"AAAACCCCGGGG");
    let left = graph.get_kmers(b"AAAACCCC");
    let right = graph.get_kmers(b"CCCCGGGG");
    let params = TraversalParams {
        min_overlap: 4,
        ..Default::default()
    };
    match connect_pair(&graph, &left, &right, &params) {
        FragmentOutcome::Joined { kmers, kind } => {
            assert_eq!(kind, JoinKind::Overlap(4));
            assert_eq!(graph.assemble(&kmers), b"AAAACCCCGGGG");
        }
        FragmentOutcome::Unconnected => panic!("expected the overlap join"),
    }
}

#[test]
fn boundary_lengths() {
    let graph = graph(5, 3, 8);
    assert_eq!(graph.get_kmers(b"ACGTA").len(), 1);
    assert!(graph.get_kmers(b"ACGT").is_empty());
    // one N splits the sequence into two independent window runs
    let kmers = graph.get_kmers(b"AAACCNGGTTTT");
    assert_eq!(kmers.len(), 3);
    assert_eq!(kmers[0].bases, b"AAACC");
    assert_eq!(kmers[1].bases, b"GGTTT");
}

#[test]
fn populate_from_files_and_snapshot_round_trip() {
    let dir = scratch_dir("populate_files");
    let r1 = dir.join("reads_1.fq");
    let r2 = dir.join("reads_2.fq");
    std::fs::write(&r1, "@p1\nTTTCCTCATGCAATTCAAAA\n+\nIIIIIIIIIIIIIIIIIIII\n").unwrap();
    std::fs::write(&r2, "@p1\nCGTAAAATGGTTTACTATTT\n+\nIIIIIIIIIIIIIIIIIIII\n").unwrap();

    let graph = graph(11, 3, 20);
    let opts = PopulateOptions {
        mode: PopulateMode::Add,
        read_pairs: true,
        frag_pairs: false,
        threads: 3,
        min_quality: 0,
    };
    let cancel = AtomicBool::new(false);
    let report = populate_sources(
        &graph,
        &[OptionPair::Pair(r1, r2)],
        &opts,
        None,
        &cancel,
    )
    .unwrap();
    assert_eq!(report.sequences, 1);
    assert_eq!(report.kmers, 20); // ten 11-mers per 20-base mate

    for kmer in graph.get_kmers(b"TTTCCTCATGCAATTCAAAA") {
        assert!(graph.contains(&kmer));
    }

    let snap = dir.join("graph.rbg");
    save_graph(&graph, &snap).unwrap();
    let restored = load_graph(&snap).unwrap();
    for (a, b) in graph
        .get_kmers(b"TTTCCTCATGCAATTCAAAA")
        .iter()
        .zip(&restored.get_kmers(b"TTTCCTCATGCAATTCAAAA"))
    {
        assert!(restored.contains(b));
        assert_eq!(a.count, b.count);
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_source_is_skipped_not_fatal() {
    let dir = scratch_dir("bad_source");
    let bad = dir.join("bad.fq");
    std::fs::write(&bad, "this is not a sequence file\n").unwrap();
    let good = dir.join("good.fa");
    std::fs::write(&good, ">r1\nAAACCCGGGTTTAAACCC\n").unwrap();

    let graph = graph(5, 3, 8);
    let opts = PopulateOptions {
        mode: PopulateMode::Add,
        read_pairs: false,
        frag_pairs: false,
        threads: 3,
        min_quality: 0,
    };
    let cancel = AtomicBool::new(false);
    let report = populate_sources(
        &graph,
        &[
            OptionPair::Single(bad),
            OptionPair::Single(good),
        ],
        &opts,
        None,
        &cancel,
    )
    .unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.sequences, 1);
    let _ = std::fs::remove_dir_all(&dir);
}
