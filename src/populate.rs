//! Multi-source graph population.
//!
//! Every source gets the bounded-queue scaffold from `seqpack`: one
//! parser feeding a fixed worker set, workers writing straight into the
//! shared filters. Plain-filter writes are idempotent ORs and counter
//! bumps are atomic, so workers never coordinate beyond the queue.

use crate::error::Result;
use crate::graph::BloomDbg;
use crate::hashing::KmerHasher;
use crate::subsample::RedundancyFilter;
use log::{info, warn};
use seqpack::{read_parallel, FastxReader, OptionPair, Sequence};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateMode {
    /// Insert unconditionally.
    Add,
    /// Merge a secondary dataset: bump coverage only for k-mers the
    /// graph already contains, never grow the graph.
    AddIfPresent,
}

#[derive(Debug, Clone)]
pub struct PopulateOptions {
    pub mode: PopulateMode,
    /// Feed read-distance pairs into the read paired-keys filter.
    pub read_pairs: bool,
    /// Feed fragment-distance pairs into the fragment paired-keys
    /// filter (pre-assembled or long-read input).
    pub frag_pairs: bool,
    pub threads: usize,
    /// Phred floor for masking; see `seqpack::mask_low_quality`.
    pub min_quality: u8,
}

#[derive(Debug, Default)]
pub struct PopulateReport {
    pub sequences: u64,
    pub bases: u64,
    pub kmers: u64,
    pub kmer_pairs: u64,
    pub subsample_rejected: u64,
    pub skipped: Vec<(PathBuf, String)>,
}

#[derive(Default)]
struct BatchTally {
    sequences: u64,
    bases: u64,
    kmers: u64,
    kmer_pairs: u64,
    subsample_rejected: u64,
}

/// Insert one body's k-mers and its deduplicated d-distance pairs.
fn insert_sequence(
    graph: &BloomDbg,
    seq: &[u8],
    opts: &PopulateOptions,
    pair_buf: &mut Vec<(u64, u64)>,
) -> (u64, u64) {
    let k = graph.k();
    let config = *graph.config();
    let want_read_pairs =
        opts.read_pairs && opts.mode == PopulateMode::Add && graph.has_paired_read_filter();
    let want_frag_pairs =
        opts.frag_pairs && opts.mode == PopulateMode::Add && graph.has_paired_frag_filter();
    let max_lag = config.d_read.max(config.d_frag);

    pair_buf.clear();
    let mut frag_buf: Vec<(u64, u64)> = Vec::new();
    let mut ring: VecDeque<u64> = VecDeque::with_capacity(max_lag + 1);
    let mut last_pos = 0usize;
    let mut kmers = 0u64;

    let mut hasher = KmerHasher::new(seq, k);
    while hasher.roll() {
        let pos = hasher.pos();
        if !ring.is_empty() && pos != last_pos + 1 {
            ring.clear();
        }
        last_pos = pos;

        let canonical = graph.canonical_of(hasher.forward_hash(), hasher.reverse_hash());
        match opts.mode {
            PopulateMode::Add => graph.insert_hash(canonical),
            PopulateMode::AddIfPresent => graph.insert_hash_if_present(canonical),
        }
        kmers += 1;

        ring.push_back(canonical);
        if ring.len() > max_lag + 1 {
            ring.pop_front();
        }
        if want_read_pairs && ring.len() > config.d_read {
            let tail = ring[ring.len() - 1 - config.d_read];
            pair_buf.push((tail, canonical));
        }
        if want_frag_pairs && ring.len() > config.d_frag {
            let tail = ring[ring.len() - 1 - config.d_frag];
            frag_buf.push((tail, canonical));
        }
    }

    // a repeated pair within one sequence is one piece of evidence, not
    // several: sort-unique on the per-sequence buffer
    let mut pairs = 0u64;
    pair_buf.sort_unstable();
    pair_buf.dedup();
    for &(a, b) in pair_buf.iter() {
        graph.add_paired_read(a, b);
        pairs += 1;
    }
    frag_buf.sort_unstable();
    frag_buf.dedup();
    for &(a, b) in frag_buf.iter() {
        graph.add_paired_frag(a, b);
        pairs += 1;
    }
    (kmers, pairs)
}

fn insert_batch(
    graph: &BloomDbg,
    seqs: Vec<Sequence>,
    opts: &PopulateOptions,
    gate: Option<&RedundancyFilter>,
) -> BatchTally {
    let mut tally = BatchTally::default();
    let mut pair_buf = Vec::new();
    for seq in seqs {
        if let Some(gate) = gate {
            // a pair is judged as a unit; either novel mate admits both
            let admitted = seq.body.reduce(false, |acc, body| gate.admit(body) || acc);
            if !admitted {
                tally.subsample_rejected += 1;
                continue;
            }
        }
        tally.sequences += 1;
        seq.body.for_each(|body| {
            tally.bases += body.len() as u64;
            let (kmers, pairs) = insert_sequence(graph, body, opts, &mut pair_buf);
            tally.kmers += kmers;
            tally.kmer_pairs += pairs;
        });
    }
    tally
}

/// Populate the graph from every source. A source that cannot be opened
/// or parsed is reported and skipped; the others continue.
pub fn populate_sources(
    graph: &BloomDbg,
    sources: &[OptionPair<PathBuf>],
    opts: &PopulateOptions,
    gate: Option<&RedundancyFilter>,
    cancel: &AtomicBool,
) -> Result<PopulateReport> {
    // the scaffold adds its own parser and collector threads
    let workers = opts.threads.saturating_sub(2).max(1);
    let mut report = PopulateReport::default();

    for (file_index, source) in sources.iter().enumerate() {
        let label = source.reduce(String::new(), |acc, p| {
            if acc.is_empty() {
                p.display().to_string()
            } else {
                format!("{},{}", acc, p.display())
            }
        });
        let mut reader =
            match FastxReader::from_paths(source.clone(), file_index, opts.min_quality) {
                Ok(reader) => reader,
                Err(e) => {
                    warn!("skipping source {}: {}", label, e);
                    report
                        .skipped
                        .push((source_primary_path(source), e.to_string()));
                    continue;
                }
            };

        let tally = read_parallel(
            &mut reader,
            workers,
            cancel,
            |seqs| Some(insert_batch(graph, seqs, opts, gate)),
            |outputs| {
                let mut acc = BatchTally::default();
                for t in outputs.iter().flatten() {
                    acc.sequences += t.sequences;
                    acc.bases += t.bases;
                    acc.kmers += t.kmers;
                    acc.kmer_pairs += t.kmer_pairs;
                    acc.subsample_rejected += t.subsample_rejected;
                }
                acc
            },
        )?;

        info!(
            "populated {}: {} sequences, {} k-mers, {} pairs",
            label, tally.sequences, tally.kmers, tally.kmer_pairs
        );
        report.sequences += tally.sequences;
        report.bases += tally.bases;
        report.kmers += tally.kmers;
        report.kmer_pairs += tally.kmer_pairs;
        report.subsample_rejected += tally.subsample_rejected;
    }

    info!(
        "population done: {} sequences, {} k-mers; dbg occupancy {:.4}, est fpr {:.2e}",
        report.sequences,
        report.kmers,
        graph.dbg_filter().occupancy(),
        graph.dbg_filter().estimated_fpr()
    );
    Ok(report)
}

fn source_primary_path(source: &OptionPair<PathBuf>) -> PathBuf {
    match source {
        OptionPair::Single(p) => p.clone(),
        OptionPair::Pair(p, _) => p.clone(),
    }
}
