//! The traversal and assembly kernel.
//!
//! Everything here is read-only against the graph and written as free
//! functions over `(graph, state)`. Per-candidate failures never become
//! errors: a candidate is dropped with a reason code and counted.

pub mod correct;
pub mod extend;
pub mod fragment;
pub mod screen;

use crate::graph::{BloomDbg, Kmer};
use crate::hashing::reverse_complement;
use crate::stats::FragmentLengths;
pub use screen::ScreeningFilter;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Knobs shared across the kernel stages.
#[derive(Debug, Clone, Copy)]
pub struct TraversalParams {
    /// Branches at most this many k-mers long count as tips.
    pub max_tip_length: usize,
    /// Depth of the coverage lookahead at ambiguous branches.
    pub lookahead: usize,
    /// A successor whose coverage falls below this fraction of the tip
    /// coverage is rejected at branches.
    pub max_cov_gradient: f32,
    /// Length slack allowed when rerouting around a coverage dip.
    pub max_indel_size: usize,
    /// Identity threshold shared by rerouting, artifact detection and
    /// representation screening.
    pub percent_identity: f32,
    /// Minimum run of intact read-distance links for a consistent
    /// segment.
    pub min_num_kmer_pairs: usize,
    /// Minimum direct suffix/prefix overlap when joining mates.
    pub min_overlap: usize,
    /// Bridging gives up after this many extension steps.
    pub bound: usize,
    pub max_err_corr_iterations: usize,
    /// Coverage below which a k-mer sits in a dip.
    pub min_kmer_cov: u8,
}

impl Default for TraversalParams {
    fn default() -> Self {
        Self {
            max_tip_length: 10,
            lookahead: 3,
            max_cov_gradient: 0.5,
            max_indel_size: 1,
            percent_identity: 0.9,
            min_num_kmer_pairs: 3,
            min_overlap: 10,
            bound: 500,
            max_err_corr_iterations: 2,
            min_kmer_cov: 1,
        }
    }
}

/// Terminal failure states of a transcript candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TipOnly,
    Chimeric,
    Artifact,
    Represented,
    LowCoverage,
    NoPath,
    Inconsistent,
}

/// What became of one candidate.
#[derive(Debug)]
pub enum Outcome {
    Emitted(Transcript),
    Rejected(RejectReason),
}

/// A fully assembled output sequence plus the header facts the writer
/// needs.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub bases: Vec<u8>,
    pub median_coverage: u8,
    pub fragment_info: Option<String>,
}

/// Median count over a walk; the coverage the record header reports.
pub fn median_coverage(kmers: &[Kmer]) -> u8 {
    if kmers.is_empty() {
        return 0;
    }
    let mut counts: Vec<u8> = kmers.iter().map(|k| k.count).collect();
    counts.sort_unstable();
    counts[counts.len() / 2]
}

/// Refresh counts on a walk whose k-mers were built before the counting
/// filter settled.
pub fn refresh_counts(graph: &BloomDbg, kmers: &mut [Kmer]) {
    for kmer in kmers.iter_mut() {
        kmer.count = graph.count(kmer);
    }
}

/// Shared tallies, updated lock-free from every assembly worker.
#[derive(Debug, Default)]
pub struct KernelStats {
    pub candidates: AtomicU64,
    pub emitted: AtomicU64,
    pub unconnected: AtomicU64,
    pub rejected_tip_only: AtomicU64,
    pub rejected_chimeric: AtomicU64,
    pub rejected_artifact: AtomicU64,
    pub rejected_represented: AtomicU64,
    pub rejected_low_coverage: AtomicU64,
    pub rejected_no_path: AtomicU64,
    pub rejected_inconsistent: AtomicU64,
    pub corrected_reads: AtomicU64,
    pub trimmed_artifacts: AtomicU64,
}

impl KernelStats {
    pub fn record(&self, outcome: &Outcome) {
        self.candidates.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Emitted(_) => self.emitted.fetch_add(1, Ordering::Relaxed),
            Outcome::Rejected(reason) => self.counter_for(*reason).fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn counter_for(&self, reason: RejectReason) -> &AtomicU64 {
        match reason {
            RejectReason::TipOnly => &self.rejected_tip_only,
            RejectReason::Chimeric => &self.rejected_chimeric,
            RejectReason::Artifact => &self.rejected_artifact,
            RejectReason::Represented => &self.rejected_represented,
            RejectReason::LowCoverage => &self.rejected_low_coverage,
            RejectReason::NoPath => &self.rejected_no_path,
            RejectReason::Inconsistent => &self.rejected_inconsistent,
        }
    }

    pub fn snapshot(&self) -> KernelStatsSnapshot {
        KernelStatsSnapshot {
            candidates: self.candidates.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            unconnected: self.unconnected.load(Ordering::Relaxed),
            rejected_tip_only: self.rejected_tip_only.load(Ordering::Relaxed),
            rejected_chimeric: self.rejected_chimeric.load(Ordering::Relaxed),
            rejected_artifact: self.rejected_artifact.load(Ordering::Relaxed),
            rejected_represented: self.rejected_represented.load(Ordering::Relaxed),
            rejected_low_coverage: self.rejected_low_coverage.load(Ordering::Relaxed),
            rejected_no_path: self.rejected_no_path.load(Ordering::Relaxed),
            rejected_inconsistent: self.rejected_inconsistent.load(Ordering::Relaxed),
            corrected_reads: self.corrected_reads.load(Ordering::Relaxed),
            trimmed_artifacts: self.trimmed_artifacts.load(Ordering::Relaxed),
        }
    }
}

/// Everything one assembly worker borrows while turning read pairs into
/// transcripts.
pub struct AssemblyContext<'a> {
    pub graph: &'a BloomDbg,
    pub screen: &'a ScreeningFilter,
    pub params: &'a TraversalParams,
    pub stats: &'a KernelStats,
    pub lengths: &'a FragmentLengths,
    /// Emit the mates of an unconnectable pair as two records instead
    /// of dropping them.
    pub keep_unconnected: bool,
    /// Hard cap on transcript length in k-mers.
    pub max_transcript_kmers: usize,
}

/// Drive one read pair through the candidate state machine:
/// seed, correct, bridge, validate, extend, screen, emit.
pub fn process_pair(ctx: &AssemblyContext, left_bases: &[u8], right_bases: &[u8]) -> Vec<Outcome> {
    let graph = ctx.graph;
    // mates arrive in FR orientation; flip the right one onto the
    // forward strand before walking
    let right_flipped = reverse_complement(right_bases);
    let mut left = graph.get_kmers(left_bases);
    let mut right = graph.get_kmers(&right_flipped);
    if left.is_empty() && right.is_empty() {
        return vec![finish_rejected(ctx, RejectReason::NoPath)];
    }

    let (left_fix, right_fix) = correct::error_correct_pair(graph, &left, &right, ctx.params);
    if let Some(fixed) = left_fix {
        left = fixed;
        ctx.stats.corrected_reads.fetch_add(1, Ordering::Relaxed);
    }
    if let Some(fixed) = right_fix {
        right = fixed;
        ctx.stats.corrected_reads.fetch_add(1, Ordering::Relaxed);
    }

    // the length broadcast tightens the bridge bound once it exists
    let mut params = *ctx.params;
    if let Some(q) = ctx.lengths.quartiles() {
        params.bound = params.bound.min(q.q3.max(1));
    }

    let fragment = match fragment::connect_pair(graph, &left, &right, &params) {
        fragment::FragmentOutcome::Joined { kmers, kind } => {
            let left_anchor = left.len().saturating_sub(1).min(kmers.len() - 1);
            let right_anchor = kmers.len().saturating_sub(right.len());
            if !fragment::validate_fragment(graph, &kmers, left_anchor, right_anchor, &params) {
                ctx.stats.unconnected.fetch_add(1, Ordering::Relaxed);
                return reject_or_emit_mates(ctx, &left, &right, RejectReason::Inconsistent);
            }
            (kmers, kind)
        }
        fragment::FragmentOutcome::Unconnected => {
            ctx.stats.unconnected.fetch_add(1, Ordering::Relaxed);
            return reject_or_emit_mates(ctx, &left, &right, RejectReason::NoPath);
        }
    };
    let (frag_kmers, kind) = fragment;
    let frag_len = frag_kmers.len() + graph.k() - 1;
    ctx.lengths.record(frag_len);
    feed_fragment_pairs(graph, &frag_kmers);

    let info = match kind {
        fragment::JoinKind::Overlap(ov) => format!("l={} overlap={}", frag_len, ov),
        fragment::JoinKind::Bridge(steps) => format!("l={} gap={}", frag_len, steps),
    };
    vec![finish_candidate(ctx, &params, frag_kmers, Some(info))]
}

/// Single-end / long-read path: correct, extend, screen, emit.
pub fn process_single(ctx: &AssemblyContext, bases: &[u8]) -> Vec<Outcome> {
    let graph = ctx.graph;
    let mut kmers = graph.get_kmers(bases);
    if kmers.is_empty() {
        return vec![finish_rejected(ctx, RejectReason::NoPath)];
    }
    if let Some(fixed) = correct::error_correct(graph, &kmers, ctx.params) {
        kmers = fixed;
        ctx.stats.corrected_reads.fetch_add(1, Ordering::Relaxed);
    }
    vec![finish_candidate(ctx, ctx.params, kmers, None)]
}

/// Fragment-distance pairs along an accepted fragment, deduplicated per
/// fragment before touching the shared filter.
fn feed_fragment_pairs(graph: &BloomDbg, kmers: &[Kmer]) {
    if !graph.has_paired_frag_filter() {
        return;
    }
    let d = graph.config().d_frag;
    if kmers.len() <= d {
        return;
    }
    let mut pairs: Vec<(u64, u64)> = (0..kmers.len() - d)
        .map(|i| (kmers[i].canonical, kmers[i + d].canonical))
        .collect();
    pairs.sort_unstable();
    pairs.dedup();
    for (a, b) in pairs {
        graph.add_paired_frag(a, b);
    }
}

fn finish_rejected(ctx: &AssemblyContext, reason: RejectReason) -> Outcome {
    let outcome = Outcome::Rejected(reason);
    ctx.stats.record(&outcome);
    outcome
}

fn reject_or_emit_mates(
    ctx: &AssemblyContext,
    left: &[Kmer],
    right: &[Kmer],
    reason: RejectReason,
) -> Vec<Outcome> {
    if !ctx.keep_unconnected {
        return vec![finish_rejected(ctx, reason)];
    }
    let mut outcomes = Vec::new();
    for mate in [left, right] {
        if !mate.is_empty() {
            outcomes.push(finish_candidate(
                ctx,
                ctx.params,
                mate.to_vec(),
                Some("unconnected".to_string()),
            ));
        }
    }
    if outcomes.is_empty() {
        outcomes.push(finish_rejected(ctx, reason));
    }
    outcomes
}

/// Shared tail of the state machine: extend outward, trim artifacts,
/// check chimera and representation, emit.
fn finish_candidate(
    ctx: &AssemblyContext,
    params: &TraversalParams,
    kmers: Vec<Kmer>,
    fragment_info: Option<String>,
) -> Outcome {
    let graph = ctx.graph;
    let (mut walk, mut visited) = extend::seed_walk(kmers);
    extend::extend_right(graph, &mut walk, &mut visited, params, ctx.max_transcript_kmers);
    extend::extend_left(graph, &mut walk, &mut visited, params, ctx.max_transcript_kmers);

    if walk.len() <= params.max_tip_length {
        return finish_rejected(ctx, RejectReason::TipOnly);
    }
    let mut kmers: Vec<Kmer> = walk_into_vec(walk);
    refresh_counts(graph, &mut kmers);
    let median = median_coverage(&kmers);
    if median < params.min_kmer_cov {
        return finish_rejected(ctx, RejectReason::LowCoverage);
    }

    let mut bases = graph.assemble(&kmers);
    if let Some(new_len) = screen::palindrome_trim_len(&bases, params) {
        ctx.stats.trimmed_artifacts.fetch_add(1, Ordering::Relaxed);
        if new_len < graph.k() {
            return finish_rejected(ctx, RejectReason::Artifact);
        }
        bases.truncate(new_len);
        kmers.truncate(new_len + 1 - graph.k());
    }

    if screen::is_chimeric(graph, &kmers, params) {
        return finish_rejected(ctx, RejectReason::Chimeric);
    }

    if ctx.screen.is_represented(&kmers, params.percent_identity) {
        return finish_rejected(ctx, RejectReason::Represented);
    }
    ctx.screen.record(&kmers);

    let outcome = Outcome::Emitted(Transcript {
        bases,
        median_coverage: median,
        fragment_info,
    });
    ctx.stats.record(&outcome);
    outcome
}

fn walk_into_vec(mut walk: VecDeque<Kmer>) -> Vec<Kmer> {
    walk.make_contiguous();
    walk.into_iter().collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct KernelStatsSnapshot {
    pub candidates: u64,
    pub emitted: u64,
    pub unconnected: u64,
    pub rejected_tip_only: u64,
    pub rejected_chimeric: u64,
    pub rejected_artifact: u64,
    pub rejected_represented: u64,
    pub rejected_low_coverage: u64,
    pub rejected_no_path: u64,
    pub rejected_inconsistent: u64,
    pub corrected_reads: u64,
    pub trimmed_artifacts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FilterSizing, GraphConfig};
    use crate::hashing::reverse_complement;

    const TRUTH: &[u8] = b"TTTCCTCATGCAATTCAAAACCATGTCCGTAATGTAGGCGAAATAGTAAACCATTTTACG";
    const K: usize = 11;

    fn populated_graph() -> BloomDbg {
        let graph = BloomDbg::new(
            GraphConfig {
                k: K,
                num_hashes: 3,
                stranded: false,
                d_read: 3,
                d_frag: 30,
            },
            FilterSizing {
                dbg_bits: 1 << 20,
                cbf_bytes: 1 << 20,
                pkbf_bits: Some(1 << 18),
                rpkbf_bits: Some(1 << 18),
            },
        )
        .unwrap();
        // 20-base reads tiling the transcript every 5 bases
        let d = graph.config().d_read;
        for start in (0..=40).step_by(5) {
            let read = &TRUTH[start..start + 20];
            let kmers = graph.get_kmers(read);
            for kmer in &kmers {
                graph.insert_hash(kmer.canonical);
            }
            for i in 0..kmers.len().saturating_sub(d) {
                graph.add_paired_read(kmers[i].canonical, kmers[i + d].canonical);
            }
        }
        graph
    }

    struct Fixture {
        graph: BloomDbg,
        screen: ScreeningFilter,
        stats: KernelStats,
        lengths: FragmentLengths,
        params: TraversalParams,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: populated_graph(),
                screen: ScreeningFilter::new(1 << 20, 3).unwrap(),
                stats: KernelStats::default(),
                lengths: FragmentLengths::new(100),
                params: TraversalParams::default(),
            }
        }

        fn ctx(&self) -> AssemblyContext<'_> {
            AssemblyContext {
                graph: &self.graph,
                screen: &self.screen,
                params: &self.params,
                stats: &self.stats,
                lengths: &self.lengths,
                keep_unconnected: false,
                max_transcript_kmers: 10_000,
            }
        }
    }

    #[test]
    fn read_pair_becomes_the_full_transcript() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();

        let left = &TRUTH[..20];
        let right = reverse_complement(&TRUTH[40..]);
        let outcomes = process_pair(&ctx, left, &right);
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Outcome::Emitted(t) => {
                assert_eq!(t.bases, TRUTH);
                assert!(t.median_coverage >= 1);
                assert!(t.fragment_info.as_deref().unwrap().contains("gap="));
            }
            Outcome::Rejected(reason) => panic!("rejected: {:?}", reason),
        }
        assert_eq!(fixture.stats.snapshot().emitted, 1);
        assert_eq!(fixture.lengths.sampled(), 1);
    }

    #[test]
    fn second_identical_candidate_is_represented() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();

        let left = &TRUTH[..20];
        let right = reverse_complement(&TRUTH[40..]);
        let first = process_pair(&ctx, left, &right);
        assert!(matches!(first[0], Outcome::Emitted(_)));
        let second = process_pair(&ctx, left, &right);
        assert!(matches!(
            second[0],
            Outcome::Rejected(RejectReason::Represented)
        ));
        let snapshot = fixture.stats.snapshot();
        assert_eq!(snapshot.emitted, 1);
        assert_eq!(snapshot.rejected_represented, 1);
    }

    #[test]
    fn single_read_takes_the_long_read_path() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();

        let outcomes = process_single(&ctx, &TRUTH[15..45]);
        match &outcomes[0] {
            Outcome::Emitted(t) => assert_eq!(t.bases, TRUTH),
            Outcome::Rejected(reason) => panic!("rejected: {:?}", reason),
        }
    }

    #[test]
    fn garbage_input_is_a_no_path_candidate() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();

        let outcomes = process_pair(&ctx, b"NNNNNNNN", b"NNNN");
        assert!(matches!(outcomes[0], Outcome::Rejected(RejectReason::NoPath)));
    }
}
