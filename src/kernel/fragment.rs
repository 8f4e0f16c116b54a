//! Fragment reconstruction from read pairs.
//!
//! Mates join by direct suffix/prefix overlap when they already touch,
//! otherwise by bridging the left tip toward the right mate's k-mers
//! under paired-k-mer guidance. A reconstructed fragment must then show
//! a run of intact read-distance links covering both mates, or the
//! bridge is distrusted and the pair stays unconnected.

use super::extend::{best_successor, seed_walk};
use super::TraversalParams;
use crate::graph::{BloomDbg, Kmer};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Mates overlapped directly by this many bases.
    Overlap(usize),
    /// A bridge of this many extension steps closed the gap.
    Bridge(usize),
}

#[derive(Debug)]
pub enum FragmentOutcome {
    Joined { kmers: Vec<Kmer>, kind: JoinKind },
    Unconnected,
}

/// Suffix/prefix overlap of at least `min_overlap` bases, longest first.
fn direct_overlap(left: &[u8], right: &[u8], min_overlap: usize) -> Option<usize> {
    let max_ov = left.len().min(right.len());
    (min_overlap..=max_ov)
        .rev()
        .find(|&ov| left[left.len() - ov..] == right[..ov])
}

/// Join two mate k-mer walks into one fragment walk.
pub fn connect_pair(
    graph: &BloomDbg,
    left: &[Kmer],
    right: &[Kmer],
    params: &TraversalParams,
) -> FragmentOutcome {
    if left.is_empty() || right.is_empty() {
        return FragmentOutcome::Unconnected;
    }
    let left_bases = graph.assemble(left);
    let right_bases = graph.assemble(right);

    if let Some(ov) = direct_overlap(&left_bases, &right_bases, params.min_overlap) {
        let mut merged = left_bases.clone();
        merged.extend_from_slice(&right_bases[ov..]);
        return FragmentOutcome::Joined {
            kmers: graph.get_kmers(&merged),
            kind: JoinKind::Overlap(ov),
        };
    }

    // bridge: walk the left tip toward any k-mer of the right mate
    let anchors: HashMap<u64, usize> = right
        .iter()
        .enumerate()
        .map(|(i, kmer)| (kmer.canonical, i))
        .collect();
    let (mut walk, mut visited) = seed_walk(left.to_vec());
    for step in 1..=params.bound {
        let next = match best_successor(graph, &walk, params) {
            Some(kmer) => kmer,
            None => return FragmentOutcome::Unconnected,
        };
        if let Some(&idx) = anchors.get(&next.canonical) {
            let mut kmers: Vec<Kmer> = walk.into_iter().collect();
            kmers.push(next);
            kmers.extend_from_slice(&right[idx + 1..]);
            return FragmentOutcome::Joined {
                kmers,
                kind: JoinKind::Bridge(step),
            };
        }
        if !visited.insert(next.canonical) {
            return FragmentOutcome::Unconnected; // cycled before reaching the mate
        }
        walk.push_back(next);
    }
    FragmentOutcome::Unconnected
}

/// Maximal runs of indices `i` where the read-distance link
/// `(kmers[i], kmers[i+d])` holds.
pub fn link_runs(graph: &BloomDbg, kmers: &[Kmer], distance: usize) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    if kmers.len() <= distance {
        return runs;
    }
    let mut start = None;
    for i in 0..kmers.len() - distance {
        if graph.contains_paired_read(&kmers[i], &kmers[i + distance]) {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            runs.push((s, i - 1));
        }
    }
    if let Some(s) = start {
        runs.push((s, kmers.len() - distance - 1));
    }
    runs
}

/// A fragment is consistent when one link run of at least
/// `min_num_kmer_pairs` spans from the left mate into the right mate.
/// Graphs without a read paired-keys filter cannot veto anything.
pub fn validate_fragment(
    graph: &BloomDbg,
    kmers: &[Kmer],
    left_anchor: usize,
    right_anchor: usize,
    params: &TraversalParams,
) -> bool {
    if !graph.has_paired_read_filter() {
        return true;
    }
    let d = graph.config().d_read;
    link_runs(graph, kmers, d).iter().any(|&(s, e)| {
        let long_enough = e - s + 1 >= params.min_num_kmer_pairs;
        long_enough && s <= left_anchor && e + d >= right_anchor
    })
}
