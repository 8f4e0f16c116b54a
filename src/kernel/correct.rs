//! Coverage-dip error correction.
//!
//! A sequencing error shows up as a run of k-mers whose counts drop
//! under the coverage floor. Correction tries to reroute each run
//! through better-covered k-mers between the same two anchors, accepting
//! the detour only when it stays within the indel budget and the
//! rerouted bases still resemble the originals.

use super::fragment::link_runs;
use super::TraversalParams;
use crate::graph::{BloomDbg, Kmer};
use std::collections::HashSet;

/// Identity of two base strings under a banded alignment. Cheap DP; the
/// segments compared here are dip-sized, never whole transcripts.
pub fn banded_identity(a: &[u8], b: &[u8], band: usize) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let longest = a.len().max(b.len());
    if a.len().abs_diff(b.len()) > band {
        return 0.0;
    }
    // Needleman-Wunsch distance restricted to the band
    let width = 2 * band + 1;
    let inf = usize::MAX / 2;
    let mut prev = vec![inf; width];
    let mut cur = vec![inf; width];
    // row i covers columns j in [i-band, i+band]
    for (w, slot) in prev.iter_mut().enumerate() {
        // row 0: distance is j itself
        if w >= band && w - band <= b.len() {
            *slot = w - band;
        }
    }
    for i in 1..=a.len() {
        for slot in cur.iter_mut() {
            *slot = inf;
        }
        let lo = i.saturating_sub(band);
        let hi = (i + band).min(b.len());
        for j in lo..=hi {
            let w = j + band - i;
            let mut best = inf;
            if j > 0 {
                let sub = prev[w] + usize::from(a[i - 1] != b[j - 1]);
                best = best.min(sub);
                if w > 0 {
                    best = best.min(cur[w - 1] + 1); // gap in a
                }
            } else {
                best = best.min(i); // leading gap column
            }
            if w + 1 < width {
                best = best.min(prev[w + 1] + 1); // gap in b
            }
            cur[w] = best;
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    let w = b.len() + band - a.len();
    let dist = prev[w].min(longest);
    1.0 - dist as f32 / longest as f32
}

/// Maximal runs of indices where `count < min_kmer_cov`.
fn coverage_dips(kmers: &[Kmer], floor: u8) -> Vec<(usize, usize)> {
    let mut dips = Vec::new();
    let mut start = None;
    for (i, kmer) in kmers.iter().enumerate() {
        if kmer.count < floor {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            dips.push((s, i - 1));
        }
    }
    if let Some(s) = start {
        dips.push((s, kmers.len() - 1));
    }
    dips
}

/// Depth-first search for a well-covered path from `from` to `target`,
/// high-coverage successors first. Depth and explored-node budgets keep
/// the search local.
fn reroute(
    graph: &BloomDbg,
    from: &Kmer,
    target: u64,
    max_depth: usize,
    floor: u8,
) -> Option<Vec<Kmer>> {
    const NODE_BUDGET: usize = 1024;
    let mut explored = 0usize;
    let mut path: Vec<Kmer> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();
    seen.insert(from.canonical);

    fn go(
        graph: &BloomDbg,
        cur: &Kmer,
        target: u64,
        depth_left: usize,
        floor: u8,
        path: &mut Vec<Kmer>,
        seen: &mut HashSet<u64>,
        explored: &mut usize,
    ) -> bool {
        if depth_left == 0 || *explored > NODE_BUDGET {
            return false;
        }
        let mut nexts = graph.successors(cur);
        nexts.sort_by(|a, b| b.count.cmp(&a.count));
        for next in nexts {
            *explored += 1;
            if next.canonical == target {
                path.push(next);
                return true;
            }
            if next.count < floor || !seen.insert(next.canonical) {
                continue;
            }
            path.push(next.clone());
            if go(graph, &next, target, depth_left - 1, floor, path, seen, explored) {
                return true;
            }
            path.pop();
        }
        false
    }

    if go(
        graph,
        from,
        target,
        max_depth,
        floor,
        &mut path,
        &mut seen,
        &mut explored,
    ) {
        Some(path)
    } else {
        None
    }
}

/// Correct coverage dips in one k-mer walk. Returns the corrected walk
/// when at least one dip was rerouted.
pub fn error_correct(
    graph: &BloomDbg,
    kmers: &[Kmer],
    params: &TraversalParams,
) -> Option<Vec<Kmer>> {
    let mut current: Vec<Kmer> = kmers.to_vec();
    let mut changed = false;

    for _ in 0..params.max_err_corr_iterations {
        let dips = coverage_dips(&current, params.min_kmer_cov);
        if dips.is_empty() {
            break;
        }
        let mut round_changed = false;
        // rightmost first so earlier indices stay valid while splicing
        for &(start, end) in dips.iter().rev() {
            if start == 0 || end + 1 >= current.len() {
                continue; // no anchor on one side
            }
            let anchor = current[start - 1].clone();
            let rejoin = &current[end + 1];
            let dip_len = end - start + 1;
            let max_depth = dip_len + 1 + params.max_indel_size;
            let path = match reroute(
                graph,
                &anchor,
                rejoin.canonical,
                max_depth,
                params.min_kmer_cov,
            ) {
                Some(path) => path,
                None => continue,
            };
            // identity gate between the dip bases and the detour bases
            let orig_seg = graph.assemble(&current[start - 1..=end + 1]);
            let mut alt_walk = vec![anchor.clone()];
            alt_walk.extend(path.iter().cloned());
            let alt_seg = graph.assemble(&alt_walk);
            if banded_identity(&orig_seg, &alt_seg, params.max_indel_size)
                < params.percent_identity
            {
                continue;
            }
            let mut next: Vec<Kmer> = current[..start].to_vec();
            next.extend(path);
            next.extend_from_slice(&current[end + 2..]);
            current = next;
            round_changed = true;
            changed = true;
        }
        if !round_changed {
            break;
        }
    }

    changed.then_some(current)
}

/// Correct both mates, then hold each corrected mate against its own
/// read-distance links; a mate whose correction breaks previously held
/// link support reverts.
pub fn error_correct_pair(
    graph: &BloomDbg,
    left: &[Kmer],
    right: &[Kmer],
    params: &TraversalParams,
) -> (Option<Vec<Kmer>>, Option<Vec<Kmer>>) {
    let verify = |original: &[Kmer], corrected: Vec<Kmer>| -> Option<Vec<Kmer>> {
        if !graph.has_paired_read_filter() {
            return Some(corrected);
        }
        let d = graph.config().d_read;
        let best = |kmers: &[Kmer]| {
            link_runs(graph, kmers, d)
                .iter()
                .map(|&(s, e)| e - s + 1)
                .max()
                .unwrap_or(0)
        };
        if best(&corrected) >= best(original) {
            Some(corrected)
        } else {
            None
        }
    };

    let left_fix = error_correct(graph, left, params).and_then(|c| verify(left, c));
    let right_fix = error_correct(graph, right, params).and_then(|c| verify(right, c));
    (left_fix, right_fix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BloomDbg, FilterSizing, GraphConfig};

    fn graph(k: usize) -> BloomDbg {
        BloomDbg::new(
            GraphConfig {
                k,
                num_hashes: 3,
                stranded: false,
                d_read: 3,
                d_frag: 20,
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

    fn populate_times(graph: &BloomDbg, seq: &[u8], times: usize) {
        for _ in 0..times {
            for kmer in graph.get_kmers(seq) {
                graph.insert_hash(kmer.canonical);
            }
        }
    }

    #[test]
    fn identity_of_equal_strings() {
        assert_eq!(banded_identity(b"ACGTACGT", b"ACGTACGT", 1), 1.0);
    }

    #[test]
    fn identity_counts_substitutions() {
        let id = banded_identity(b"ACGTACGT", b"ACGAACGT", 1);
        assert!((id - 0.875).abs() < 1e-6);
    }

    #[test]
    fn identity_tolerates_one_indel() {
        let id = banded_identity(b"ACGTACGT", b"ACGTACG", 1);
        assert!(id >= 0.8, "identity {}", id);
    }

    #[test]
    fn dip_runs_are_maximal() {
        let graph = graph(4);
        let mut kmers = graph.get_kmers(b"ACGGTTACAG");
        for (i, km) in kmers.iter_mut().enumerate() {
            km.count = if (2..=3).contains(&i) || i == 6 { 0 } else { 5 };
        }
        assert_eq!(coverage_dips(&kmers, 1), vec![(2, 3), (6, 6)]);
    }

    #[test]
    fn snp_dip_is_rerouted_to_the_covered_path() {
        let k = 5;
        let graph = graph(k);
        let truth: &[u8] = b"ATCCGTAGAACTTGGA";
        // the true sequence is well covered
        populate_times(&graph, truth, 5);
        // one read carries a substitution at position 8 (A->C)
        let noisy: &[u8] = b"ATCCGTAGCACTTGGA";
        populate_times(&graph, noisy, 1);

        let mut params = TraversalParams::default();
        params.min_kmer_cov = 3;
        params.max_err_corr_iterations = 2;

        let kmers = graph.get_kmers(noisy);
        let corrected = error_correct(&graph, &kmers, &params).expect("a dip was fixed");
        assert_eq!(graph.assemble(&corrected), truth);
    }

    #[test]
    fn clean_walks_are_left_alone() {
        let k = 5;
        let graph = graph(k);
        let truth: &[u8] = b"ATCCGTAGAACTTGGA";
        populate_times(&graph, truth, 5);
        let params = TraversalParams {
            min_kmer_cov: 3,
            ..Default::default()
        };
        let kmers = graph.get_kmers(truth);
        assert!(error_correct(&graph, &kmers, &params).is_none());
    }
}
