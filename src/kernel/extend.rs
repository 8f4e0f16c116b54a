//! Greedy walk extension with branch resolution.
//!
//! At a branch, candidates survive four gates in order: the coverage
//! gradient, tip pruning, paired-k-mer support, and a bounded coverage
//! lookahead. Ties fall back to first-seen A<C<G<T order, which the
//! successor enumeration already provides.

use super::TraversalParams;
use crate::graph::{BloomDbg, Kmer};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendStop {
    DeadEnd,
    Cycle,
    MaxSteps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

/// Extend the walk rightward until a dead end, a cycle, or `max_steps`.
pub fn extend_right(
    graph: &BloomDbg,
    walk: &mut VecDeque<Kmer>,
    visited: &mut HashSet<u64>,
    params: &TraversalParams,
    max_steps: usize,
) -> ExtendStop {
    extend(graph, walk, visited, params, max_steps, Direction::Right)
}

/// Extend the walk leftward through predecessors.
pub fn extend_left(
    graph: &BloomDbg,
    walk: &mut VecDeque<Kmer>,
    visited: &mut HashSet<u64>,
    params: &TraversalParams,
    max_steps: usize,
) -> ExtendStop {
    extend(graph, walk, visited, params, max_steps, Direction::Left)
}

fn extend(
    graph: &BloomDbg,
    walk: &mut VecDeque<Kmer>,
    visited: &mut HashSet<u64>,
    params: &TraversalParams,
    max_steps: usize,
    dir: Direction,
) -> ExtendStop {
    for _ in 0..max_steps {
        let next = match dir {
            Direction::Right => best_successor(graph, walk, params),
            Direction::Left => best_predecessor(graph, walk, params),
        };
        let next = match next {
            Some(kmer) => kmer,
            None => return ExtendStop::DeadEnd,
        };
        if !visited.insert(next.canonical) {
            return ExtendStop::Cycle;
        }
        match dir {
            Direction::Right => walk.push_back(next),
            Direction::Left => walk.push_front(next),
        }
    }
    ExtendStop::MaxSteps
}

/// Pick the surviving successor of the walk tip, if any.
pub fn best_successor(
    graph: &BloomDbg,
    walk: &VecDeque<Kmer>,
    params: &TraversalParams,
) -> Option<Kmer> {
    let tip = walk.back()?;
    let candidates = graph.successors(tip);
    choose(graph, walk, tip, candidates, params, Direction::Right)
}

pub fn best_predecessor(
    graph: &BloomDbg,
    walk: &VecDeque<Kmer>,
    params: &TraversalParams,
) -> Option<Kmer> {
    let tip = walk.front()?;
    let candidates = graph.predecessors(tip);
    choose(graph, walk, tip, candidates, params, Direction::Left)
}

fn choose(
    graph: &BloomDbg,
    walk: &VecDeque<Kmer>,
    tip: &Kmer,
    mut candidates: Vec<Kmer>,
    params: &TraversalParams,
    dir: Direction,
) -> Option<Kmer> {
    if candidates.len() <= 1 {
        return candidates.pop();
    }

    // coverage gradient: a branch far below the tip is an error tip
    let floor = tip.count as f32 * params.max_cov_gradient;
    let surviving: Vec<Kmer> = candidates
        .iter()
        .filter(|c| c.count as f32 >= floor)
        .cloned()
        .collect();
    let mut candidates = if surviving.is_empty() {
        candidates
    } else {
        surviving
    };
    if candidates.len() == 1 {
        return candidates.pop();
    }

    // prune branches that die within the tip length
    let long_enough: Vec<Kmer> = candidates
        .iter()
        .filter(|c| !is_tip(graph, c, params, dir))
        .cloned()
        .collect();
    if !long_enough.is_empty() {
        candidates = long_enough;
    }
    if candidates.len() == 1 {
        return candidates.pop();
    }

    // paired-k-mer link evidence
    let support: Vec<u32> = candidates
        .iter()
        .map(|c| paired_support(graph, walk, c, dir))
        .collect();
    let best_support = *support.iter().max().unwrap();
    if best_support > 0 {
        let supported: Vec<Kmer> = candidates
            .iter()
            .zip(&support)
            .filter(|(_, &s)| s == best_support)
            .map(|(c, _)| c.clone())
            .collect();
        candidates = supported;
    }
    if candidates.len() == 1 {
        return candidates.pop();
    }

    // coverage lookahead; ties keep first-seen A<C<G<T order
    let mut best: Option<(u64, Kmer)> = None;
    for cand in candidates {
        let score = lookahead_score(graph, &cand, params.lookahead, dir);
        let better = best.as_ref().map_or(true, |(top, _)| score > *top);
        if better {
            best = Some((score, cand));
        }
    }
    best.map(|(_, kmer)| kmer)
}

/// Cumulative coverage of the best greedy path of `depth` k-mers
/// starting at `seed`.
fn lookahead_score(graph: &BloomDbg, seed: &Kmer, depth: usize, dir: Direction) -> u64 {
    let mut score = seed.count as u64;
    let mut cur = seed.clone();
    let mut seen = HashSet::new();
    seen.insert(cur.canonical);
    for _ in 0..depth {
        let nexts = match dir {
            Direction::Right => graph.successors(&cur),
            Direction::Left => graph.predecessors(&cur),
        };
        let next = nexts
            .into_iter()
            .filter(|n| !seen.contains(&n.canonical))
            .max_by_key(|n| n.count);
        match next {
            Some(n) => {
                score += n.count as u64;
                seen.insert(n.canonical);
                cur = n;
            }
            None => break,
        }
    }
    score
}

/// A candidate branch is a tip when its unbranched continuation dies
/// within `max_tip_length` k-mers.
fn is_tip(graph: &BloomDbg, start: &Kmer, params: &TraversalParams, dir: Direction) -> bool {
    let mut cur = start.clone();
    let mut seen = HashSet::new();
    seen.insert(cur.canonical);
    for _ in 0..params.max_tip_length {
        let mut nexts = match dir {
            Direction::Right => graph.successors(&cur),
            Direction::Left => graph.predecessors(&cur),
        };
        nexts.retain(|n| !seen.contains(&n.canonical));
        match nexts.len() {
            0 => return true,
            1 => {
                cur = nexts.pop().unwrap();
                seen.insert(cur.canonical);
            }
            // the branch keeps branching; not a simple tip
            _ => return false,
        }
    }
    false
}

/// Link evidence for appending/prepending `candidate` to the walk:
/// paired keys tested at the configured distances with gaps 0, 1, 2.
fn paired_support(
    graph: &BloomDbg,
    walk: &VecDeque<Kmer>,
    candidate: &Kmer,
    dir: Direction,
) -> u32 {
    let config = graph.config();
    let mut support = 0u32;
    for &distance in &[config.d_read, config.d_frag] {
        for gap in 0..3usize {
            let d = distance + gap;
            match dir {
                Direction::Right => {
                    // candidate would sit at index len(walk)
                    if walk.len() >= d {
                        let partner = &walk[walk.len() - d];
                        if graph.contains_paired_read(partner, candidate)
                            || graph.contains_paired_frag(partner, candidate)
                        {
                            support += 1;
                        }
                    }
                }
                Direction::Left => {
                    // candidate would sit at index -1
                    if walk.len() >= d {
                        let partner = &walk[d - 1];
                        if graph.contains_paired_read(candidate, partner)
                            || graph.contains_paired_frag(candidate, partner)
                        {
                            support += 1;
                        }
                    }
                }
            }
        }
    }
    support
}

/// Seed a walk from a k-mer list, registering every canonical hash for
/// cycle detection.
pub fn seed_walk(kmers: Vec<Kmer>) -> (VecDeque<Kmer>, HashSet<u64>) {
    let mut visited = HashSet::with_capacity(kmers.len() * 2);
    for kmer in &kmers {
        visited.insert(kmer.canonical);
    }
    (kmers.into(), visited)
}
