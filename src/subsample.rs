//! Input redundancy screening.
//!
//! A counting filter keyed by sequence signatures decides which inputs
//! enter the pipeline at all. Three signature schemes are available;
//! all share the policy that an admitted sequence contributes every one
//! of its signatures, making the filter a monotone coverage tracker.

use crate::bloom::CountingBloomFilter;
use crate::error::Result;
use crate::hashing::{canonical, combine_paired, strobe_hashes, KmerHasher};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
pub enum SignatureScheme {
    /// Window minimizers over the canonical rolling hashes.
    Minimizer { window: usize },
    /// Paired-k-mer keys at offsets k, k+1, k+2.
    KmerPair,
    /// Order-2 strobe keys; a fully seen strobe cover marks redundancy
    /// end-to-end.
    Strobemer { w_min: usize, w_max: usize },
}

/// Monotonic deque emitting the window minimum as it changes.
struct MinimizerWindow {
    queue: VecDeque<(usize, u64)>,
    capacity: usize,
    count: usize,
}

impl MinimizerWindow {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            count: 0,
        }
    }

    fn next(&mut self, hash: u64) -> Option<u64> {
        if self.capacity == 1 {
            return Some(hash);
        }
        while let Some(&(_, back)) = self.queue.back() {
            if back > hash {
                self.queue.pop_back();
            } else {
                break;
            }
        }
        let mut changed = false;
        if (self.queue.is_empty() && self.count >= self.capacity) || self.count == self.capacity {
            changed = true;
        }
        self.queue.push_back((self.count, hash));
        while self
            .queue
            .front()
            .map_or(false, |&(pos, _)| {
                self.count >= self.capacity && pos < self.count - self.capacity
            })
        {
            self.queue.pop_front();
            changed = true;
        }
        self.count += 1;
        if changed {
            self.queue.front().map(|&(_, h)| h)
        } else {
            None
        }
    }

    fn clear(&mut self) {
        self.count = 0;
        self.queue.clear();
    }
}

pub struct RedundancyFilter {
    cbf: CountingBloomFilter,
    scheme: SignatureScheme,
    k: usize,
    stranded: bool,
    /// A signature counted at most this often is still "new".
    max_multiplicity: u8,
    /// Longest tolerated run of seen signatures.
    max_seen_chain: usize,
}

impl RedundancyFilter {
    pub fn new(
        counters: u64,
        num_hashes: usize,
        scheme: SignatureScheme,
        k: usize,
        stranded: bool,
        max_multiplicity: u8,
        max_seen_chain: usize,
    ) -> Result<Self> {
        Ok(Self {
            cbf: CountingBloomFilter::with_size(counters, num_hashes)?,
            scheme,
            k,
            stranded,
            max_multiplicity,
            max_seen_chain,
        })
    }

    /// Canonical hashes split into break-free segments.
    fn canonical_segments(&self, seq: &[u8]) -> Vec<Vec<u64>> {
        let mut segments = Vec::new();
        let mut cur: Vec<u64> = Vec::new();
        let mut last_pos = 0usize;
        let mut hasher = KmerHasher::new(seq, self.k);
        while hasher.roll() {
            let pos = hasher.pos();
            if !cur.is_empty() && pos != last_pos + 1 {
                segments.push(std::mem::take(&mut cur));
            }
            last_pos = pos;
            let h = if self.stranded {
                hasher.forward_hash()
            } else {
                canonical(hasher.forward_hash(), hasher.reverse_hash())
            };
            cur.push(h);
        }
        if !cur.is_empty() {
            segments.push(cur);
        }
        segments
    }

    pub fn signatures(&self, seq: &[u8]) -> Vec<u64> {
        match self.scheme {
            SignatureScheme::Minimizer { window } => {
                let mut out = Vec::new();
                let mut mw = MinimizerWindow::new(window.max(1));
                for segment in self.canonical_segments(seq) {
                    mw.clear();
                    for h in segment {
                        if let Some(min) = mw.next(h) {
                            out.push(min);
                        }
                    }
                }
                out
            }
            SignatureScheme::KmerPair => {
                let mut out = Vec::new();
                for segment in self.canonical_segments(seq) {
                    for offset in [self.k, self.k + 1, self.k + 2] {
                        for i in 0..segment.len().saturating_sub(offset) {
                            out.push(combine_paired(segment[i], segment[i + offset]));
                        }
                    }
                }
                out
            }
            SignatureScheme::Strobemer { w_min, w_max } => {
                strobe_hashes(seq, self.k, w_min, w_max, self.stranded)
            }
        }
    }

    /// Does the keep-criterion hold for these signatures?
    fn judge(&self, sigs: &[u64]) -> bool {
        if sigs.is_empty() {
            return false;
        }
        if let SignatureScheme::Strobemer { w_min: _, w_max } = self.scheme {
            return !self.strobes_cover_everything(sigs, w_max);
        }
        let mut new_count = 0usize;
        let mut chain = 0usize;
        let mut longest_chain = 0usize;
        for &sig in sigs {
            if self.cbf.count(sig) <= self.max_multiplicity {
                new_count += 1;
                chain = 0;
            } else {
                chain += 1;
                longest_chain = longest_chain.max(chain);
            }
        }
        new_count >= 1 && longest_chain <= self.max_seen_chain
    }

    /// Merge the spans of seen strobes; redundant iff the merged cover
    /// reaches end to end.
    fn strobes_cover_everything(&self, sigs: &[u64], span: usize) -> bool {
        let mut covered_to = 0usize; // exclusive
        for (i, &sig) in sigs.iter().enumerate() {
            if self.cbf.count(sig) > self.max_multiplicity {
                if i > covered_to {
                    return false; // gap before this interval
                }
                covered_to = covered_to.max(i + span + 1);
            }
        }
        covered_to >= sigs.len()
    }

    /// Judge the sequence; admitted sequences contribute all their
    /// signatures to the filter.
    pub fn admit(&self, seq: &[u8]) -> bool {
        let sigs = self.signatures(seq);
        if !self.judge(&sigs) {
            return false;
        }
        for sig in sigs {
            self.cbf.increment(sig);
        }
        true
    }

    pub fn occupancy(&self) -> f64 {
        self.cbf.occupancy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQ: &[u8] = b"TTTCCTCATGCAATTCAAAACCATGTCCGTAATGTAGGCGAAATAGTAAACCATTTTACG";

    fn filter(scheme: SignatureScheme) -> RedundancyFilter {
        RedundancyFilter::new(1 << 20, 3, scheme, 11, false, 1, 2).unwrap()
    }

    #[test]
    fn repeats_get_rejected_eventually() {
        let filter = filter(SignatureScheme::Minimizer { window: 5 });
        assert!(filter.admit(SEQ));
        assert!(filter.admit(SEQ)); // counts at 1, still within multiplicity
        assert!(!filter.admit(SEQ)); // now every minimizer is seen
    }

    #[test]
    fn novel_sequences_pass() {
        let filter = filter(SignatureScheme::Minimizer { window: 5 });
        assert!(filter.admit(SEQ));
        let other = b"ACCAGTTACAGGATCCGTTGGAACCTTGAGACAGTTACCACGGATTTACCAGGGTTACAG";
        assert!(filter.admit(other));
    }

    #[test]
    fn kmer_pair_scheme_flags_repeats() {
        let filter = filter(SignatureScheme::KmerPair);
        assert!(filter.admit(SEQ));
        assert!(filter.admit(SEQ));
        assert!(!filter.admit(SEQ));
    }

    #[test]
    fn strobemer_scheme_flags_full_covers() {
        let filter = filter(SignatureScheme::Strobemer { w_min: 2, w_max: 8 });
        assert!(filter.admit(SEQ));
        assert!(filter.admit(SEQ));
        assert!(!filter.admit(SEQ));
    }

    #[test]
    fn too_short_or_broken_input_is_dropped() {
        let filter = filter(SignatureScheme::Minimizer { window: 5 });
        assert!(!filter.admit(b"ACGT"));
        assert!(!filter.admit(b"NNNNNNNNNNNNNNNN"));
    }
}
