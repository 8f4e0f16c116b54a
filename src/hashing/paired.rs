use super::{canonical, combine_paired, KmerHasher};
use std::collections::VecDeque;

/// Rolls two cursors at a fixed distance: the head is the current
/// window, the tail sits `distance` windows behind. Window breaks (an N
/// in between) clear the lag buffer so a pair never spans a break.
pub struct PairedHasher<'a> {
    inner: KmerHasher<'a>,
    distance: usize,
    stranded: bool,
    ring: VecDeque<u64>,
    last_pos: usize,
}

impl<'a> PairedHasher<'a> {
    pub fn new(seq: &'a [u8], k: usize, distance: usize, stranded: bool) -> Self {
        Self {
            inner: KmerHasher::new(seq, k),
            distance,
            stranded,
            ring: VecDeque::with_capacity(distance + 1),
            last_pos: 0,
        }
    }

    /// Advance until a full pair is buffered. Returns false at the end
    /// of the sequence.
    pub fn roll(&mut self) -> bool {
        loop {
            if !self.inner.roll() {
                return false;
            }
            let pos = self.inner.pos();
            if !self.ring.is_empty() && pos != self.last_pos + 1 {
                self.ring.clear();
            }
            self.last_pos = pos;

            let h = if self.stranded {
                self.inner.forward_hash()
            } else {
                canonical(self.inner.forward_hash(), self.inner.reverse_hash())
            };
            self.ring.push_back(h);
            if self.ring.len() > self.distance + 1 {
                self.ring.pop_front();
            }
            if self.ring.len() == self.distance + 1 {
                return true;
            }
        }
    }

    /// Canonical hashes of (tail, head), i.e. `(K_i, K_{i+d})`.
    pub fn pair(&self) -> (u64, u64) {
        (*self.ring.front().unwrap(), *self.ring.back().unwrap())
    }

    /// Combined key of the buffered pair.
    pub fn combined(&self) -> u64 {
        let (tail, head) = self.pair();
        combine_paired(tail, head)
    }

    /// Start index of the head window.
    pub fn head_pos(&self) -> usize {
        self.inner.pos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pair_spans_the_distance() {
        // k=4, d=3: first pair is (K_0, K_3)
        let seq = b"AAAACCCCGGGG";
        let mut hasher = PairedHasher::new(seq, 4, 3, false);
        assert!(hasher.roll());
        assert_eq!(hasher.head_pos(), 3);

        let single = |s: &[u8]| {
            let mut h = KmerHasher::new(s, 4);
            assert!(h.roll());
            canonical(h.forward_hash(), h.reverse_hash())
        };
        let (tail, head) = hasher.pair();
        assert_eq!(tail, single(b"AAAA"));
        assert_eq!(head, single(b"ACCC"));
    }

    #[test]
    fn break_clears_the_lag() {
        let seq = b"AAAACCNCCGGGGTTTT";
        let mut hasher = PairedHasher::new(seq, 4, 3, false);
        let mut head_positions = Vec::new();
        while hasher.roll() {
            head_positions.push(hasher.head_pos());
        }
        // the first segment is too short for a pair; windows restart at
        // 7 and the lag refills, so the first head sits at 7 + 3
        assert_eq!(head_positions, vec![10, 11, 12, 13]);
    }
}
