use super::{base_code, complement_code, seed_rot, srol, sror, SEEDS};

/// Rolling hasher over one sequence. Any byte outside {A,C,G,T} (an `N`
/// or a quality-masked base) breaks the window: the hasher re-seeds at
/// the next clean window on its own.
pub struct KmerHasher<'a> {
    seq: &'a [u8],
    k: usize,
    pos: usize,
    initialized: bool,
    fwd: u64,
    rev: u64,
}

impl<'a> KmerHasher<'a> {
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        Self {
            seq,
            k,
            pos: 0,
            initialized: false,
            fwd: 0,
            rev: 0,
        }
    }

    /// Advance to the next valid window. Returns false when the
    /// sequence is exhausted.
    pub fn roll(&mut self) -> bool {
        if !self.initialized {
            return self.init();
        }
        if self.pos + self.k >= self.seq.len() {
            return false;
        }
        let incoming = self.seq[self.pos + self.k];
        let code_in = match base_code(incoming) {
            Some(code) => code,
            None => {
                // restart past the breaking byte
                self.pos += self.k;
                return self.init();
            }
        };
        let code_out = base_code(self.seq[self.pos]).expect("window invariant");
        self.fwd = next_forward_hash(self.fwd, self.k, code_out, code_in);
        self.rev = next_reverse_hash(self.rev, self.k, code_out, code_in);
        self.pos += 1;
        true
    }

    /// Start index of the current window.
    #[inline(always)]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn forward_hash(&self) -> u64 {
        self.fwd
    }

    #[inline(always)]
    pub fn reverse_hash(&self) -> u64 {
        self.rev
    }

    #[inline(always)]
    pub fn window(&self) -> &'a [u8] {
        &self.seq[self.pos..self.pos + self.k]
    }

    fn init(&mut self) -> bool {
        let k = self.k;
        if k == 0 || self.seq.len() < k {
            return false;
        }
        while self.pos + k <= self.seq.len() {
            if let Some(idx) = last_invalid_base(&self.seq[self.pos..self.pos + k]) {
                self.pos += idx + 1;
                continue;
            }
            self.fwd = base_forward_hash(&self.seq[self.pos..self.pos + k]);
            self.rev = base_reverse_hash(&self.seq[self.pos..self.pos + k]);
            self.initialized = true;
            return true;
        }
        false
    }
}

/// Rightmost invalid byte of the window, if any. Scanning from the right
/// lets the caller skip the whole poisoned stretch at once.
#[inline]
fn last_invalid_base(window: &[u8]) -> Option<usize> {
    window.iter().rposition(|&c| base_code(c).is_none())
}

#[inline]
pub fn base_forward_hash(window: &[u8]) -> u64 {
    let mut h = 0u64;
    for &c in window {
        h = srol(h) ^ SEEDS[base_code(c).expect("clean window") as usize];
    }
    h
}

#[inline]
pub fn base_reverse_hash(window: &[u8]) -> u64 {
    let mut h = 0u64;
    for &c in window.iter().rev() {
        let code = complement_code(base_code(c).expect("clean window"));
        h = srol(h) ^ SEEDS[code as usize];
    }
    h
}

#[inline(always)]
pub fn next_forward_hash(prev: u64, k: usize, code_out: u8, code_in: u8) -> u64 {
    srol(prev) ^ SEEDS[code_in as usize] ^ seed_rot(code_out, k as u32)
}

#[inline(always)]
pub fn prev_forward_hash(prev: u64, k: usize, code_out: u8, code_in: u8) -> u64 {
    sror(prev ^ seed_rot(code_in, k as u32) ^ SEEDS[code_out as usize])
}

#[inline(always)]
pub fn next_reverse_hash(prev: u64, k: usize, code_out: u8, code_in: u8) -> u64 {
    sror(prev ^ seed_rot(complement_code(code_in), k as u32) ^ SEEDS[complement_code(code_out) as usize])
}

#[inline(always)]
pub fn prev_reverse_hash(prev: u64, k: usize, code_out: u8, code_in: u8) -> u64 {
    srol(prev) ^ SEEDS[complement_code(code_in) as usize] ^ seed_rot(complement_code(code_out), k as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{canonical, reverse_complement};

    #[test]
    fn rolling_matches_fresh_hash() {
        let seq = b"ACGTACGTTGCA";
        let k = 5;
        let mut hasher = KmerHasher::new(seq, k);
        while hasher.roll() {
            let window = hasher.window();
            assert_eq!(hasher.forward_hash(), base_forward_hash(window));
            assert_eq!(hasher.reverse_hash(), base_reverse_hash(window));
        }
    }

    #[test]
    fn reverse_hash_is_forward_of_revcomp() {
        let seq = b"ACGGTTACA";
        let k = 6;
        let mut hasher = KmerHasher::new(seq, k);
        while hasher.roll() {
            let rc = reverse_complement(hasher.window());
            assert_eq!(hasher.reverse_hash(), base_forward_hash(&rc));
        }
    }

    #[test]
    fn canonical_ignores_strand() {
        let seq = b"ACGGTTAC";
        let rc = reverse_complement(seq);
        let mut fh = KmerHasher::new(seq, seq.len());
        let mut rh = KmerHasher::new(&rc, rc.len());
        assert!(fh.roll());
        assert!(rh.roll());
        assert_eq!(
            canonical(fh.forward_hash(), fh.reverse_hash()),
            canonical(rh.forward_hash(), rh.reverse_hash())
        );
    }

    #[test]
    fn n_base_splits_windows() {
        let seq = b"ACGTNACGT";
        let mut hasher = KmerHasher::new(seq, 4);
        let mut positions = Vec::new();
        while hasher.roll() {
            positions.push(hasher.pos());
        }
        assert_eq!(positions, vec![0, 5]);
    }

    #[test]
    fn short_sequence_yields_nothing() {
        let mut hasher = KmerHasher::new(b"ACG", 4);
        assert!(!hasher.roll());
    }

    #[test]
    fn length_k_yields_one_window() {
        let mut hasher = KmerHasher::new(b"ACGT", 4);
        assert!(hasher.roll());
        assert!(!hasher.roll());
    }
}
