use super::{canonical, combine_paired, KmerHasher};

#[inline]
fn secondary(anchor: u64, candidate: u64) -> u64 {
    seahash::hash(&(anchor ^ candidate).to_le_bytes())
}

/// Order-2 strobe hashes: every window is an anchor, and its strobe is
/// the downstream window in `[pos+w_min, pos+w_max]` minimizing a
/// secondary hash. Emits `combine(anchor, strobe)` per anchor that has a
/// full selection range. Window breaks truncate the range.
pub fn strobe_hashes(
    seq: &[u8],
    k: usize,
    w_min: usize,
    w_max: usize,
    stranded: bool,
) -> Vec<u64> {
    debug_assert!(w_min >= 1 && w_min <= w_max);
    if seq.len() < k {
        return Vec::new();
    }

    // canonical hash per window start, None across breaks
    let mut per_pos: Vec<Option<u64>> = vec![None; seq.len() - k + 1];
    let mut hasher = KmerHasher::new(seq, k);
    while hasher.roll() {
        let h = if stranded {
            hasher.forward_hash()
        } else {
            canonical(hasher.forward_hash(), hasher.reverse_hash())
        };
        per_pos[hasher.pos()] = Some(h);
    }

    let mut out = Vec::new();
    for pos in 0..per_pos.len() {
        let anchor = match per_pos[pos] {
            Some(h) => h,
            None => continue,
        };
        let hi = (pos + w_max).min(per_pos.len() - 1);
        if pos + w_min > hi {
            continue;
        }
        let mut best: Option<(u64, u64)> = None;
        for cand in per_pos[pos + w_min..=hi].iter().flatten() {
            let score = secondary(anchor, *cand);
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, *cand));
            }
        }
        if let Some((_, strobe)) = best {
            out.push(combine_paired(anchor, strobe));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_selection() {
        let seq = b"ACGTACGGTTACACGGTTAA";
        let a = strobe_hashes(seq, 5, 2, 6, false);
        let b = strobe_hashes(seq, 5, 2, 6, false);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn too_short_for_a_strobe() {
        assert!(strobe_hashes(b"ACGTA", 5, 2, 6, false).is_empty());
    }
}
