use super::filter::BloomFilter;
use crate::error::Result;
use crate::hashing::combine_paired;

/// Paired-keys filter: one plain filter per half plus one over the
/// combined key, all sharing a geometry. A pair is reported present only
/// when all three filters agree, which drives the joint false-positive
/// rate toward the cube of a single filter's.
pub struct PairedBloomFilter {
    left: BloomFilter,
    right: BloomFilter,
    combined: BloomFilter,
}

impl PairedBloomFilter {
    pub fn with_size(bits_each: u64, num_hashes: usize) -> Result<Self> {
        Ok(Self {
            left: BloomFilter::with_size(bits_each, num_hashes)?,
            right: BloomFilter::with_size(bits_each, num_hashes)?,
            combined: BloomFilter::with_size(bits_each, num_hashes)?,
        })
    }

    pub fn add(&self, a: u64, b: u64) {
        self.left.insert(a);
        self.right.insert(b);
        self.combined.insert(combine_paired(a, b));
    }

    pub fn contains(&self, a: u64, b: u64) -> bool {
        self.left.check(a) && self.right.check(b) && self.combined.check(combine_paired(a, b))
    }

    pub fn num_hashes(&self) -> usize {
        self.combined.num_hashes()
    }

    pub fn bit_len_each(&self) -> u64 {
        self.combined.bit_len()
    }

    pub fn occupancy(&self) -> f64 {
        self.combined.occupancy()
    }

    /// Joint estimate across the three member filters.
    pub fn estimated_fpr(&self) -> f64 {
        self.left.estimated_fpr() * self.right.estimated_fpr() * self.combined.estimated_fpr()
    }

    pub(crate) fn parts(&self) -> [&BloomFilter; 3] {
        [&self.left, &self.right, &self.combined]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_pairs_are_found() {
        let pkbf = PairedBloomFilter::with_size(1 << 16, 3).unwrap();
        pkbf.add(11, 22);
        assert!(pkbf.contains(11, 22));
        // order matters
        assert!(!pkbf.contains(22, 11));
    }

    #[test]
    fn joint_false_positives_below_single_filter() {
        let pkbf = PairedBloomFilter::with_size(1 << 14, 2).unwrap();
        for key in 0..2_000u64 {
            pkbf.add(key, key.wrapping_add(1));
        }
        let single_fpr = pkbf.parts()[2].estimated_fpr();
        let joint_hits = (100_000..110_000u64)
            .filter(|&a| pkbf.contains(a, a.wrapping_mul(3)))
            .count();
        let joint_fpr = joint_hits as f64 / 10_000.0;
        assert!(
            joint_fpr <= single_fpr,
            "joint {} vs single {}",
            joint_fpr,
            single_fpr
        );
    }
}
