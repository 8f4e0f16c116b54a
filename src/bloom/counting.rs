use super::bitvec::ByteVector;
use crate::error::{AsmError, Result};
use crate::hashing::{fill_hashes, MAX_NUM_HASHES};
use std::sync::atomic::Ordering;

/// Counting Bloom filter over saturating 8-bit counters.
///
/// Insertions use the conservative update: only counters sitting at the
/// observed minimum are bumped, so a reported count never exceeds the
/// number of insertions whose keys share those positions. A lost
/// compare-exchange race means another worker already bumped the cell;
/// the count stays an under-approximation of the update and the filter
/// stays sound.
pub struct CountingBloomFilter {
    counters: ByteVector,
    num_hashes: usize,
}

impl CountingBloomFilter {
    pub fn with_size(counters: u64, num_hashes: usize) -> Result<Self> {
        if num_hashes == 0 || num_hashes > MAX_NUM_HASHES {
            return Err(AsmError::Config(format!(
                "hash count {} out of range 1..={}",
                num_hashes, MAX_NUM_HASHES
            )));
        }
        Ok(Self {
            counters: ByteVector::new(counters)?,
            num_hashes,
        })
    }

    /// Minimum counter over the hash positions.
    pub fn count_hashes(&self, hashes: &[u64]) -> u8 {
        hashes[..self.num_hashes]
            .iter()
            .map(|&h| self.counters.load_byte(h % self.counters.len()))
            .min()
            .unwrap_or(0)
    }

    /// Conservative update; returns the minimum after the bump.
    pub fn increment_hashes(&self, hashes: &[u64]) -> u8 {
        let len = self.counters.len();
        let floor = self.count_hashes(hashes);
        if floor == u8::MAX {
            return floor;
        }
        for &h in &hashes[..self.num_hashes] {
            let cell = self.counters.cell(h % len);
            // bump only cells still at the floor; losers raced with a
            // concurrent increment and are already past it
            let _ = cell.compare_exchange(floor, floor + 1, Ordering::Relaxed, Ordering::Relaxed);
        }
        self.count_hashes(hashes)
    }

    pub fn increment(&self, key: u64) -> u8 {
        let mut hashes = [0u64; MAX_NUM_HASHES];
        fill_hashes(key, &mut hashes[..self.num_hashes]);
        self.increment_hashes(&hashes)
    }

    pub fn count(&self, key: u64) -> u8 {
        let mut hashes = [0u64; MAX_NUM_HASHES];
        fill_hashes(key, &mut hashes[..self.num_hashes]);
        self.count_hashes(&hashes)
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn counter_len(&self) -> u64 {
        self.counters.len()
    }

    /// Fraction of non-zero counters.
    pub fn occupancy(&self) -> f64 {
        self.counters.nonzero_count() as f64 / self.counters.len() as f64
    }

    pub fn estimated_fpr(&self) -> f64 {
        self.occupancy().powi(self.num_hashes as i32)
    }

    pub(crate) fn counters(&self) -> &ByteVector {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_increase_monotonically() {
        let cbf = CountingBloomFilter::with_size(1 << 16, 4).unwrap();
        assert_eq!(cbf.count(7), 0);
        for expected in 1..=10u8 {
            assert_eq!(cbf.increment(7), expected);
        }
        assert_eq!(cbf.count(7), 10);
    }

    #[test]
    fn saturates_at_255() {
        let cbf = CountingBloomFilter::with_size(1 << 12, 3).unwrap();
        for _ in 0..300 {
            cbf.increment(42);
        }
        assert_eq!(cbf.count(42), u8::MAX);
    }

    #[test]
    fn conservative_update_is_sound() {
        let cbf = CountingBloomFilter::with_size(1 << 16, 4).unwrap();
        for key in 0..64u64 {
            cbf.increment(key);
        }
        // no key was inserted more than once, so no count may exceed
        // the insertions sharing its positions
        for key in 0..64u64 {
            assert!(cbf.count(key) >= 1);
        }
        assert_eq!(cbf.count(9999), 0);
    }

    #[test]
    fn concurrent_increments_stay_sound() {
        use std::sync::Arc;
        let cbf = Arc::new(CountingBloomFilter::with_size(1 << 16, 4).unwrap());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cbf = Arc::clone(&cbf);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    cbf.increment(1234);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let count = cbf.count(1234);
        assert!(count >= 50, "count {} lost too many updates", count);
        assert!(count <= 200);
    }
}
