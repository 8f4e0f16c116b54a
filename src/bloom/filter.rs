use super::bitvec::BitVector;
use crate::error::{AsmError, Result};
use crate::hashing::{fill_hashes, MAX_NUM_HASHES};
use std::f64::consts::LN_2;

/// Optimal bit count for `n` expected keys at the target false-positive
/// rate.
pub fn optimal_bits(n: u64, fpr: f64) -> u64 {
    ((-(n as f64) * fpr.ln()) / (LN_2 * LN_2)).ceil() as u64
}

/// Optimal hash count for a filter of `bits` holding `n` keys.
pub fn optimal_num_hashes(bits: u64, n: u64) -> usize {
    let m = ((bits as f64 / n.max(1) as f64) * LN_2).round() as usize;
    m.clamp(1, MAX_NUM_HASHES)
}

/// Plain Bloom filter. Adds are monotone; membership may false-positive
/// within the configured bound, never false-negative.
pub struct BloomFilter {
    bits: BitVector,
    num_hashes: usize,
}

impl BloomFilter {
    pub fn with_size(bits: u64, num_hashes: usize) -> Result<Self> {
        if num_hashes == 0 || num_hashes > MAX_NUM_HASHES {
            return Err(AsmError::Config(format!(
                "hash count {} out of range 1..={}",
                num_hashes, MAX_NUM_HASHES
            )));
        }
        Ok(Self {
            bits: BitVector::new(bits)?,
            num_hashes,
        })
    }

    pub fn with_capacity(n: u64, fpr: f64) -> Result<Self> {
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(AsmError::Config(format!("false-positive rate {}", fpr)));
        }
        let bits = optimal_bits(n, fpr);
        Self::with_size(bits, optimal_num_hashes(bits, n))
    }

    /// Set every position of a precomputed hash array.
    pub fn add_hashes(&self, hashes: &[u64]) {
        for &h in &hashes[..self.num_hashes] {
            self.bits.set(h % self.bits.len());
        }
    }

    /// True iff every position of the hash array is set.
    pub fn contains_hashes(&self, hashes: &[u64]) -> bool {
        hashes[..self.num_hashes]
            .iter()
            .all(|&h| self.bits.get(h % self.bits.len()))
    }

    pub fn insert(&self, key: u64) {
        let mut hashes = [0u64; MAX_NUM_HASHES];
        fill_hashes(key, &mut hashes[..self.num_hashes]);
        self.add_hashes(&hashes);
    }

    pub fn check(&self, key: u64) -> bool {
        let mut hashes = [0u64; MAX_NUM_HASHES];
        fill_hashes(key, &mut hashes[..self.num_hashes]);
        self.contains_hashes(&hashes)
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn bit_len(&self) -> u64 {
        self.bits.len()
    }

    /// Fraction of set bits.
    pub fn occupancy(&self) -> f64 {
        self.bits.popcount() as f64 / self.bits.len() as f64
    }

    /// `(popcount/N)^m`, the runtime health estimate.
    pub fn estimated_fpr(&self) -> f64 {
        self.occupancy().powi(self.num_hashes as i32)
    }

    pub(crate) fn bits(&self) -> &BitVector {
        &self.bits
    }
}
