use crate::error::{AsmError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Words per block. 2^25 words = 2^31 bits = 256 MiB, so indices well
/// past 2^34 bits stay reachable while each allocation stays bounded.
const BLOCK_WORDS: usize = 1 << 25;

/// Bytes per counter block.
const BLOCK_BYTES: usize = 1 << 28;

fn alloc_failed(bytes: u64) -> AsmError {
    AsmError::Resource { requested: bytes }
}

/// Block-striped atomic bit array. Writes are idempotent word-level ORs;
/// reads take no synchronization.
pub struct BitVector {
    blocks: Vec<Box<[AtomicU64]>>,
    bits: u64,
}

impl BitVector {
    pub fn new(bits: u64) -> Result<Self> {
        if bits == 0 {
            return Err(AsmError::Config("bit vector of size 0".into()));
        }
        let words = bits.div_ceil(64) as usize;
        let mut blocks = Vec::new();
        let mut remaining = words;
        while remaining > 0 {
            let take = remaining.min(BLOCK_WORDS);
            let mut block = Vec::new();
            block
                .try_reserve_exact(take)
                .map_err(|_| alloc_failed(bits / 8))?;
            block.resize_with(take, || AtomicU64::new(0));
            blocks.push(block.into_boxed_slice());
            remaining -= take;
        }
        Ok(Self { blocks, bits })
    }

    #[inline(always)]
    fn slot(&self, idx: u64) -> (&AtomicU64, u64) {
        debug_assert!(idx < self.bits);
        let word = (idx / 64) as usize;
        let mask = 1u64 << (idx % 64);
        (&self.blocks[word / BLOCK_WORDS][word % BLOCK_WORDS], mask)
    }

    /// Set one bit; returns true when the bit was previously clear.
    #[inline]
    pub fn set(&self, idx: u64) -> bool {
        let (word, mask) = self.slot(idx);
        word.fetch_or(mask, Ordering::Relaxed) & mask == 0
    }

    #[inline]
    pub fn get(&self, idx: u64) -> bool {
        let (word, mask) = self.slot(idx);
        word.load(Ordering::Relaxed) & mask != 0
    }

    pub fn len(&self) -> u64 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Recomputed on demand; population races make it momentarily stale
    /// but never wrong after a barrier.
    pub fn popcount(&self) -> u64 {
        self.blocks
            .par_iter()
            .map(|block| {
                block
                    .iter()
                    .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
                    .sum::<u64>()
            })
            .sum()
    }

    pub fn word_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    #[inline]
    pub fn load_word(&self, word: usize) -> u64 {
        self.blocks[word / BLOCK_WORDS][word % BLOCK_WORDS].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store_word(&self, word: usize, value: u64) {
        self.blocks[word / BLOCK_WORDS][word % BLOCK_WORDS].store(value, Ordering::Relaxed);
    }
}

/// Block-striped atomic byte array backing the counting filter.
pub struct ByteVector {
    blocks: Vec<Box<[AtomicU8]>>,
    bytes: u64,
}

impl ByteVector {
    pub fn new(bytes: u64) -> Result<Self> {
        if bytes == 0 {
            return Err(AsmError::Config("counter array of size 0".into()));
        }
        let mut blocks = Vec::new();
        let mut remaining = bytes as usize;
        while remaining > 0 {
            let take = remaining.min(BLOCK_BYTES);
            let mut block = Vec::new();
            block
                .try_reserve_exact(take)
                .map_err(|_| alloc_failed(bytes))?;
            block.resize_with(take, || AtomicU8::new(0));
            blocks.push(block.into_boxed_slice());
            remaining -= take;
        }
        Ok(Self { blocks, bytes })
    }

    #[inline(always)]
    pub fn cell(&self, idx: u64) -> &AtomicU8 {
        debug_assert!(idx < self.bytes);
        &self.blocks[(idx as usize) / BLOCK_BYTES][(idx as usize) % BLOCK_BYTES]
    }

    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn nonzero_count(&self) -> u64 {
        self.blocks
            .par_iter()
            .map(|block| {
                block
                    .iter()
                    .filter(|c| c.load(Ordering::Relaxed) != 0)
                    .count() as u64
            })
            .sum()
    }

    #[inline]
    pub fn load_byte(&self, idx: u64) -> u8 {
        self.cell(idx).load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store_byte(&self, idx: u64, value: u8) {
        self.cell(idx).store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let bv = BitVector::new(1000).unwrap();
        assert!(!bv.get(0));
        assert!(bv.set(0));
        assert!(bv.get(0));
        // second set reports already-present
        assert!(!bv.set(0));
        assert_eq!(bv.popcount(), 1);
    }

    #[test]
    fn bits_straddle_words() {
        let bv = BitVector::new(130).unwrap();
        for idx in [0u64, 63, 64, 127, 128, 129] {
            assert!(bv.set(idx));
            assert!(bv.get(idx));
        }
        assert_eq!(bv.popcount(), 6);
    }

    #[test]
    fn zero_size_is_a_config_error() {
        assert!(BitVector::new(0).is_err());
        assert!(ByteVector::new(0).is_err());
    }

    #[test]
    fn byte_cells_round_trip() {
        let cv = ByteVector::new(512).unwrap();
        cv.store_byte(511, 42);
        assert_eq!(cv.load_byte(511), 42);
        assert_eq!(cv.nonzero_count(), 1);
    }
}
