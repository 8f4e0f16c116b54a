//! Output-side screening: online deduplication against already-emitted
//! k-mers, reverse-complement palindrome trimming, and chimera flags.

use super::correct::banded_identity;
use super::TraversalParams;
use crate::bloom::BloomFilter;
use crate::error::Result;
use crate::graph::{BloomDbg, Kmer};
use crate::hashing::reverse_complement;

/// Plain Bloom filter over every k-mer already written to output.
///
/// The representation check and the insertion after emission are not
/// atomic; two workers racing on near-identical candidates may both
/// emit. That duplicate rate rides the same dial as the filter FPR and
/// is accepted.
pub struct ScreeningFilter {
    filter: BloomFilter,
    bits: u64,
    num_hashes: usize,
}

impl ScreeningFilter {
    pub fn new(bits: u64, num_hashes: usize) -> Result<Self> {
        Ok(Self {
            filter: BloomFilter::with_size(bits, num_hashes)?,
            bits,
            num_hashes,
        })
    }

    /// Fraction of the candidate's k-mers already emitted reaches the
    /// identity threshold.
    pub fn is_represented(&self, kmers: &[Kmer], percent_identity: f32) -> bool {
        if kmers.is_empty() {
            return true;
        }
        let present = kmers
            .iter()
            .filter(|kmer| self.filter.check(kmer.canonical))
            .count();
        present as f32 >= percent_identity * kmers.len() as f32
    }

    /// Record an emitted transcript's k-mers.
    pub fn record(&self, kmers: &[Kmer]) {
        for kmer in kmers {
            self.filter.insert(kmer.canonical);
        }
    }

    /// Drop everything seen so far; used between strata when per-stratum
    /// deduplication is configured.
    pub fn reset(&mut self) -> Result<()> {
        self.filter = BloomFilter::with_size(self.bits, self.num_hashes)?;
        Ok(())
    }

    pub fn occupancy(&self) -> f64 {
        self.filter.occupancy()
    }
}

/// Reverse-complement palindrome artifact: the fragment's head reads as
/// the reverse complement of its tail. Returns the trimmed length when
/// detected.
pub fn palindrome_trim_len(bases: &[u8], params: &TraversalParams) -> Option<usize> {
    const MAX_REGION: usize = 200;
    const MIN_REGION: usize = 20;
    let region = (bases.len() / 2).min(MAX_REGION);
    if region < MIN_REGION {
        return None;
    }
    let head = &bases[..region];
    let tail_rc = reverse_complement(&bases[bases.len() - region..]);
    if banded_identity(head, &tail_rc, params.max_indel_size) >= params.percent_identity {
        Some(bases.len() - region)
    } else {
        None
    }
}

/// Chimera flag: paired-link support collapses in the middle third while
/// both flanks hold.
pub fn is_chimeric(graph: &BloomDbg, kmers: &[Kmer], params: &TraversalParams) -> bool {
    if !graph.has_paired_read_filter() {
        return false;
    }
    let d = graph.config().d_read;
    if kmers.len() < 3 * (d + params.min_num_kmer_pairs) {
        return false; // too short to judge
    }
    let third = kmers.len() / 3;
    let support = |lo: usize, hi: usize| -> f64 {
        let mut held = 0usize;
        let mut total = 0usize;
        for i in lo..hi.min(kmers.len().saturating_sub(d)) {
            total += 1;
            if graph.contains_paired_read(&kmers[i], &kmers[i + d]) {
                held += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        held as f64 / total as f64
    };
    let left = support(0, third);
    let middle = support(third, 2 * third);
    let right = support(2 * third, kmers.len());
    let flank_floor = left.min(right);
    flank_floor >= 0.5 && middle < flank_floor / 4.0
}
