//! The implicit de Bruijn graph.
//!
//! No nodes or edges are materialized: membership lives in a plain
//! Bloom filter, coverage in a counting filter, and paired-k-mer link
//! evidence in paired-keys filters. An edge `u -> v` exists exactly when
//! `v` is one of the four 1-base-shifted successors of `u` and the
//! membership filter contains `v`.

use crate::bloom::{BloomFilter, CountingBloomFilter, PairedBloomFilter};
use crate::error::{AsmError, Result};
use crate::hashing::rolling::{
    next_forward_hash, next_reverse_hash, prev_forward_hash, prev_reverse_hash,
};
use crate::hashing::{base_code, canonical, code_base, KmerHasher};

#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    pub k: usize,
    pub num_hashes: usize,
    pub stranded: bool,
    /// Distance of within-read paired k-mers.
    pub d_read: usize,
    /// Distance of fragment-spanning paired k-mers.
    pub d_frag: usize,
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k < 2 {
            return Err(AsmError::Config(format!("k = {} is below 2", self.k)));
        }
        if self.num_hashes == 0 {
            return Err(AsmError::Config("hash count of 0".into()));
        }
        if self.d_read == 0 || self.d_frag == 0 {
            return Err(AsmError::Config("paired distance of 0".into()));
        }
        Ok(())
    }
}

/// Transient view of one k-mer: its bases, both strand hashes and the
/// coverage read from the counting filter at creation time.
#[derive(Debug, Clone)]
pub struct Kmer {
    pub bases: Vec<u8>,
    pub fwd: u64,
    pub rev: u64,
    pub canonical: u64,
    pub count: u8,
}

impl Kmer {
    #[inline]
    pub fn last_base(&self) -> u8 {
        *self.bases.last().unwrap()
    }

    #[inline]
    pub fn first_base(&self) -> u8 {
        self.bases[0]
    }
}

/// Geometry of every filter backing one graph, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct FilterSizing {
    pub dbg_bits: u64,
    pub cbf_bytes: u64,
    pub pkbf_bits: Option<u64>,
    pub rpkbf_bits: Option<u64>,
}

impl FilterSizing {
    /// Split a per-filter byte budget the way the assembler stages use
    /// the filters: membership and counting get the full budget each,
    /// each paired filter a quarter per member filter.
    pub fn from_budget(bytes_per_filter: u64, with_pkbf: bool, with_rpkbf: bool) -> Self {
        let quarter = (bytes_per_filter / 4).max(1024);
        Self {
            dbg_bits: (bytes_per_filter * 8).max(1024),
            cbf_bytes: bytes_per_filter.max(1024),
            pkbf_bits: with_pkbf.then_some((quarter * 8).max(1024)),
            rpkbf_bits: with_rpkbf.then_some((quarter * 8).max(1024)),
        }
    }
}

pub struct BloomDbg {
    config: GraphConfig,
    dbg: BloomFilter,
    cbf: CountingBloomFilter,
    pkbf: Option<PairedBloomFilter>,
    rpkbf: Option<PairedBloomFilter>,
}

impl BloomDbg {
    pub fn new(config: GraphConfig, sizing: FilterSizing) -> Result<Self> {
        config.validate()?;
        let m = config.num_hashes;
        Ok(Self {
            config,
            dbg: BloomFilter::with_size(sizing.dbg_bits, m)?,
            cbf: CountingBloomFilter::with_size(sizing.cbf_bytes, m)?,
            pkbf: match sizing.pkbf_bits {
                Some(bits) => Some(PairedBloomFilter::with_size(bits, m)?),
                None => None,
            },
            rpkbf: match sizing.rpkbf_bits {
                Some(bits) => Some(PairedBloomFilter::with_size(bits, m)?),
                None => None,
            },
        })
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.config.k
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Canonical hash under the configured strand policy.
    #[inline]
    pub fn canonical_of(&self, fwd: u64, rev: u64) -> u64 {
        if self.config.stranded {
            fwd
        } else {
            canonical(fwd, rev)
        }
    }

    fn make_kmer(&self, bases: Vec<u8>, fwd: u64, rev: u64) -> Kmer {
        let canonical = self.canonical_of(fwd, rev);
        Kmer {
            bases,
            fwd,
            rev,
            canonical,
            count: self.cbf.count(canonical),
        }
    }

    /// All k-mers of `s` in order. Windows containing out-of-alphabet
    /// bytes are skipped, splitting the sequence.
    pub fn get_kmers(&self, seq: &[u8]) -> Vec<Kmer> {
        let mut kmers = Vec::new();
        let mut hasher = KmerHasher::new(seq, self.config.k);
        while hasher.roll() {
            kmers.push(self.make_kmer(
                hasher.window().to_vec(),
                hasher.forward_hash(),
                hasher.reverse_hash(),
            ));
        }
        kmers
    }

    #[inline]
    pub fn contains(&self, kmer: &Kmer) -> bool {
        self.dbg.check(kmer.canonical)
    }

    #[inline]
    pub fn count(&self, kmer: &Kmer) -> u8 {
        self.cbf.count(kmer.canonical)
    }

    /// Population write: membership plus coverage.
    pub fn insert_hash(&self, canonical: u64) {
        self.dbg.insert(canonical);
        self.cbf.increment(canonical);
    }

    /// Population write for secondary datasets: bump coverage only for
    /// k-mers the graph already holds, so the graph itself stays fixed.
    pub fn insert_hash_if_present(&self, canonical: u64) {
        if self.dbg.check(canonical) {
            self.cbf.increment(canonical);
        }
    }

    pub fn add_paired_read(&self, a: u64, b: u64) {
        if let Some(rpkbf) = &self.rpkbf {
            rpkbf.add(a, b);
        }
    }

    pub fn add_paired_frag(&self, a: u64, b: u64) {
        if let Some(pkbf) = &self.pkbf {
            pkbf.add(a, b);
        }
    }

    /// Read-distance link query; graphs without the filter report no
    /// links rather than guessing.
    pub fn contains_paired_read(&self, a: &Kmer, b: &Kmer) -> bool {
        self.rpkbf
            .as_ref()
            .map_or(false, |f| f.contains(a.canonical, b.canonical))
    }

    pub fn contains_paired_frag(&self, a: &Kmer, b: &Kmer) -> bool {
        self.pkbf
            .as_ref()
            .map_or(false, |f| f.contains(a.canonical, b.canonical))
    }

    pub fn has_paired_read_filter(&self) -> bool {
        self.rpkbf.is_some()
    }

    pub fn has_paired_frag_filter(&self) -> bool {
        self.pkbf.is_some()
    }

    /// Up to four successors of `kmer` that pass the membership filter,
    /// in A,C,G,T order.
    pub fn successors(&self, kmer: &Kmer) -> Vec<Kmer> {
        let k = self.config.k;
        let code_out = base_code(kmer.first_base()).expect("kmer holds clean bases");
        let mut out = Vec::with_capacity(4);
        for code_in in 0u8..4 {
            let fwd = next_forward_hash(kmer.fwd, k, code_out, code_in);
            let rev = next_reverse_hash(kmer.rev, k, code_out, code_in);
            if self.dbg.check(self.canonical_of(fwd, rev)) {
                let mut bases = Vec::with_capacity(k);
                bases.extend_from_slice(&kmer.bases[1..]);
                bases.push(code_base(code_in));
                out.push(self.make_kmer(bases, fwd, rev));
            }
        }
        out
    }

    /// Up to four predecessors of `kmer`, in A,C,G,T order.
    pub fn predecessors(&self, kmer: &Kmer) -> Vec<Kmer> {
        let k = self.config.k;
        let code_out = base_code(kmer.last_base()).expect("kmer holds clean bases");
        let mut out = Vec::with_capacity(4);
        for code_in in 0u8..4 {
            let fwd = prev_forward_hash(kmer.fwd, k, code_out, code_in);
            let rev = prev_reverse_hash(kmer.rev, k, code_out, code_in);
            if self.dbg.check(self.canonical_of(fwd, rev)) {
                let mut bases = Vec::with_capacity(k);
                bases.push(code_base(code_in));
                bases.extend_from_slice(&kmer.bases[..k - 1]);
                out.push(self.make_kmer(bases, fwd, rev));
            }
        }
        out
    }

    /// Concatenate a walk back into bases: the whole head window, then
    /// the trailing base of every later k-mer.
    pub fn assemble(&self, kmers: &[Kmer]) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(head) = kmers.first() {
            out.extend_from_slice(&head.bases);
            for kmer in &kmers[1..] {
                out.push(kmer.last_base());
            }
        }
        out
    }

    pub fn dbg_filter(&self) -> &BloomFilter {
        &self.dbg
    }

    pub fn cbf_filter(&self) -> &CountingBloomFilter {
        &self.cbf
    }

    pub fn pkbf_filter(&self) -> Option<&PairedBloomFilter> {
        self.pkbf.as_ref()
    }

    pub fn rpkbf_filter(&self) -> Option<&PairedBloomFilter> {
        self.rpkbf.as_ref()
    }
}
