use crate::graph::{FilterSizing, GraphConfig};
use crate::kernel::TraversalParams;
use crate::subsample::SignatureScheme;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Parse a size like `4G`, `512M`, `64K` or plain bytes.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, scale) = match s.chars().last() {
        Some('G') | Some('g') => (&s[..s.len() - 1], 1usize << 30),
        Some('M') | Some('m') => (&s[..s.len() - 1], 1usize << 20),
        Some('K') | Some('k') => (&s[..s.len() - 1], 1usize << 10),
        _ => (s, 1),
    };
    digits
        .parse::<usize>()
        .map(|n| n * scale)
        .map_err(|e| format!("invalid size {:?}: {}", s, e))
}

#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// Set length of k-mers
    #[clap(short, long, value_parser = clap::value_parser!(u64).range(2..=255), default_value_t = 25)]
    pub k_mer: u64,

    /// Number of hash functions per filter
    #[clap(short = 'm', long, value_parser = clap::value_parser!(u64).range(1..=8), default_value_t = 3)]
    pub num_hashes: u64,

    /// Keep strand information instead of canonicalizing
    #[clap(long)]
    pub stranded: bool,

    /// Memory per filter
    #[clap(long, value_parser = parse_size, default_value = "1G")]
    pub filter_mem: usize,

    /// Warn when the estimated false-positive rate passes this bound
    #[clap(long, default_value_t = 0.05)]
    pub max_fpr: f64,

    /// Distance of within-read paired k-mers
    #[clap(long, default_value_t = 25)]
    pub d_read: usize,

    /// Distance of fragment paired k-mers
    #[clap(long, default_value_t = 75)]
    pub d_frag: usize,
}

impl GraphArgs {
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            k: self.k_mer as usize,
            num_hashes: self.num_hashes as usize,
            stranded: self.stranded,
            d_read: self.d_read,
            d_frag: self.d_frag,
        }
    }

    pub fn sizing(&self, with_pkbf: bool, with_rpkbf: bool) -> FilterSizing {
        FilterSizing::from_budget(self.filter_mem as u64, with_pkbf, with_rpkbf)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct TraversalArgs {
    /// Branches up to this many k-mers count as tips
    #[clap(long, default_value_t = 10)]
    pub max_tip_length: usize,

    /// Lookahead depth at ambiguous branches
    #[clap(long, default_value_t = 3)]
    pub lookahead: usize,

    /// Coverage-gradient floor at branches
    #[clap(long, default_value_t = 0.5)]
    pub max_cov_gradient: f32,

    /// Length slack for error-correction reroutes
    #[clap(long, default_value_t = 1)]
    pub max_indel_size: usize,

    /// Identity threshold for rerouting, artifacts and screening
    #[clap(long, default_value_t = 0.9)]
    pub percent_identity: f32,

    /// Minimum intact link run in fragment validation
    #[clap(long, default_value_t = 3)]
    pub min_num_kmer_pairs: usize,

    /// Minimum direct mate overlap
    #[clap(long, default_value_t = 10)]
    pub min_overlap: usize,

    /// Bridging step bound
    #[clap(long, default_value_t = 500)]
    pub bound: usize,

    /// Error-correction passes per read
    #[clap(long, default_value_t = 2)]
    pub max_err_corr_iterations: usize,

    /// Coverage floor; k-mers under it sit in dips
    #[clap(long, default_value_t = 1)]
    pub min_kmer_cov: u8,
}

impl TraversalArgs {
    pub fn as_params(&self) -> TraversalParams {
        TraversalParams {
            max_tip_length: self.max_tip_length,
            lookahead: self.lookahead,
            max_cov_gradient: self.max_cov_gradient,
            max_indel_size: self.max_indel_size,
            percent_identity: self.percent_identity,
            min_num_kmer_pairs: self.min_num_kmer_pairs,
            min_overlap: self.min_overlap,
            bound: self.bound,
            max_err_corr_iterations: self.max_err_corr_iterations,
            min_kmer_cov: self.min_kmer_cov,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SchemeChoice {
    Minimizer,
    KmerPair,
    Strobemer,
}

#[derive(Parser, Debug, Clone)]
pub struct SubsampleArgs {
    /// Signature scheme for the redundancy filter
    #[clap(long, value_enum, default_value_t = SchemeChoice::Minimizer)]
    pub scheme: SchemeChoice,

    /// Minimizer window size
    #[clap(long, default_value_t = 11)]
    pub window: usize,

    /// Strobe selection range start
    #[clap(long, default_value_t = 2)]
    pub w_min: usize,

    /// Strobe selection range end
    #[clap(long, default_value_t = 12)]
    pub w_max: usize,

    /// A signature seen at most this often is still new
    #[clap(long, default_value_t = 10)]
    pub max_multiplicity: u8,

    /// Longest tolerated run of seen signatures
    #[clap(long, default_value_t = 10)]
    pub max_seen_chain: usize,
}

impl SubsampleArgs {
    pub fn scheme(&self) -> SignatureScheme {
        match self.scheme {
            SchemeChoice::Minimizer => SignatureScheme::Minimizer {
                window: self.window,
            },
            SchemeChoice::KmerPair => SignatureScheme::KmerPair,
            SchemeChoice::Strobemer => SignatureScheme::Strobemer {
                w_min: self.w_min,
                w_max: self.w_max,
            },
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct InputArgs {
    /// Left mate files, matched by position with -2
    #[clap(short = '1', long = "left")]
    pub left: Vec<PathBuf>,

    /// Right mate files
    #[clap(short = '2', long = "right")]
    pub right: Vec<PathBuf>,

    /// Unpaired or long-read files
    #[clap(short = 's', long = "single")]
    pub single: Vec<PathBuf>,

    /// Scan a directory for sequence files instead
    #[clap(long)]
    pub in_dir: Option<PathBuf>,

    /// Mask bases under this phred score
    #[clap(short = 'q', long, default_value_t = 3)]
    pub min_quality: u8,
}
