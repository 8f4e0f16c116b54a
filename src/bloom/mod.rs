//! Bit-packed probabilistic membership structures.
//!
//! All filters share the same backing discipline: block-striped atomic
//! arrays so a single logical index space can exceed 2^34 bits without
//! any single allocation doing so, and monotone lock-free writes so
//! population workers never coordinate.

mod bitvec;
mod counting;
mod filter;
mod paired;

pub use bitvec::{BitVector, ByteVector};
pub use counting::CountingBloomFilter;
pub use filter::{optimal_bits, optimal_num_hashes, BloomFilter};
pub use paired::PairedBloomFilter;
