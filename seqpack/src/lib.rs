mod fasta;
mod fastq;
mod fastx;
mod packed;
mod parallel;
mod reader;
mod seq;

pub use fasta::*;
pub use fastq::*;
pub use fastx::*;
pub use packed::*;
pub use parallel::*;
pub use reader::*;
pub use seq::*;
