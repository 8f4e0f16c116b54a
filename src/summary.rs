use crate::error::Result;
use crate::kernel::KernelStatsSnapshot;
use crate::stats::LengthQuartiles;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// End-of-run report, written as pretty JSON next to the outputs.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub elapsed_secs: f64,
    pub sequences: u64,
    pub bases: u64,
    pub kmers_inserted: u64,
    pub kmer_pairs_inserted: u64,
    pub sources_skipped: usize,
    pub subsample_rejected: u64,
    pub dbg_occupancy: f64,
    pub dbg_estimated_fpr: f64,
    pub cbf_occupancy: f64,
    pub transcripts_written: u64,
    pub kernel: KernelStatsSnapshot,
    pub fragment_lengths: Option<LengthQuartiles>,
}

impl RunSummary {
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        let text = serde_json::to_string_pretty(self).expect("summary serializes");
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}
