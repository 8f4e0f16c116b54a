//! Fragment-length bookkeeping.
//!
//! Workers feed reconstructed fragment lengths into a bounded sample;
//! once the sample fills, the quartiles are derived exactly once and
//! every later reader sees the same values. The side-file format is the
//! five `key:value` lines downstream tooling expects.

use crate::error::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LengthQuartiles {
    pub min: usize,
    pub q1: usize,
    pub median: usize,
    pub q3: usize,
    pub max: usize,
}

impl LengthQuartiles {
    fn from_sorted(sorted: &[usize]) -> Self {
        let pick = |fraction: f64| -> usize {
            let idx = ((sorted.len() - 1) as f64 * fraction).round() as usize;
            sorted[idx]
        };
        Self {
            min: sorted[0],
            q1: pick(0.25),
            median: pick(0.5),
            q3: pick(0.75),
            max: sorted[sorted.len() - 1],
        }
    }

    pub fn write_side_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "min:{}", self.min)?;
        writeln!(file, "Q1:{}", self.q1)?;
        writeln!(file, "M:{}", self.median)?;
        writeln!(file, "Q3:{}", self.q3)?;
        writeln!(file, "max:{}", self.max)?;
        Ok(())
    }
}

/// Bounded length sample with a one-shot quartile broadcast.
pub struct FragmentLengths {
    samples: Mutex<Vec<usize>>,
    target: usize,
    full: AtomicBool,
    derived: OnceLock<LengthQuartiles>,
}

impl FragmentLengths {
    pub fn new(target: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(target.max(1))),
            target: target.max(1),
            full: AtomicBool::new(false),
            derived: OnceLock::new(),
        }
    }

    /// Record one fragment length. Once the sample fills, the quartiles
    /// freeze and later records are dropped on the floor.
    pub fn record(&self, len: usize) {
        if self.full.load(Ordering::Relaxed) {
            return;
        }
        let mut samples = self.samples.lock().unwrap();
        if samples.len() >= self.target {
            return;
        }
        samples.push(len);
        if samples.len() >= self.target {
            self.full.store(true, Ordering::Relaxed);
            let mut sorted = samples.clone();
            drop(samples);
            sorted.sort_unstable();
            let _ = self.derived.set(LengthQuartiles::from_sorted(&sorted));
        }
    }

    /// The broadcast value, if the sample has filled.
    pub fn quartiles(&self) -> Option<LengthQuartiles> {
        self.derived.get().copied()
    }

    /// Derive from whatever was sampled, full or not. Used at the final
    /// barrier; returns nothing when no fragment was ever recorded.
    pub fn finalize(&self) -> Option<LengthQuartiles> {
        if let Some(q) = self.derived.get() {
            return Some(*q);
        }
        let mut samples = self.samples.lock().unwrap().clone();
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let q = LengthQuartiles::from_sorted(&samples);
        let _ = self.derived.set(q);
        self.derived.get().copied()
    }

    pub fn sampled(&self) -> usize {
        self.samples.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quartiles_of_a_known_sample() {
        let lengths = FragmentLengths::new(5);
        for len in [300, 100, 200, 500, 400] {
            lengths.record(len);
        }
        let q = lengths.quartiles().expect("sample filled");
        assert_eq!(q.min, 100);
        assert_eq!(q.q1, 200);
        assert_eq!(q.median, 300);
        assert_eq!(q.q3, 400);
        assert_eq!(q.max, 500);
    }

    #[test]
    fn broadcast_happens_exactly_once() {
        let lengths = FragmentLengths::new(3);
        for len in [10, 20, 30] {
            lengths.record(len);
        }
        let first = lengths.quartiles().unwrap();
        // later records cannot shift the derived values
        lengths.record(9999);
        let second = lengths.quartiles().unwrap();
        assert_eq!(first.median, second.median);
        assert_eq!(lengths.sampled(), 3);
    }

    #[test]
    fn finalize_on_a_partial_sample() {
        let lengths = FragmentLengths::new(100);
        lengths.record(42);
        assert!(lengths.quartiles().is_none());
        let q = lengths.finalize().unwrap();
        assert_eq!(q.median, 42);
    }

    #[test]
    fn empty_sample_has_no_distribution() {
        let lengths = FragmentLengths::new(10);
        assert!(lengths.finalize().is_none());
    }

    #[test]
    fn side_file_format() {
        let q = LengthQuartiles {
            min: 1,
            q1: 2,
            median: 3,
            q3: 4,
            max: 5,
        };
        let dir = std::env::temp_dir().join("jingwei_stats_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fragstats.txt");
        q.write_side_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "min:1\nQ1:2\nM:3\nQ3:4\nmax:5\n");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
