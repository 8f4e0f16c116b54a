//! Transcript output.
//!
//! One dedicated writer thread owns the file handle and drains a
//! bounded queue; assembly workers only ever enqueue. Record order is
//! whatever arrival order the workers produce.

use crate::error::{AsmError, Result};
use crossbeam_channel::{bounded, Sender};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

/// Poly-A signal hexamers, strongest variants first.
const PAS_MOTIFS: [&[u8; 6]; 4] = [b"AATAAA", b"ATTAAA", b"AGTAAA", b"TATAAA"];

/// How far from the 3' end a signal is considered.
const PAS_SCAN_WINDOW: usize = 60;

#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub bases: Vec<u8>,
    pub median_coverage: u8,
    pub fragment_info: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Record-name prefix, e.g. `jw.`.
    pub prefix: String,
    /// Lowercase poly-A signal hexamers and report them in the header.
    pub mask_polya: bool,
    /// Rewrite T to U after masking.
    pub uracil: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            prefix: "jw.".to_string(),
            mask_polya: false,
            uracil: false,
        }
    }
}

/// Poly-A signals near the 3' end; masks each hit in place by
/// lowercasing it.
pub fn mask_polya_signals(bases: &mut [u8]) -> Vec<(usize, String)> {
    let mut hits = Vec::new();
    if bases.len() < 6 {
        return hits;
    }
    let scan_from = bases.len().saturating_sub(PAS_SCAN_WINDOW);
    for pos in scan_from..=bases.len() - 6 {
        for motif in PAS_MOTIFS {
            if &bases[pos..pos + 6] == motif.as_slice() {
                let found = String::from_utf8_lossy(motif.as_slice()).into_owned();
                for b in &mut bases[pos..pos + 6] {
                    *b = b.to_ascii_lowercase();
                }
                hits.push((pos, found));
                break;
            }
        }
    }
    hits
}

fn to_uracil(bases: &mut [u8]) {
    for b in bases.iter_mut() {
        match *b {
            b'T' => *b = b'U',
            b't' => *b = b'u',
            _ => {}
        }
    }
}

/// Render one record: the header line and the (possibly masked) bases.
pub fn format_record(id: u64, record: &OutputRecord, opts: &OutputOptions) -> (String, Vec<u8>) {
    let mut bases = record.bases.clone();
    let pas = if opts.mask_polya {
        mask_polya_signals(&mut bases)
    } else {
        Vec::new()
    };
    if opts.uracil {
        to_uracil(&mut bases);
    }

    let mut header = format!(
        ">{}{} l={} c={}",
        opts.prefix,
        id,
        bases.len(),
        record.median_coverage
    );
    if let Some(info) = &record.fragment_info {
        header.push_str(&format!(" F=[{}]", info));
    }
    if !pas.is_empty() {
        let entries: Vec<String> = pas
            .iter()
            .map(|(pos, motif)| format!("{}:{}:{}", pos, record.median_coverage, motif))
            .collect();
        header.push_str(&format!(" PAS=[{}]", entries.join(", ")));
    }
    (header, bases)
}

/// The writer thread plus the handle workers clone senders from.
pub struct TranscriptWriter {
    sender: Option<Sender<OutputRecord>>,
    handle: Option<JoinHandle<std::io::Result<u64>>>,
}

impl TranscriptWriter {
    pub fn create<P: AsRef<Path>>(path: P, opts: OutputOptions) -> Result<Self> {
        let file = File::create(path)?;
        let (sender, receiver) = bounded::<OutputRecord>(1024);
        let handle = std::thread::spawn(move || -> std::io::Result<u64> {
            let mut writer = BufWriter::new(file);
            let mut next_id = 0u64;
            while let Ok(record) = receiver.recv() {
                next_id += 1;
                let (header, bases) = format_record(next_id, &record, &opts);
                writer.write_all(header.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.write_all(&bases)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            Ok(next_id)
        });
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> Sender<OutputRecord> {
        self.sender.as_ref().expect("writer is live").clone()
    }

    /// Close the queue, join the thread, and surface any write failure.
    pub fn finish(mut self) -> Result<u64> {
        drop(self.sender.take());
        let handle = self.handle.take().expect("finish called once");
        let written = handle
            .join()
            .map_err(|_| AsmError::Io(std::io::Error::other("output writer panicked")))??;
        Ok(written)
    }
}
