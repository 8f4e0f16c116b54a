use crate::seq::{SeqFormat, Sequence};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read, Result};
use std::path::Path;

/// Decompression and record reassembly dominate I/O here, so sources are
/// buffered once, generously, at the byte layer; record layers on top
/// read line-by-line out of this buffer.
pub const IO_BUF: usize = 1 << 20;

/// Input records are bounded by contract: one read or draft sequence is
/// at most a million bases. Anything longer means a corrupt source (a
/// bad packed length prefix, a concatenation error) and aborts it.
pub const MAX_RECORD_BASES: usize = 1_000_000;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Open a possibly-gzipped file. The two sniffed magic bytes are chained
/// back in front of the file, so no rewind is needed and the same path
/// works for any readable source.
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Box<dyn Read + Send>> {
    let mut file = File::open(&path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("cannot open {}: {}", path.as_ref().display(), e),
        )
    })?;
    let mut head = [0u8; 2];
    let mut got = 0;
    while got < 2 {
        match file.read(&mut head[got..])? {
            0 => break,
            n => got += n,
        }
    }
    let replay = io::Cursor::new(head[..got].to_vec()).chain(file);
    if head[..got] == GZIP_MAGIC {
        Ok(Box::new(GzDecoder::new(replay)))
    } else {
        Ok(Box::new(replay))
    }
}

/// Strip one trailing newline, with or without a carriage return.
pub fn chomp(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}

/// Sniff the record format. Packed records carry no magic, so the
/// `.pseq` extension wins before looking at the payload.
pub fn detect_file_format<P: AsRef<Path>>(path: P) -> Result<SeqFormat> {
    if path
        .as_ref()
        .extension()
        .map_or(false, |ext| ext == "pseq")
    {
        return Ok(SeqFormat::Packed);
    }

    let mut reader = open_source(&path)?;
    let mut lead = [0u8; 1];
    if reader.read(&mut lead)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} is empty", path.as_ref().display()),
        ));
    }
    match lead[0] {
        b'>' => Ok(SeqFormat::Fasta),
        b'@' => Ok(SeqFormat::Fastq),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} starts with {:?}, not a known record format",
                path.as_ref().display(),
                other as char
            ),
        )),
    }
}

/// One decoded record at a time. Implementations report malformed input
/// as an error, which aborts that source while the rest of the pipeline
/// keeps running.
pub trait RecordSource: Send {
    fn next_record(&mut self) -> Result<Option<Sequence>>;
}

impl RecordSource for Box<dyn RecordSource + Send> {
    fn next_record(&mut self) -> Result<Option<Sequence>> {
        (**self).next_record()
    }
}

/// Batch view consumed by the parallel scaffold.
pub trait Reader: Send {
    fn next(&mut self) -> Result<Option<Vec<Sequence>>>;
}

/// Default batch budget in bases. Downstream work is hashing, which is
/// linear in bases, so batches are cut by total length rather than
/// record count; this keeps worker quanta even whether the source is
/// short paired reads or megabase drafts.
pub const BATCH_BASES: usize = 1 << 18;

/// Groups records from any source into roughly even-work batches.
pub struct Batcher<S> {
    source: S,
    batch_bases: usize,
}

impl<S: RecordSource> Batcher<S> {
    pub fn new(source: S) -> Self {
        Self::with_budget(source, BATCH_BASES)
    }

    pub fn with_budget(source: S, batch_bases: usize) -> Self {
        assert!(batch_bases > 0);
        Self {
            source,
            batch_bases,
        }
    }
}

impl<S: RecordSource> Reader for Batcher<S> {
    fn next(&mut self) -> Result<Option<Vec<Sequence>>> {
        let mut batch = Vec::new();
        let mut bases = 0usize;
        while bases < self.batch_bases {
            match self.source.next_record()? {
                Some(seq) => {
                    bases += seq.total_len();
                    batch.push(seq);
                }
                None => break,
            }
        }
        Ok((!batch.is_empty()).then_some(batch))
    }
}
