use crate::reader::{chomp, open_source, RecordSource, IO_BUF, MAX_RECORD_BASES};
use crate::seq::{mask_low_quality, record_id, OptionPair, SeqFormat, SeqHeader, Sequence};
use std::io::{self, BufRead, BufReader, Read, Result};
use std::path::Path;

fn bad_record(what: &str, reads_index: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("fastq record {}: {}", reads_index + 1, what),
    )
}

/// FASTQ records with the four-line grammar enforced: `@` header, bases,
/// `+` separator, qualities of matching length. A violation is reported
/// as a format error so the whole source gets skipped rather than
/// silently resynchronized.
///
/// Bases under the quality floor come out masked to `N` (see
/// [`mask_low_quality`]); window scanners then break on them like on
/// any other ambiguous base.
pub struct FastqRecords<R: Read + Send> {
    reader: BufReader<R>,
    min_quality: u8,
    file_index: usize,
    reads_index: usize,
    line: Vec<u8>,
}

impl<R: Read + Send> FastqRecords<R> {
    pub fn new(reader: R, file_index: usize, min_quality: u8) -> Self {
        Self {
            reader: BufReader::with_capacity(IO_BUF, reader),
            min_quality,
            file_index,
            reads_index: 0,
            line: Vec::new(),
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        Ok(self.reader.read_until(b'\n', &mut self.line)? > 0)
    }

    fn require_line(&mut self, what: &str) -> Result<()> {
        if self.read_line()? {
            chomp(&mut self.line);
            Ok(())
        } else {
            Err(bad_record(what, self.reads_index))
        }
    }
}

impl FastqRecords<Box<dyn Read + Send>> {
    #[inline]
    pub fn from_path<P: AsRef<Path>>(path: P, file_index: usize, min_quality: u8) -> Result<Self> {
        Ok(Self::new(open_source(path)?, file_index, min_quality))
    }
}

impl<R: Read + Send> RecordSource for FastqRecords<R> {
    fn next_record(&mut self) -> Result<Option<Sequence>> {
        if !self.read_line()? {
            return Ok(None);
        }
        chomp(&mut self.line);
        if !self.line.starts_with(b"@") {
            return Err(bad_record("header does not start with @", self.reads_index));
        }
        let id = record_id(&self.line);

        self.require_line("truncated after the header")?;
        let mut bases = std::mem::take(&mut self.line);
        if bases.len() > MAX_RECORD_BASES {
            return Err(bad_record("read exceeds the length contract", self.reads_index));
        }

        self.require_line("missing + separator")?;
        if !self.line.starts_with(b"+") {
            return Err(bad_record("third line is not a + separator", self.reads_index));
        }

        self.require_line("missing quality line")?;
        if self.line.len() != bases.len() {
            return Err(bad_record(
                "quality length does not match the bases",
                self.reads_index,
            ));
        }
        if self.min_quality > 0 {
            mask_low_quality(&mut bases, &self.line, self.min_quality);
        }

        self.reads_index += 1;
        let header = SeqHeader {
            file_index: self.file_index,
            reads_index: self.reads_index,
            format: SeqFormat::Fastq,
            id,
        };
        Ok(Some(Sequence::new(header, OptionPair::Single(bases))))
    }
}

/// Mate streams zipped into one paired record per pull. The mates must
/// stay in lockstep; a stream ending early is a format error, never a
/// silent truncation of the longer file.
pub struct PairFastqRecords<R: Read + Send> {
    left: FastqRecords<R>,
    right: FastqRecords<R>,
    reads_index: usize,
}

impl<R: Read + Send> PairFastqRecords<R> {
    pub fn new(left: R, right: R, file_index: usize, min_quality: u8) -> Self {
        Self {
            left: FastqRecords::new(left, file_index, min_quality),
            right: FastqRecords::new(right, file_index, min_quality),
            reads_index: 0,
        }
    }
}

impl PairFastqRecords<Box<dyn Read + Send>> {
    #[inline]
    pub fn from_path<P: AsRef<Path>>(
        path1: P,
        path2: P,
        file_index: usize,
        min_quality: u8,
    ) -> Result<Self> {
        Ok(Self::new(
            open_source(path1)?,
            open_source(path2)?,
            file_index,
            min_quality,
        ))
    }
}

impl<R: Read + Send> RecordSource for PairFastqRecords<R> {
    fn next_record(&mut self) -> Result<Option<Sequence>> {
        match (self.left.next_record()?, self.right.next_record()?) {
            (None, None) => Ok(None),
            (Some(left), Some(right)) => {
                let (body1, body2) = match (left.body, right.body) {
                    (OptionPair::Single(a), OptionPair::Single(b)) => (a, b),
                    _ => unreachable!("fastq sources yield single bodies"),
                };
                self.reads_index += 1;
                let header = SeqHeader {
                    file_index: left.header.file_index,
                    reads_index: self.reads_index,
                    format: SeqFormat::PairFastq,
                    id: left.header.id,
                };
                Ok(Some(Sequence::new(header, OptionPair::Pair(body1, body2))))
            }
            _ => Err(bad_record("mate files fell out of sync", self.reads_index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_quality_bases_come_out_masked() {
        let data = b"@r1\nACGT\n+\nII!I\n";
        let mut source = FastqRecords::new(&data[..], 0, 20);
        let seq = source.next_record().unwrap().unwrap();
        assert_eq!(seq.body.single().unwrap(), b"ACNT");
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn grammar_violations_abort_the_source() {
        // no + separator
        let data = b"@r1\nACGT\nIIII\n@r2\nAC\n+\nII\n";
        let mut source = FastqRecords::new(&data[..], 0, 0);
        assert!(source.next_record().is_err());

        // quality shorter than the bases
        let data = b"@r1\nACGT\n+\nII\n";
        let mut source = FastqRecords::new(&data[..], 0, 0);
        assert!(source.next_record().is_err());
    }

    #[test]
    fn pair_source_zips_mates() {
        let r1 = b"@p1 left\nAAAA\n+\nIIII\n";
        let r2 = b"@p1 right\nCCCC\n+\nIIII\n";
        let mut source = PairFastqRecords::new(&r1[..], &r2[..], 0, 0);
        let seq = source.next_record().unwrap().unwrap();
        assert!(seq.body.is_pair());
        assert_eq!(seq.header.id, "p1");
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn uneven_mate_files_are_an_error() {
        let r1 = b"@p1\nAAAA\n+\nIIII\n@p2\nCCCC\n+\nIIII\n";
        let r2 = b"@p1\nGGGG\n+\nIIII\n";
        let mut source = PairFastqRecords::new(&r1[..], &r2[..], 0, 0);
        assert!(source.next_record().unwrap().is_some());
        assert!(source.next_record().is_err());
    }
}
