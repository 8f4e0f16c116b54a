use crate::reader::{chomp, open_source, RecordSource, IO_BUF, MAX_RECORD_BASES};
use crate::seq::{record_id, OptionPair, SeqFormat, SeqHeader, Sequence};
use std::io::{self, BufRead, BufReader, Read, Result};
use std::path::Path;

/// FASTA records, one per `>` header, with multi-line bodies collapsed.
///
/// Parsing is line-oriented: a header line either starts a record or,
/// when met mid-body, closes the current one and is carried over to
/// start the next. Data before the first header is a format error, as
/// is a body over the record length contract.
pub struct FastaRecords<R: Read + Send> {
    reader: BufReader<R>,
    file_index: usize,
    reads_index: usize,
    /// Header line already consumed while closing the previous record.
    carry: Option<Vec<u8>>,
    line: Vec<u8>,
}

impl<R: Read + Send> FastaRecords<R> {
    pub fn new(reader: R, file_index: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(IO_BUF, reader),
            file_index,
            reads_index: 0,
            carry: None,
            line: Vec::new(),
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        Ok(self.reader.read_until(b'\n', &mut self.line)? > 0)
    }
}

impl FastaRecords<Box<dyn Read + Send>> {
    #[inline]
    pub fn from_path<P: AsRef<Path>>(path: P, file_index: usize) -> Result<Self> {
        Ok(Self::new(open_source(path)?, file_index))
    }
}

impl<R: Read + Send> RecordSource for FastaRecords<R> {
    fn next_record(&mut self) -> Result<Option<Sequence>> {
        let header = match self.carry.take() {
            Some(line) => line,
            None => loop {
                if !self.read_line()? {
                    return Ok(None);
                }
                chomp(&mut self.line);
                if self.line.starts_with(b">") {
                    break std::mem::take(&mut self.line);
                }
                if !self.line.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "sequence data before the first fasta header",
                    ));
                }
            },
        };

        let mut body = Vec::new();
        loop {
            if !self.read_line()? {
                break;
            }
            chomp(&mut self.line);
            if self.line.starts_with(b">") {
                self.carry = Some(std::mem::take(&mut self.line));
                break;
            }
            body.extend_from_slice(&self.line);
            if body.len() > MAX_RECORD_BASES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("record {:?} exceeds {} bases", record_id(&header), MAX_RECORD_BASES),
                ));
            }
        }

        self.reads_index += 1;
        let header = SeqHeader {
            file_index: self.file_index,
            reads_index: self.reads_index,
            format: SeqFormat::Fasta,
            id: record_id(&header),
        };
        Ok(Some(Sequence::new(header, OptionPair::Single(body))))
    }
}
