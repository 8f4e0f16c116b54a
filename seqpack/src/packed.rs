use crate::reader::{open_source, RecordSource, IO_BUF, MAX_RECORD_BASES};
use crate::seq::{OptionPair, SeqFormat, SeqHeader, Sequence};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, BufReader, BufWriter, Read, Result, Write};
use std::path::Path;

pub const BITS_PER_CHAR: usize = 2;
const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

#[inline]
pub fn char_to_value(c: u8) -> Option<u64> {
    match c {
        b'A' | b'a' => Some(0x00),
        b'C' | b'c' => Some(0x01),
        b'G' | b'g' => Some(0x02),
        b'T' | b't' => Some(0x03),
        _ => None,
    }
}

/// Packed record stream: per record a u32 little-endian base count, then
/// ceil(len/4) payload bytes, two bits per base, first base in the low
/// bits of the first byte. N bases cannot be represented. A length
/// prefix over the record contract means the stream is corrupt.
pub struct PackedRecords<R: Read + Send> {
    reader: BufReader<R>,
    file_index: usize,
    reads_index: usize,
}

impl<R> PackedRecords<R>
where
    R: Read + Send,
{
    pub fn new(reader: R, file_index: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(IO_BUF, reader),
            file_index,
            reads_index: 0,
        }
    }
}

impl PackedRecords<Box<dyn Read + Send>> {
    #[inline]
    pub fn from_path<P: AsRef<Path>>(path: P, file_index: usize) -> Result<Self> {
        Ok(Self::new(open_source(path)?, file_index))
    }
}

impl<R: Read + Send> RecordSource for PackedRecords<R> {
    fn next_record(&mut self) -> Result<Option<Sequence>> {
        let len = match self.reader.read_u32::<LittleEndian>() {
            Ok(len) => len as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        if len > MAX_RECORD_BASES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("packed length prefix {} exceeds the record contract", len),
            ));
        }
        let mut payload = vec![0u8; len.div_ceil(4)];
        self.reader.read_exact(&mut payload)?;

        let mut bases = Vec::with_capacity(len);
        for i in 0..len {
            let byte = payload[i / 4];
            let code = (byte >> ((i % 4) * BITS_PER_CHAR)) & 0x03;
            bases.push(BASES[code as usize]);
        }
        self.reads_index += 1;

        let header = SeqHeader {
            file_index: self.file_index,
            reads_index: self.reads_index,
            format: SeqFormat::Packed,
            id: format!("p{}", self.reads_index),
        };
        Ok(Some(Sequence::new(header, OptionPair::Single(bases))))
    }
}

pub struct PackedWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> PackedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub fn write_record(&mut self, bases: &[u8]) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(bases.len() as u32)?;
        let mut payload = vec![0u8; bases.len().div_ceil(4)];
        for (i, &b) in bases.iter().enumerate() {
            let code = char_to_value(b).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("base {:?} not representable in packed format", b as char),
                )
            })?;
            payload[i / 4] |= (code as u8) << ((i % 4) * BITS_PER_CHAR);
        }
        self.writer.write_all(&payload)
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()
    }
}
