use crate::fasta::FastaRecords;
use crate::fastq::{FastqRecords, PairFastqRecords};
use crate::packed::PackedRecords;
use crate::reader::{detect_file_format, Batcher, RecordSource};
use crate::seq::{OptionPair, SeqFormat};
use std::io::{self, Result};
use std::path::Path;

/// Batched reader over whatever format the paths turn out to hold.
pub type FastxReader = Batcher<Box<dyn RecordSource + Send>>;

impl Batcher<Box<dyn RecordSource + Send>> {
    pub fn from_paths<P: AsRef<Path>>(
        paths: OptionPair<P>,
        file_index: usize,
        min_quality: u8,
    ) -> Result<Self> {
        let format = paths.try_map(|path: &P| detect_file_format(path))?;

        let source: Box<dyn RecordSource + Send> = match format {
            OptionPair::Single(SeqFormat::Fasta) => {
                let path = paths.single().unwrap();
                Box::new(FastaRecords::from_path(path, file_index)?)
            }
            OptionPair::Single(SeqFormat::Fastq) => {
                let path = paths.single().unwrap();
                Box::new(FastqRecords::from_path(path, file_index, min_quality)?)
            }
            OptionPair::Pair(SeqFormat::Fastq, SeqFormat::Fastq) => match &paths {
                OptionPair::Pair(p1, p2) => {
                    Box::new(PairFastqRecords::from_path(p1, p2, file_index, min_quality)?)
                }
                _ => unreachable!(),
            },
            OptionPair::Single(SeqFormat::Packed) => {
                let path = paths.single().unwrap();
                Box::new(PackedRecords::from_path(path, file_index)?)
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "unsupported file format combination",
                ))
            }
        };
        Ok(Batcher::new(source))
    }
}
