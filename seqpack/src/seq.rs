#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum SeqFormat {
    Fasta,
    Fastq,
    PairFastq,
    Packed,
}

/// One record or one record pair, depending on the source.
#[derive(Debug, Clone)]
pub enum OptionPair<T> {
    Single(T),
    Pair(T, T),
}

impl<T> OptionPair<T> {
    pub fn single(&self) -> Option<&T> {
        match self {
            OptionPair::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, OptionPair::Pair(_, _))
    }

    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<OptionPair<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        match self {
            OptionPair::Single(t) => Ok(OptionPair::Single(f(t)?)),
            OptionPair::Pair(t1, t2) => Ok(OptionPair::Pair(f(t1)?, f(t2)?)),
        }
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T),
    {
        match self {
            OptionPair::Single(t) => f(t),
            OptionPair::Pair(t1, t2) => {
                f(t1);
                f(t2);
            }
        }
    }

    pub fn reduce<U, F>(&self, init: U, mut f: F) -> U
    where
        F: FnMut(U, &T) -> U,
    {
        match self {
            OptionPair::Single(t) => f(init, t),
            OptionPair::Pair(t1, t2) => {
                let acc = f(init, t1);
                f(acc, t2)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeqHeader {
    pub file_index: usize,
    pub reads_index: usize,
    pub format: SeqFormat,
    pub id: String,
}

/// A decoded record: the header plus one body (single-end) or two
/// (paired-end).
#[derive(Debug, Clone)]
pub struct Sequence {
    pub header: SeqHeader,
    pub body: OptionPair<Vec<u8>>,
}

impl Sequence {
    pub fn new(header: SeqHeader, body: OptionPair<Vec<u8>>) -> Self {
        Self { header, body }
    }

    pub fn total_len(&self) -> usize {
        self.body.reduce(0, |acc, s| acc + s.len())
    }
}

/// Record name: the text between the `>`/`@` marker and the first
/// whitespace of the header line.
pub fn record_id(header_line: &[u8]) -> String {
    let trimmed = match header_line.first() {
        Some(b'>') | Some(b'@') => &header_line[1..],
        _ => header_line,
    };
    let end = trimmed
        .iter()
        .position(|c| c.is_ascii_whitespace())
        .unwrap_or(trimmed.len());
    String::from_utf8_lossy(&trimmed[..end]).into_owned()
}

const PHRED_OFFSET: u8 = b'!';

/// Phred+33 floor masking. A base scoring under `floor` is rewritten to
/// `N`, which every k-mer window downstream treats as a break; masking
/// instead of trimming keeps positions intact, so paired-distance
/// indices still line up across the read.
pub fn mask_low_quality(bases: &mut [u8], quals: &[u8], floor: u8) {
    for (base, &q) in bases.iter_mut().zip(quals) {
        if q.saturating_sub(PHRED_OFFSET) < floor {
            *base = b'N';
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_stops_at_whitespace() {
        assert_eq!(record_id(b">read7 length=20"), "read7");
        assert_eq!(record_id(b"@read7\tcomment"), "read7");
        assert_eq!(record_id(b"bare"), "bare");
        assert_eq!(record_id(b">"), "");
    }

    #[test]
    fn masking_is_positional() {
        let mut bases = b"ACGTA".to_vec();
        // scores 5, 5, 0, 40, 5 against a floor of 10
        mask_low_quality(&mut bases, b"&&!I&", 10);
        assert_eq!(bases, b"NNNTN");
    }

    #[test]
    fn masking_with_zero_floor_is_a_no_op() {
        let mut bases = b"ACGT".to_vec();
        mask_low_quality(&mut bases, b"!!!!", 0);
        assert_eq!(bases, b"ACGT");
    }
}
