//! On-disk graph snapshots.
//!
//! A sidecar file holding the filter geometry and the raw packed
//! payloads, all little-endian. Loading rebuilds a graph whose
//! membership and count queries match the saved one bit for bit.

use crate::bloom::{BitVector, ByteVector};
use crate::error::{AsmError, Result};
use crate::graph::{BloomDbg, FilterSizing, GraphConfig};
use crate::hashing;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const SNAPSHOT_MAGIC: &[u8; 8] = b"RBGRAPH\0";
pub const SNAPSHOT_VERSION: u32 = 1;

const FLAG_STRANDED: u32 = 1 << 0;
const FLAG_HAS_PKBF: u32 = 1 << 1;
const FLAG_HAS_RPKBF: u32 = 1 << 2;

/// Fingerprint of the compiled-in seed constants. A snapshot hashed
/// with different seeds is unusable, so the mismatch is refused early.
fn seed_fingerprint() -> u64 {
    hashing::SEEDS
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &seed)| acc ^ seed.rotate_left(8 * i as u32))
}

/// Parsed snapshot header, exposed for inspection tooling.
#[derive(Debug, Clone)]
pub struct SnapshotHeader {
    pub version: u32,
    pub k: u32,
    pub stranded: bool,
    pub has_pkbf: bool,
    pub has_rpkbf: bool,
    pub n_dbg_bits: u64,
    pub n_cbf_bytes: u64,
    pub n_pkbf_bits: u64,
    pub m_dbg: u32,
    pub m_cbf: u32,
    pub m_pkbf: u32,
    pub seed: u64,
    pub d_read: u32,
    pub d_frag: u32,
}

impl SnapshotHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(AsmError::CorruptSnapshot("bad magic".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != SNAPSHOT_VERSION {
            return Err(AsmError::CorruptSnapshot(format!(
                "unsupported version {}",
                version
            )));
        }
        let k = reader.read_u32::<LittleEndian>()?;
        let flags = reader.read_u32::<LittleEndian>()?;
        let n_dbg_bits = reader.read_u64::<LittleEndian>()?;
        let n_cbf_bytes = reader.read_u64::<LittleEndian>()?;
        let n_pkbf_bits = reader.read_u64::<LittleEndian>()?;
        let m_dbg = reader.read_u32::<LittleEndian>()?;
        let m_cbf = reader.read_u32::<LittleEndian>()?;
        let m_pkbf = reader.read_u32::<LittleEndian>()?;
        let seed = reader.read_u64::<LittleEndian>()?;
        let d_read = reader.read_u32::<LittleEndian>()?;
        let d_frag = reader.read_u32::<LittleEndian>()?;
        if seed != seed_fingerprint() {
            return Err(AsmError::CorruptSnapshot("seed mismatch".into()));
        }
        Ok(Self {
            version,
            k,
            stranded: flags & FLAG_STRANDED != 0,
            has_pkbf: flags & FLAG_HAS_PKBF != 0,
            has_rpkbf: flags & FLAG_HAS_RPKBF != 0,
            n_dbg_bits,
            n_cbf_bytes,
            n_pkbf_bits,
            m_dbg,
            m_cbf,
            m_pkbf,
            seed,
            d_read,
            d_frag,
        })
    }
}

pub fn read_header<P: AsRef<Path>>(path: P) -> Result<SnapshotHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    SnapshotHeader::read_from(&mut reader)
}

fn write_bits<W: Write>(writer: &mut W, bits: &BitVector) -> Result<()> {
    for word in 0..bits.word_count() {
        writer.write_u64::<LittleEndian>(bits.load_word(word))?;
    }
    Ok(())
}

fn read_bits<R: Read>(reader: &mut R, bits: &BitVector) -> Result<()> {
    for word in 0..bits.word_count() {
        bits.store_word(word, reader.read_u64::<LittleEndian>()?);
    }
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &ByteVector) -> Result<()> {
    for idx in 0..bytes.len() {
        writer.write_u8(bytes.load_byte(idx))?;
    }
    Ok(())
}

fn read_bytes<R: Read>(reader: &mut R, bytes: &ByteVector) -> Result<()> {
    for idx in 0..bytes.len() {
        bytes.store_byte(idx, reader.read_u8()?);
    }
    Ok(())
}

pub fn save_graph<P: AsRef<Path>>(graph: &BloomDbg, path: P) -> Result<()> {
    let config = graph.config();
    let pkbf_bits = graph.pkbf_filter().map(|f| f.bit_len_each());
    let rpkbf_bits = graph.rpkbf_filter().map(|f| f.bit_len_each());
    if let (Some(a), Some(b)) = (pkbf_bits, rpkbf_bits) {
        if a != b {
            return Err(AsmError::Config(
                "paired filters must share a geometry to snapshot".into(),
            ));
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(SNAPSHOT_MAGIC)?;
    writer.write_u32::<LittleEndian>(SNAPSHOT_VERSION)?;
    writer.write_u32::<LittleEndian>(config.k as u32)?;
    let mut flags = 0u32;
    if config.stranded {
        flags |= FLAG_STRANDED;
    }
    if pkbf_bits.is_some() {
        flags |= FLAG_HAS_PKBF;
    }
    if rpkbf_bits.is_some() {
        flags |= FLAG_HAS_RPKBF;
    }
    writer.write_u32::<LittleEndian>(flags)?;
    writer.write_u64::<LittleEndian>(graph.dbg_filter().bit_len())?;
    writer.write_u64::<LittleEndian>(graph.cbf_filter().counter_len())?;
    writer.write_u64::<LittleEndian>(pkbf_bits.or(rpkbf_bits).unwrap_or(0))?;
    writer.write_u32::<LittleEndian>(graph.dbg_filter().num_hashes() as u32)?;
    writer.write_u32::<LittleEndian>(graph.cbf_filter().num_hashes() as u32)?;
    let m_pkbf = graph
        .pkbf_filter()
        .map(|f| f.num_hashes())
        .or_else(|| graph.rpkbf_filter().map(|f| f.num_hashes()))
        .unwrap_or(0);
    writer.write_u32::<LittleEndian>(m_pkbf as u32)?;
    writer.write_u64::<LittleEndian>(seed_fingerprint())?;
    writer.write_u32::<LittleEndian>(config.d_read as u32)?;
    writer.write_u32::<LittleEndian>(config.d_frag as u32)?;

    write_bits(&mut writer, graph.dbg_filter().bits())?;
    write_bytes(&mut writer, graph.cbf_filter().counters())?;
    if let Some(pkbf) = graph.pkbf_filter() {
        for part in pkbf.parts() {
            write_bits(&mut writer, part.bits())?;
        }
    }
    if let Some(rpkbf) = graph.rpkbf_filter() {
        for part in rpkbf.parts() {
            write_bits(&mut writer, part.bits())?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<BloomDbg> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = SnapshotHeader::read_from(&mut reader)?;
    if header.m_dbg != header.m_cbf {
        return Err(AsmError::CorruptSnapshot(
            "mismatched hash counts across filters".into(),
        ));
    }

    let config = GraphConfig {
        k: header.k as usize,
        num_hashes: header.m_dbg as usize,
        stranded: header.stranded,
        d_read: header.d_read as usize,
        d_frag: header.d_frag as usize,
    };
    let sizing = FilterSizing {
        dbg_bits: header.n_dbg_bits,
        cbf_bytes: header.n_cbf_bytes,
        pkbf_bits: header.has_pkbf.then_some(header.n_pkbf_bits),
        rpkbf_bits: header.has_rpkbf.then_some(header.n_pkbf_bits),
    };
    let graph = BloomDbg::new(config, sizing)?;

    read_bits(&mut reader, graph.dbg_filter().bits())?;
    read_bytes(&mut reader, graph.cbf_filter().counters())?;
    if let Some(pkbf) = graph.pkbf_filter() {
        for part in pkbf.parts() {
            read_bits(&mut reader, part.bits())?;
        }
    }
    if let Some(rpkbf) = graph.rpkbf_filter() {
        for part in rpkbf.parts() {
            read_bits(&mut reader, part.bits())?;
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("jingwei_snapshot_tests");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn populated_graph() -> BloomDbg {
        let graph = BloomDbg::new(
            GraphConfig {
                k: 5,
                num_hashes: 3,
                stranded: false,
                d_read: 3,
                d_frag: 8,
            },
            FilterSizing {
                dbg_bits: 1 << 16,
                cbf_bytes: 1 << 16,
                pkbf_bits: Some(1 << 14),
                rpkbf_bits: Some(1 << 14),
            },
        )
        .unwrap();
        let kmers = graph.get_kmers(b"ATCCGTAGAACTTGGATGCA");
        for kmer in &kmers {
            graph.insert_hash(kmer.canonical);
            graph.insert_hash(kmer.canonical);
        }
        for pair in kmers.windows(4) {
            graph.add_paired_read(pair[0].canonical, pair[3].canonical);
            graph.add_paired_frag(pair[0].canonical, pair[3].canonical);
        }
        graph
    }

    #[test]
    fn round_trip_preserves_queries() {
        let graph = populated_graph();
        let path = scratch("round_trip.rbg");
        save_graph(&graph, &path).unwrap();
        let restored = load_graph(&path).unwrap();

        let held_in = graph.get_kmers(b"ATCCGTAGAACTTGGATGCA");
        let held_out = restored.get_kmers(b"ATCCGTAGAACTTGGATGCA");
        for (a, b) in held_in.iter().zip(&held_out) {
            assert!(restored.contains(b));
            assert_eq!(a.count, b.count);
        }
        for pair in held_out.windows(4) {
            assert!(restored.contains_paired_read(&pair[0], &pair[3]));
            assert!(restored.contains_paired_frag(&pair[0], &pair[3]));
        }
        // membership on a held-out query set matches bit for bit
        let probes = b"TTACGGATCCAGTTACAGGA";
        for (a, b) in graph
            .get_kmers(probes)
            .iter()
            .zip(&restored.get_kmers(probes))
        {
            assert_eq!(graph.contains(a), restored.contains(b));
            assert_eq!(a.count, b.count);
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn header_survives() {
        let graph = populated_graph();
        let path = scratch("header.rbg");
        save_graph(&graph, &path).unwrap();
        let header = read_header(&path).unwrap();
        assert_eq!(header.k, 5);
        assert!(!header.stranded);
        assert!(header.has_pkbf && header.has_rpkbf);
        assert_eq!(header.n_dbg_bits, 1 << 16);
        assert_eq!(header.d_read, 3);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let path = scratch("garbage.rbg");
        std::fs::write(&path, b"RBGRAPH\0junk").unwrap();
        assert!(load_graph(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
