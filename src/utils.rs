use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SEQ_SUFFIXES: [&str; 10] = [
    ".fa", ".fasta", ".fna", ".fq", ".fastq", ".fa.gz", ".fasta.gz", ".fq.gz", ".fastq.gz",
    ".pseq",
];

/// Sequence files under a directory, sorted for a stable source order.
pub fn find_seq_files<P: AsRef<Path>>(path: P) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map_or(false, |name| SEQ_SUFFIXES.iter().any(|s| name.ends_with(s)))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_up_sequence_files_only() {
        let dir = std::env::temp_dir().join("jingwei_utils_tests");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        for name in ["a.fq", "b.fasta", "nested/c.fq.gz", "notes.txt"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        let found = find_seq_files(&dir);
        assert_eq!(found.len(), 3);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
