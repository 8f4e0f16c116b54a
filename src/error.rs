use std::path::PathBuf;

/// Shorthand `Result` alias for this crate's operations.
pub type Result<T, E = AsmError> = std::result::Result<T, E>;

/// Fatal conditions surface through this enum; per-candidate traversal
/// outcomes never do (they are reason codes counted in statistics).
#[derive(thiserror::Error, Debug)]
pub enum AsmError {
    /// Invalid k, hash count, distance or rate at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A source that cannot be parsed. Recoverable: the source is
    /// skipped and the pipeline continues.
    #[error("unusable input {path}: {reason}")]
    InputFormat { path: PathBuf, reason: String },

    /// Filter backing could not be allocated. No partial graph is ever
    /// exposed after this.
    #[error("cannot allocate {requested} bytes of filter backing")]
    Resource { requested: u64 },

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
