//! Snapshot error types.

use std::path::PathBuf;

/// Errors from reading or writing snapshots.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot was written by an incompatible version
    #[error("unsupported snapshot version '{0}'")]
    UnsupportedVersion(String),

    /// The document does not describe a valid chain
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// An identifier appears more than once
    #[error("duplicate identifier in snapshot: {0}")]
    DuplicateIdentifier(String),

    /// Reading or writing the snapshot file failed
    #[error("snapshot file {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotError::Malformed(err.to_string())
    }
}
