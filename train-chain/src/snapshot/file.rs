//! Snapshot files on disk.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::chain::TrainChain;
use crate::config::PermitConfig;
use crate::geometry::Location;

use super::convert::{from_json, to_json};
use super::error::SnapshotError;

/// Writes a snapshot of the chain to `path`.
///
/// Creates parent directories if they don't exist.
pub fn save<L: Location + Serialize>(
    chain: &TrainChain<L>,
    path: impl AsRef<Path>,
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let io_error = |err: std::io::Error| SnapshotError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let json = to_json(chain)?;
    std::fs::write(path, json).map_err(io_error)?;

    debug!(path = %path.display(), digest = %chain.digest(), "snapshot saved");
    Ok(())
}

/// Reads a chain from the snapshot at `path`.
pub fn load<L: Location + DeserializeOwned>(
    path: impl AsRef<Path>,
    config: PermitConfig,
) -> Result<TrainChain<L>, SnapshotError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|err| SnapshotError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    from_json(&json, config)
}
