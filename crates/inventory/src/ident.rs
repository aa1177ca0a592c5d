//! Item identifier validation and constrained path resolution.
//!
//! Identifiers become file names, so nothing that fails UUID validation may
//! ever be used to build a filesystem path.

use std::path::{Path, PathBuf};

/// Errors from resolving an item path.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("not a valid item identifier: {0:?}")]
    InvalidId(String),

    #[error("resolved path escapes the storage root: {0}")]
    OutsideRoot(PathBuf),
}

/// Returns `true` if the candidate parses as a UUID (any version).
pub fn is_valid_id(candidate: &str) -> bool {
    uuid::Uuid::parse_str(candidate).is_ok()
}

/// Resolves the on-disk path for an item, constrained to `root`.
///
/// UUID validation already rules out path separators and `..` components;
/// the containment check guards the same invariant from the other side.
pub fn item_path(root: &Path, id: &str) -> Result<PathBuf, PathError> {
    if !is_valid_id(id) {
        return Err(PathError::InvalidId(id.to_string()));
    }

    let path = root.join(format!("{id}.{}", crate::ITEM_EXTENSION));
    if !path.starts_with(root) {
        return Err(PathError::OutsideRoot(path));
    }

    Ok(path)
}
