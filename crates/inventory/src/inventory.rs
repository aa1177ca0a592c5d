//! The expected-upload and stored-item sets, plus the startup scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use echo_protocol::types::StoredItem;

use crate::ident;

/// Errors from inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The storage directory could not be created or read. Fatal at startup.
    #[error("storage directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stat item {id}: {source}")]
    Stat { id: String, source: std::io::Error },

    #[error(transparent)]
    Path(#[from] ident::PathError),
}

/// In-memory reflection of what is on disk.
///
/// Both sets are guarded by plain mutexes; every critical section is a
/// handful of hash operations, never I/O. Lock one set at a time.
pub struct Inventory {
    root: PathBuf,
    expected: Mutex<HashSet<String>>,
    stored: Mutex<HashSet<String>>,
}

impl Inventory {
    /// Ensures the storage directory exists and scans it for stored items.
    ///
    /// Only entries named `<uuid>.zip` are tracked; anything else in the
    /// directory is ignored and will never be served or deleted.
    pub fn bootstrap(root: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| InventoryError::Directory {
            path: root.clone(),
            source,
        })?;
        let root = std::fs::canonicalize(&root).map_err(|source| InventoryError::Directory {
            path: root.clone(),
            source,
        })?;

        let mut stored = HashSet::new();
        let entries = std::fs::read_dir(&root).map_err(|source| InventoryError::Directory {
            path: root.clone(),
            source,
        })?;
        for entry in entries.flatten() {
            if let Some(id) = item_id_from_path(&entry.path()) {
                stored.insert(id);
            }
        }

        tracing::info!(
            root = %root.display(),
            items = stored.len(),
            "storage inventory ready"
        );

        Ok(Self {
            root,
            expected: Mutex::new(HashSet::new()),
            stored: Mutex::new(stored),
        })
    }

    /// The canonicalized storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the on-disk path for an item id.
    pub fn item_path(&self, id: &str) -> Result<PathBuf, ident::PathError> {
        ident::item_path(&self.root, id)
    }

    /// Authorizes one upload for `id`. Idempotent.
    ///
    /// Returns `false` (and records nothing) if the id is not a valid UUID.
    pub fn mark_expected(&self, id: &str) -> bool {
        if !ident::is_valid_id(id) {
            tracing::warn!(id, "told to expect an upload for an invalid identifier");
            return false;
        }
        self.expected.lock().unwrap().insert(id.to_string());
        true
    }

    /// Atomically tests and removes `id` from the expected set.
    ///
    /// The authorization is single-use: of any number of concurrent upload
    /// attempts for the same id, exactly one sees `true`.
    pub fn consume_expected(&self, id: &str) -> bool {
        self.expected.lock().unwrap().remove(id)
    }

    /// Records that `id` is fully on disk.
    pub fn mark_stored(&self, id: &str) {
        self.stored.lock().unwrap().insert(id.to_string());
    }

    /// Removes `id` from the stored set.
    pub fn unmark_stored(&self, id: &str) {
        self.stored.lock().unwrap().remove(id);
    }

    pub fn is_stored(&self, id: &str) -> bool {
        self.stored.lock().unwrap().contains(id)
    }

    pub fn is_expected(&self, id: &str) -> bool {
        self.expected.lock().unwrap().contains(id)
    }

    /// Byte size of a stored item's file.
    pub fn stat_item(&self, id: &str) -> Result<u64, InventoryError> {
        let path = self.item_path(id)?;
        let meta = std::fs::metadata(&path).map_err(|source| InventoryError::Stat {
            id: id.to_string(),
            source,
        })?;
        Ok(meta.len())
    }

    /// Stats every stored item for a refresh listing.
    ///
    /// Items that fail to stat (e.g. deleted out from under the node) are
    /// logged and skipped rather than failing the whole listing.
    pub fn list_items(&self) -> Vec<StoredItem> {
        let ids: Vec<String> = {
            let stored = self.stored.lock().unwrap();
            stored.iter().cloned().collect()
        };

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(path) = self.item_path(&id) else {
                continue;
            };
            match std::fs::metadata(&path) {
                Ok(meta) => {
                    let modified = meta
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());
                    items.push(StoredItem {
                        id,
                        size: meta.len(),
                        modified,
                    });
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "skipping unstattable item in listing");
                }
            }
        }
        items
    }
}

/// Extracts a valid item id from a directory entry path, or `None`.
fn item_id_from_path(path: &Path) -> Option<String> {
    if path.extension()?.to_str()? != crate::ITEM_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    ident::is_valid_id(stem).then(|| stem.to_string())
}
