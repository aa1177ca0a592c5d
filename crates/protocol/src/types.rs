//! Shared types carried in channel payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Disk usage snapshot for the storage mount, in bytes.
///
/// Raw numbers from the filesystem report; the node does not enforce
/// `used + free == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// One fully-stored item, as reported in refresh listings.
///
/// Size and modified time come from a filesystem stat at report time; no
/// sidecar metadata is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}
