//! On-disk item inventory for the Echo node.
//!
//! Tracks two in-memory sets: identifiers the Overseer has authorized for
//! upload but which haven't arrived yet, and identifiers fully stored on
//! disk. The stored set is rebuilt from a directory scan at startup and is
//! the authority for 404 decisions, so unknown ids never reach the
//! filesystem.

mod ident;
mod inventory;

pub use ident::{is_valid_id, item_path, PathError};
pub use inventory::{Inventory, InventoryError};

/// Extension given to every stored item file.
pub const ITEM_EXTENSION: &str = "zip";
