//! Commit log replay
//!
//! Rebuilds the tables from logged commit entries.

use super::{AofEntry, EntryKind};
use crate::store::Tables;
use tracing::{info, warn};

/// Replay commit entries into the tables
///
/// Each entry is applied as a whole or not at all; an entry that does not
/// apply cleanly is skipped with a warning. Returns the number of entries
/// applied and the highest transaction id seen.
pub fn replay_entries(tables: &mut Tables, entries: Vec<AofEntry>) -> (usize, u64) {
    let mut replayed = 0;
    let mut last_txn_id = 0;

    for entry in entries {
        last_txn_id = last_txn_id.max(entry.txn_id);

        match entry.kind {
            EntryKind::Commit => match tables.apply_all(&entry.mutations) {
                Ok(()) => replayed += 1,
                Err(e) => {
                    warn!("Failed to replay txn {}: {}. Skipping.", entry.txn_id, e);
                }
            },
        }
    }

    info!("Successfully replayed {} commit entries", replayed);
    (replayed, last_txn_id)
}
