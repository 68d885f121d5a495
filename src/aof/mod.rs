//! Append-only commit log
//!
//! Provides durability by logging every committed unit of work to disk as a
//! single checksummed entry, so a unit is either fully replayed or not at all.

mod entry;
mod reader;
mod replay;
mod writer;

pub use entry::{AofEntry, EntryKind};
pub use reader::{truncate_log, AofReader, ParsedLog};
pub use replay::replay_entries;
pub use writer::AofWriter;

use serde::Deserialize;

/// Commit log sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Sync after every commit (safest, slowest)
    Always,
    /// Sync every second (balanced)
    #[default]
    EverySecond,
    /// Let the OS decide when to sync (fastest, least safe)
    No,
}

impl std::str::FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(SyncPolicy::Always),
            "every_second" | "everysec" => Ok(SyncPolicy::EverySecond),
            "no" => Ok(SyncPolicy::No),
            other => Err(format!("unknown sync policy '{}'", other)),
        }
    }
}
