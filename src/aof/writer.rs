//! Commit log writer
//!
//! Appends commit entries to the log file.

use super::{AofEntry, SyncPolicy};
use crate::error::StoreError;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

struct WriterState {
    file: File,
    last_sync: Instant,
}

/// Commit log writer
pub struct AofWriter {
    path: PathBuf,
    state: Mutex<WriterState>,
    sync_policy: SyncPolicy,
}

impl AofWriter {
    /// Open the log for appending, creating it if needed
    pub fn new<P: AsRef<Path>>(path: P, sync_policy: SyncPolicy) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(AofWriter {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(WriterState {
                file,
                last_sync: Instant::now(),
            }),
            sync_policy,
        })
    }

    /// Append one entry
    ///
    /// The entry is written with a single `write_all`, so a crash leaves at
    /// worst a torn tail that the reader discards.
    pub fn write(&self, entry: &AofEntry) -> Result<(), StoreError> {
        let bytes = entry.to_bytes()?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "commit log writer poisoned"))?;
        state.file.write_all(&bytes)?;

        match self.sync_policy {
            SyncPolicy::Always => {
                state.file.sync_all()?;
            }
            SyncPolicy::EverySecond => {
                if state.last_sync.elapsed() >= Duration::from_secs(1) {
                    state.file.sync_all()?;
                    state.last_sync = Instant::now();
                }
            }
            SyncPolicy::No => {}
        }

        debug!(
            "Appended txn {} ({} mutations, {} bytes) to {:?}",
            entry.txn_id,
            entry.mutations.len(),
            bytes.len(),
            self.path
        );
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&self) -> Result<(), StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "commit log writer poisoned"))?;
        state.file.sync_all()?;
        state.last_sync = Instant::now();
        Ok(())
    }
}
