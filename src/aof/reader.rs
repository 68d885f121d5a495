//! Commit log reader
//!
//! Loads the log file and parses its commit entries.

use super::AofEntry;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use tracing::{error, info, warn};

/// Commit log reader
pub struct AofReader {
    data: Vec<u8>,
}

/// Entries recovered from a log and where the intact prefix ends
#[derive(Debug)]
pub struct ParsedLog {
    pub entries: Vec<AofEntry>,
    /// Bytes up to the end of the last entry that decoded
    pub valid_len: usize,
}

impl AofReader {
    /// Load the log file
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Ok(AofReader { data })
    }

    /// Parse all entries from the log
    ///
    /// Parsing stops at the first entry that fails to decode: everything
    /// after a torn or corrupt record is ignored.
    pub fn parse_entries(&self) -> ParsedLog {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < self.data.len() {
            match AofEntry::from_bytes(&self.data[pos..]) {
                Ok((entry, size)) => {
                    entries.push(entry);
                    pos += size;
                }
                Err(e) => {
                    error!("Failed to parse commit log entry at position {}: {}", pos, e);
                    warn!(
                        "Discarding {} trailing bytes, {} entries recovered",
                        self.data.len() - pos,
                        entries.len()
                    );
                    return ParsedLog {
                        entries,
                        valid_len: pos,
                    };
                }
            }
        }

        info!("Commit log loaded successfully: {} entries", entries.len());
        ParsedLog {
            entries,
            valid_len: pos,
        }
    }

    /// Total size of the loaded data
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Cut the log file back to its intact prefix
pub fn truncate_log<P: AsRef<Path>>(path: P, len: usize) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path.as_ref())?;
    file.set_len(len as u64)?;
    file.sync_all()
}
