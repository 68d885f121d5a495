//! Commit log entry format
//!
//! One entry per committed unit of work.
//!
//! Binary format: [kind(u8)] [timestamp(u64)] [txn_id(u64)] [count(u32)]
//! [count x (len(u32) [json mutation])] [checksum(u64)]

use crate::error::StoreError;
use crate::store::Mutation;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;

/// Header size: kind + timestamp + txn_id + count
const HEADER_LEN: usize = 1 + 8 + 8 + 4;

/// Checksum trailer size
const CHECKSUM_LEN: usize = 8;

/// Kind of log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// A committed unit of work
    Commit = 1,
}

impl EntryKind {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(EntryKind::Commit),
            _ => None,
        }
    }
}

/// Commit log entry
#[derive(Debug, Clone, PartialEq)]
pub struct AofEntry {
    pub kind: EntryKind,
    /// Milliseconds since UNIX epoch
    pub timestamp: u64,
    pub txn_id: u64,
    /// Mutations of the unit, in execution order
    pub mutations: Vec<Mutation>,
}

impl AofEntry {
    /// Create a commit entry stamped with the current time
    pub fn commit(txn_id: u64, mutations: Vec<Mutation>) -> Self {
        AofEntry {
            kind: EntryKind::Commit,
            timestamp: Utc::now().timestamp_millis().max(0) as u64,
            txn_id,
            mutations,
        }
    }

    /// Serialize to bytes with checksum
    pub fn to_bytes(&self) -> Result<Bytes, StoreError> {
        let items = self
            .mutations
            .iter()
            .map(|m| serde_json::to_vec(m).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Corrupt(format!("cannot encode mutation: {}", e)))?;

        let body_len: usize = items.iter().map(|item| 4 + item.len()).sum();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len + CHECKSUM_LEN);

        buf.put_u8(self.kind as u8);
        buf.put_u64_le(self.timestamp);
        buf.put_u64_le(self.txn_id);
        buf.put_u32_le(items.len() as u32);

        for item in &items {
            buf.put_u32_le(item.len() as u32);
            buf.put_slice(item);
        }

        // xxhash64 of everything before the trailer
        let checksum = xxhash_rust::xxh64::xxh64(&buf, 0);
        buf.put_u64_le(checksum);

        Ok(buf.freeze())
    }

    /// Deserialize from bytes with checksum verification
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), StoreError> {
        if data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(corrupt("insufficient data"));
        }

        let kind = EntryKind::from_u8(data[0]).ok_or_else(|| corrupt("invalid entry kind"))?;
        let mut pos = 1;

        let timestamp = read_u64(data, &mut pos)?;
        let txn_id = read_u64(data, &mut pos)?;
        let count = read_u32(data, &mut pos)? as usize;

        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let len = read_u32(data, &mut pos)? as usize;
            if pos + len > data.len() {
                return Err(corrupt("invalid mutation length"));
            }
            items.push(&data[pos..pos + len]);
            pos += len;
        }

        let stored_checksum = read_u64(data, &mut pos)?;
        let calculated_checksum = xxhash_rust::xxh64::xxh64(&data[..pos - CHECKSUM_LEN], 0);
        if stored_checksum != calculated_checksum {
            return Err(corrupt(format!(
                "checksum mismatch: expected {}, got {}",
                stored_checksum, calculated_checksum
            )));
        }

        // Only decode payloads once the frame is known to be intact
        let mutations = items
            .into_iter()
            .map(serde_json::from_slice::<Mutation>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt(format!("cannot decode mutation: {}", e)))?;

        Ok((
            AofEntry {
                kind,
                timestamp,
                txn_id,
                mutations,
            },
            pos,
        ))
    }
}

fn corrupt(msg: impl Into<String>) -> StoreError {
    StoreError::Corrupt(msg.into())
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32, StoreError> {
    let bytes = data
        .get(*pos..*pos + 4)
        .ok_or_else(|| corrupt("truncated u32"))?;
    *pos += 4;
    Ok(u32::from_le_bytes(bytes.try_into().map_err(|_| corrupt("truncated u32"))?))
}

fn read_u64(data: &[u8], pos: &mut usize) -> Result<u64, StoreError> {
    let bytes = data
        .get(*pos..*pos + 8)
        .ok_or_else(|| corrupt("truncated u64"))?;
    *pos += 8;
    Ok(u64::from_le_bytes(bytes.try_into().map_err(|_| corrupt("truncated u64"))?))
}
