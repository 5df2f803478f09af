//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{DequeError, Result};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,

    /// Writes of one committed transaction, applied atomically on replay
    pub batch: Vec<Operation>,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    /// The key this operation touches
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, batch: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self { lsn, timestamp, batch }
    }

    /// Encode the entry as a complete frame (header + data)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len()).map_err(|_| {
            DequeError::WalWrite(format!("entry of {} bytes exceeds frame limit", data.len()))
        })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_be_bytes());
        frame.extend_from_slice(&Self::compute_crc(&data).to_be_bytes());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode a complete frame, validating length, checksum and LSN
    pub fn deserialize(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(DequeError::WalCorruption(format!(
                "frame of {} bytes is shorter than the header",
                frame.len()
            )));
        }

        let (lsn, crc, len) = Self::parse_header(&frame[..HEADER_SIZE]);
        let data = &frame[HEADER_SIZE..];
        if data.len() != len as usize {
            return Err(DequeError::WalCorruption(format!(
                "length mismatch: header says {}, frame has {}",
                len,
                data.len()
            )));
        }

        let actual = Self::compute_crc(data);
        if actual != crc {
            return Err(DequeError::WalCorruption(format!(
                "CRC mismatch for LSN {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| DequeError::WalCorruption(format!("undecodable entry: {}", e)))?;
        if entry.lsn != lsn {
            return Err(DequeError::WalCorruption(format!(
                "LSN mismatch: header {}, body {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }

    /// CRC32 over the encoded data section
    pub fn compute_crc(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Split a header into (lsn, crc, len)
    pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&header[0..8]);
        let crc = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        let len = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
        (u64::from_be_bytes(lsn), crc, len)
    }
}
