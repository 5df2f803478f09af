//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{DequeError, Result};
use super::entry::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset just past the last entry returned
    position: u64,

    /// File length at open time
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file and `WalCorruption` for a
    /// torn or damaged frame. The reader must not be used after an error.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.position >= self.file_len {
            return Ok(None);
        }

        let remaining = self.file_len - self.position;
        if remaining < HEADER_SIZE as u64 {
            return Err(DequeError::WalCorruption(format!(
                "torn header at offset {} ({} trailing bytes)",
                self.position, remaining
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;

        let (_, _, len) = WalEntry::parse_header(&header);
        let len = len as u64;
        if len > remaining - HEADER_SIZE as u64 {
            return Err(DequeError::WalCorruption(format!(
                "torn entry at offset {}: needs {} bytes, {} available",
                self.position,
                len,
                remaining - HEADER_SIZE as u64
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + len as usize);
        frame.extend_from_slice(&header);
        frame.resize(HEADER_SIZE + len as usize, 0);
        self.reader.read_exact(&mut frame[HEADER_SIZE..])?;

        let entry = WalEntry::deserialize(&frame)?;
        self.position += HEADER_SIZE as u64 + len;
        Ok(Some(entry))
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            failed: false,
        }
    }
}

/// Iterator over WAL entries
///
/// Yields the first error once and then stops.
pub struct WalIterator {
    reader: WalReader,
    failed: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
