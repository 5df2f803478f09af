//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{DequeError, Result};
use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: BufWriter<File>,

    /// LSN the next append will receive
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries written since the last fsync
    uncommitted: usize,

    /// Current file size in bytes
    size_bytes: u64,

    /// Set when a write or fsync failed; the file may no longer match memory
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file, continuing after its last valid LSN
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };
        Self::resume(path, sync_strategy, last_lsn)
    }

    /// Open a WAL whose last valid LSN is already known (after recovery)
    pub fn resume(path: &Path, sync_strategy: WalSyncStrategy, last_lsn: u64) -> Result<Self> {
        let file = Self::open_append(path)?;
        let size_bytes = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
            size_bytes,
            poisoned: false,
        })
    }

    /// Append one batch to the WAL, returning its LSN
    ///
    /// The entry is always handed to the OS before returning; fsync follows
    /// the configured strategy. Once the frame is written the append succeeds
    /// even if the fsync fails, because recovery would replay it. Either
    /// failure poisons the writer and every later append is refused.
    pub fn append(&mut self, batch: Vec<Operation>) -> Result<u64> {
        self.ensure_healthy()?;

        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, batch).serialize()?;

        if let Err(e) = self.file.write_all(&frame).and_then(|_| self.file.flush()) {
            self.poisoned = true;
            return Err(DequeError::WalWrite(format!("append LSN {}: {}", lsn, e)));
        }

        self.next_lsn += 1;
        self.size_bytes += frame.len() as u64;
        self.uncommitted += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count.max(1),
        };
        if due {
            if let Err(e) = self.sync() {
                tracing::error!("WAL sync after LSN {} failed, refusing further writes: {}", lsn, e);
            }
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_healthy()?;
        let synced = self
            .file
            .flush()
            .and_then(|_| self.file.get_ref().sync_data());
        if let Err(e) = synced {
            self.poisoned = true;
            return Err(e.into());
        }
        self.uncommitted = 0;
        Ok(())
    }

    /// Whether an earlier write or fsync failed
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Drop all entries; LSNs keep increasing
    pub fn truncate(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().set_len(0)?;
        self.file.get_ref().sync_all()?;
        self.size_bytes = 0;
        self.uncommitted = 0;
        Ok(())
    }

    /// Atomically replace the log with a single entry holding `batch`
    ///
    /// The new log is written beside the old one and renamed over it.
    pub fn rewrite(&mut self, batch: Vec<Operation>) -> Result<u64> {
        self.ensure_healthy()?;
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, batch).serialize()?;

        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&frame)?;
            tmp.sync_all()?;
        }

        self.file.flush()?;
        fs::rename(&tmp_path, &self.path)?;

        // The old handle now points at the replaced file
        match Self::open_append(&self.path) {
            Ok(file) => self.file = BufWriter::new(file),
            Err(e) => {
                self.poisoned = true;
                return Err(e);
            }
        }

        self.next_lsn += 1;
        self.size_bytes = frame.len() as u64;
        self.uncommitted = 0;
        Ok(lsn)
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries appended since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Current size of the log file in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_append(path: &Path) -> Result<File> {
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.poisoned {
            return Err(DequeError::WalWrite(format!(
                "{} is poisoned by an earlier I/O failure",
                self.path.display()
            )));
        }
        Ok(())
    }
}
