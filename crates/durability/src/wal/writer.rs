//! Append-only log
//!
//! One file, opened in append mode. Each [`JournalRecord`] is written as a
//! single frame with one `write_all`; the fsync policy comes from
//! [`DurabilityMode`].
//!
//! Opening a log truncates any torn tail left by a crash so new frames
//! always follow the last valid one.
//!
//! An append that fails, at the write or at the fsync, is cut back off the
//! file before the error is returned, so a batch the store reported as
//! failed can never come back on replay. If the cut itself fails the log is
//! poisoned and refuses further appends until reopened.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use qpledger_core::LedgerResult;
use qpledger_storage::{Journal, JournalRecord};
use tracing::{debug, warn};

use super::reader::{read_log, WalReadResult};
use super::record::encode_frame;
use super::{DurabilityMode, WalError};

/// File operations the log needs
trait LogFile: Write + Send {
    fn sync_data(&self) -> io::Result<()>;
    fn set_len(&self, len: u64) -> io::Result<()>;
}

impl LogFile for File {
    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

struct WalInner {
    file: Box<dyn LogFile>,
    /// Length of the file up to the end of the last complete frame
    len: u64,
    /// Frames written since the last fsync
    pending: usize,
    /// Set when a failed append could not be cut back off the file
    poisoned: bool,
}

impl WalInner {
    /// Cut the file back to the last acknowledged frame
    fn rollback(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            warn!(target: "qpledger::wal", error = %e, len = self.len, "WAL rollback failed, log poisoned");
            self.poisoned = true;
        }
    }
}

/// Write-ahead log file
pub struct WAL {
    path: PathBuf,
    mode: DurabilityMode,
    inner: Mutex<WalInner>,
}

impl WAL {
    /// Open or create the log at `path`, discarding any torn tail
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> Result<Self, WalError> {
        Self::open_and_read(path, mode).map(|(wal, _)| wal)
    }

    /// Open the log and return its valid records in the same pass
    pub fn open_and_read(
        path: impl AsRef<Path>,
        mode: DurabilityMode,
    ) -> Result<(Self, WalReadResult), WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let scan = read_log(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        if let Some(info) = &scan.corruption {
            warn!(
                target: "qpledger::wal",
                path = %path.display(),
                offset = info.offset,
                discarded = info.discarded_bytes,
                reason = %info.reason,
                "Truncating damaged WAL tail"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        debug!(target: "qpledger::wal", path = %path.display(), records = scan.records.len(), ?mode, "WAL opened");

        let wal = Self::with_file(path, mode, Box::new(file), scan.valid_len);
        Ok((wal, scan))
    }

    fn with_file(path: PathBuf, mode: DurabilityMode, file: Box<dyn LogFile>, len: u64) -> Self {
        WAL {
            path,
            mode,
            inner: Mutex::new(WalInner {
                file,
                len,
                pending: 0,
                poisoned: false,
            }),
        }
    }

    /// Log file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Active fsync policy
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }

    /// Frames written but not yet fsynced
    pub fn pending(&self) -> usize {
        self.inner.lock().pending
    }

    /// Size of the valid log in bytes
    pub fn len(&self) -> u64 {
        self.inner.lock().len
    }

    /// True when no frame has ever been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every valid record currently in the file
    pub fn read_all(&self) -> Result<Vec<JournalRecord>, WalError> {
        let _inner = self.inner.lock();
        Ok(read_log(&self.path)?.records)
    }

    /// Whether a failed rollback has disabled appends
    pub fn is_poisoned(&self) -> bool {
        self.inner.lock().poisoned
    }

    /// Append one record, fsyncing if the mode calls for it.
    ///
    /// A failed write or fsync is rolled back to the previous frame
    /// boundary; only frames acknowledged with `Ok` ever stay in the file.
    pub fn append_record(&self, record: &JournalRecord) -> Result<(), WalError> {
        let frame = encode_frame(record)?;
        let mut inner = self.inner.lock();
        if inner.poisoned {
            return Err(WalError::Poisoned);
        }

        if let Err(e) = inner.file.write_all(&frame) {
            inner.rollback();
            return Err(e.into());
        }

        let pending = inner.pending + 1;
        if self.mode.should_sync(pending) {
            if let Err(e) = inner.file.sync_data() {
                warn!(target: "qpledger::wal", seq = record.seq, error = %e, "WAL fsync failed, frame discarded");
                inner.rollback();
                return Err(e.into());
            }
            inner.pending = 0;
        } else {
            inner.pending = pending;
        }
        inner.len += frame.len() as u64;
        Ok(())
    }

    /// fsync everything written so far, regardless of mode
    pub fn flush(&self) -> Result<(), WalError> {
        let mut inner = self.inner.lock();
        inner.file.flush()?;
        inner.file.sync_data()?;
        inner.pending = 0;
        Ok(())
    }
}

impl Journal for WAL {
    fn append(&self, record: &JournalRecord) -> LedgerResult<()> {
        self.append_record(record).map_err(Into::into)
    }

    fn sync(&self) -> LedgerResult<()> {
        self.flush().map_err(Into::into)
    }
}

impl Drop for WAL {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.pending > 0 {
            if let Err(e) = inner.file.sync_data() {
                warn!(target: "qpledger::wal", error = %e, pending = inner.pending, "WAL sync on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for WAL {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WAL")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}
