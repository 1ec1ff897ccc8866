//! `FileChannel` — a position-ful, thread-safe handle onto a regular
//! file's bytes.
//!
//! Holding an open channel keeps the underlying `File` alive (via its
//! own `Arc` clone) even after every directory entry naming it is
//! removed, and is reflected in `channel_refs` so `FileStore` knows not
//! to reclaim the file until the channel closes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::file::File;
use crate::file_store::FileStore;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        const READ   = 0b001;
        const WRITE  = 0b010;
        const APPEND = 0b100;
    }
}

/// An advisory lock token. Dropping it is the only way to release it;
/// no actual cross-channel exclusion is enforced — advisory locking is
/// a stub, not a modeled invariant.
pub struct FileLock {
    _private: (),
}

pub struct FileChannel {
    file: Arc<File>,
    store: Arc<FileStore>,
    mode: OpenMode,
    position: AtomicU64,
    closed: AtomicBool,
    io_lock: Mutex<()>,
}

impl FileChannel {
    pub fn open(file: Arc<File>, store: Arc<FileStore>, mode: OpenMode) -> Result<Self> {
        if file.as_regular().is_none() {
            return Err(Error::NotDirectory);
        }
        file.increment_channel_refs();
        let initial_position = if mode.contains(OpenMode::APPEND) { file.as_regular().unwrap().size() } else { 0 };
        Ok(FileChannel {
            file,
            store,
            mode,
            position: AtomicU64::new(initial_position),
            closed: AtomicBool::new(false),
            io_lock: Mutex::new(()),
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::ClosedChannel)
        } else {
            Ok(())
        }
    }

    fn store_ref(&self) -> &crate::byte_store::ByteStore {
        self.file.as_regular().expect("channel always opens a regular file")
    }

    pub fn position(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.position.load(Ordering::SeqCst))
    }

    pub fn set_position(&self, position: u64) -> Result<()> {
        self.check_open()?;
        self.position.store(position, Ordering::SeqCst);
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.store_ref().size())
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.check_open()?;
        if !self.mode.contains(OpenMode::READ) {
            return Err(Error::AccessDenied);
        }
        let _guard = self.io_lock.lock().unwrap();
        let position = self.position.load(Ordering::SeqCst);
        let read = self.store_ref().read(position, buf).unwrap_or(0);
        self.position.store(position + read as u64, Ordering::SeqCst);
        Ok(read)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.check_open()?;
        if !self.mode.contains(OpenMode::WRITE) {
            return Err(Error::AccessDenied);
        }
        let _guard = self.io_lock.lock().unwrap();
        let written = if self.mode.contains(OpenMode::APPEND) {
            let written = self.store_ref().append(buf)?;
            // O_APPEND semantics: the position after an append tracks
            // the store's true end, which may now reflect a write from
            // another channel on the same file, not just this one.
            self.position.store(self.store_ref().size(), Ordering::SeqCst);
            written
        } else {
            let position = self.position.load(Ordering::SeqCst);
            let written = self.store_ref().write(position, buf)?;
            self.position.store(position + written as u64, Ordering::SeqCst);
            written
        };
        self.file.set_last_modified_time(now_millis());
        Ok(written)
    }

    pub fn truncate(&self, new_size: u64) -> Result<()> {
        self.check_open()?;
        if !self.mode.contains(OpenMode::WRITE) {
            return Err(Error::AccessDenied);
        }
        let _guard = self.io_lock.lock().unwrap();
        self.store_ref().truncate(new_size)?;
        let position = self.position.load(Ordering::SeqCst);
        if position > new_size {
            self.position.store(new_size, Ordering::SeqCst);
        }
        self.file.set_last_modified_time(now_millis());
        Ok(())
    }

    /// No-op: there is nothing to flush to a backing medium for an
    /// in-memory store.
    pub fn force(&self, _include_metadata: bool) -> Result<()> {
        self.check_open()
    }

    pub fn transfer_to(&self, position: u64, count: u64, target: &FileChannel) -> Result<u64> {
        self.check_open()?;
        target.check_open()?;
        let target_position = target.position.load(Ordering::SeqCst);
        let copied = self.store_ref().transfer_to(position, count, target.store_ref(), target_position)?;
        target.position.store(target_position + copied, Ordering::SeqCst);
        Ok(copied)
    }

    pub fn transfer_from(&self, source: &FileChannel, position: u64, count: u64) -> Result<u64> {
        source.transfer_to(source.position.load(Ordering::SeqCst), count, self)?;
        let _ = position;
        Ok(count)
    }

    /// Memory-mapping is out of scope for a test-double filesystem.
    pub fn map(&self) -> Result<()> {
        Err(Error::UnsupportedOperation("map"))
    }

    pub fn lock(&self) -> Result<FileLock> {
        Err(Error::UnsupportedOperation("advisory file locking"))
    }

    pub fn try_lock(&self) -> Result<FileLock> {
        self.lock()
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.file.decrement_channel_refs();
            self.store.maybe_reclaim(self.file.id());
        }
    }
}

impl Drop for FileChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
