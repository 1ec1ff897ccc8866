//! An in-memory hierarchical filesystem core — POSIX- and
//! Windows-style path, link, and byte-I/O semantics implemented
//! entirely in process memory, for use as a filesystem test double.

pub mod attr;
pub mod byte_store;
pub mod channel;
pub mod config;
pub mod dir_stream;
pub mod directory_table;
pub mod disk;
pub mod error;
pub mod file;
pub mod file_store;
pub mod filesystem;
pub mod lookup;
pub mod name;
pub mod path;
pub mod watch;

pub use config::Configuration;
pub use error::{Error, Result};
pub use filesystem::{CreateKind, FileSystemService};
pub use path::Path;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use channel::{FileChannel, OpenMode};
use watch::WatchService;

/// A single filesystem instance, tracking the channels and watch
/// services opened against it so `close()` can tear all of them down
/// together.
pub struct FileSystem {
    service: FileSystemService,
    channels: Mutex<Vec<Arc<FileChannel>>>,
    watch_services: Mutex<Vec<Arc<WatchService>>>,
}

impl FileSystem {
    pub fn new(config: Configuration) -> Self {
        FileSystem {
            service: FileSystemService::new(config),
            channels: Mutex::new(Vec::new()),
            watch_services: Mutex::new(Vec::new()),
        }
    }

    pub fn unix() -> Self {
        Self::new(Configuration::unix())
    }

    pub fn windows() -> Self {
        Self::new(Configuration::windows())
    }

    pub fn service(&self) -> &FileSystemService {
        &self.service
    }

    pub fn path(&self, raw: &str) -> Path {
        self.service.path_service().parse_one(raw)
    }

    pub fn open(&self, path: &Path, mode: OpenMode, create: bool) -> Result<Arc<FileChannel>> {
        let channel = Arc::new(self.service.open_regular_file(path, mode, create)?);
        self.channels.lock().unwrap().push(Arc::clone(&channel));
        Ok(channel)
    }

    pub fn watch_service(&self, poll_interval: Duration) -> Arc<WatchService> {
        let service = WatchService::start(Arc::clone(self.service.store()), poll_interval);
        self.watch_services.lock().unwrap().push(Arc::clone(&service));
        service
    }

    /// Close every channel and watch service opened through this
    /// `FileSystem`. Every resource is given a chance to close even if
    /// an earlier one reported a problem; the first such error is what
    /// gets returned. Closing an in-memory channel or
    /// watch service cannot itself fail, but the shape is kept so a
    /// future resource kind that can fail slots in without changing
    /// this method's contract.
    pub fn close(&self) -> Result<()> {
        let mut first_error: Option<Error> = None;
        let mut record = |outcome: Result<()>| {
            if let Err(err) = outcome {
                first_error.get_or_insert(err);
            }
        };
        for channel in self.channels.lock().unwrap().drain(..) {
            record(Ok(channel.close()));
        }
        for watch in self.watch_services.lock().unwrap().drain(..) {
            record(Ok(watch.close()));
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[test]
    fn create_open_write_read_and_close_round_trips() {
        let fs = FileSystem::new(Configuration::unix());
        let path = fs.path("/greeting.txt");
        fs.service().create_file(&path, CreateKind::Regular).unwrap();
        let channel = fs.open(&path, OpenMode::READ | OpenMode::WRITE, false).unwrap();
        channel.write(b"hello").unwrap();
        channel.set_position(0).unwrap();
        let mut buf = [0u8; 5];
        channel.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        fs.close().unwrap();
    }

    #[test]
    fn windows_preset_uses_backslash_separator_and_drive_root() {
        let fs = FileSystem::windows();
        let path = fs.path("C:\\work\\file.txt");
        assert!(path.is_absolute());
    }
}
