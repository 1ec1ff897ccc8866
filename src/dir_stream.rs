//! `DirectoryStream` and `SecureDirectoryStream` — directory listing
//! and directory-relative (as opposed to path-relative) operations.

use std::sync::{Arc, Mutex};

use crate::directory_table::DirectoryTable;
use crate::error::{Error, Result};
use crate::file::File;
use crate::file_store::FileStore;
use crate::name::Name;

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: Name,
    pub file_id: u64,
}

/// A single-use iterator over a directory's entries, frozen at the
/// moment the stream is opened — later mutation of the directory is
/// not reflected.
pub struct DirectoryStream {
    remaining: Mutex<std::vec::IntoIter<DirectoryEntry>>,
}

impl DirectoryStream {
    pub fn open(dir: &Arc<File>) -> Result<Self> {
        Self::open_filtered(dir, |_| true)
    }

    pub fn open_filtered(dir: &Arc<File>, predicate: impl Fn(&Name) -> bool) -> Result<Self> {
        let table = dir.as_directory().ok_or(Error::NotDirectory)?;
        let snapshot: Vec<DirectoryEntry> = table
            .read()
            .unwrap()
            .snapshot()
            .into_iter()
            .filter(|(name, _)| predicate(name))
            .map(|(name, file_id)| DirectoryEntry { name, file_id })
            .collect();
        Ok(DirectoryStream { remaining: Mutex::new(snapshot.into_iter()) })
    }

    /// Returns the next entry, or `None` once the snapshot is exhausted.
    pub fn next_entry(&self) -> Option<DirectoryEntry> {
        self.remaining.lock().unwrap().next()
    }

    /// Drain everything remaining into a `Vec`, for callers that want
    /// the whole listing at once.
    pub fn collect_remaining(&self) -> Vec<DirectoryEntry> {
        self.remaining.lock().unwrap().by_ref().collect()
    }
}

/// Directory-relative operations bound to a specific `File`, not a
/// `Path` — immune to another thread renaming an ancestor directory
/// out from under a multi-step path-based operation.
pub struct SecureDirectoryStream {
    dir: Arc<File>,
    store: Arc<FileStore>,
}

impl SecureDirectoryStream {
    pub fn new(dir: Arc<File>, store: Arc<FileStore>) -> Result<Self> {
        if !dir.is_directory() {
            return Err(Error::NotDirectory);
        }
        Ok(SecureDirectoryStream { dir, store })
    }

    pub fn list(&self) -> Result<DirectoryStream> {
        DirectoryStream::open(&self.dir)
    }

    fn table(&self) -> &std::sync::RwLock<DirectoryTable> {
        self.dir.as_directory().expect("constructor guarantees a directory")
    }

    pub fn resolve(&self, name: &Name) -> Result<Arc<File>> {
        let id = self.table().read().unwrap().get(name).ok_or(Error::NoSuchFile)?;
        self.store.get(id).ok_or(Error::NoSuchFile)
    }

    pub fn open_subdirectory(&self, name: &Name) -> Result<SecureDirectoryStream> {
        let file = self.resolve(name)?;
        SecureDirectoryStream::new(file, Arc::clone(&self.store))
    }

    /// Unlink a non-directory entry, scoped to this directory.
    pub fn delete_file(&self, name: &Name) -> Result<()> {
        let file = self.resolve(name)?;
        if file.is_directory() {
            return Err(Error::NotDirectory);
        }
        self.table().write().unwrap().unlink(name, &file)?;
        self.store.maybe_reclaim(file.id());
        Ok(())
    }

    /// Unlink a directory entry, scoped to this directory. Fails unless
    /// the target directory is empty.
    pub fn delete_directory(&self, name: &Name) -> Result<()> {
        let file = self.resolve(name)?;
        if !file.is_directory() {
            return Err(Error::NotDirectory);
        }
        if !file.as_directory().unwrap().read().unwrap().is_empty() {
            return Err(Error::DirectoryNotEmpty);
        }
        self.table().write().unwrap().unlink(name, &file)?;
        self.store.maybe_reclaim(file.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseSensitivity, Configuration};

    #[test]
    fn stream_snapshot_is_unaffected_by_later_mutation() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let a = store.create_directory(&root);
        let name_a = Name::new("a", CaseSensitivity::CaseSensitive.into());
        root.as_directory().unwrap().write().unwrap().link(name_a.clone(), a.id(), &a).unwrap();

        let stream = DirectoryStream::open(&root).unwrap();

        let b = store.create_directory(&root);
        let name_b = Name::new("b", CaseSensitivity::CaseSensitive.into());
        root.as_directory().unwrap().write().unwrap().link(name_b, b.id(), &b).unwrap();

        let entries = stream.collect_remaining();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, name_a);
    }

    #[test]
    fn secure_stream_delete_file_requires_non_directory() {
        let store = Arc::new(FileStore::new(&Configuration::unix()));
        let root = store.create_root();
        let child = store.create_directory(&root);
        let name = Name::new("child", CaseSensitivity::CaseSensitive.into());
        root.as_directory().unwrap().write().unwrap().link(name.clone(), child.id(), &child).unwrap();

        let secure = SecureDirectoryStream::new(Arc::clone(&root), Arc::clone(&store)).unwrap();
        assert_eq!(secure.delete_file(&name), Err(Error::NotDirectory));
        assert!(secure.delete_directory(&name).is_ok());
    }
}
