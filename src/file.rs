//! `File` — the inode-equivalent object every directory entry, handle,
//! and symlink ultimately resolves to.
//!
//! Addressed by a stable 64-bit id and owned exactly once, by
//! `FileStore`'s arena; everything else (a `DirectoryTable` entry, a
//! `FileChannel`, a resolved lookup result) holds either the id alone
//! or a cloned `Arc<File>` borrowed from that one owner.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::RwLock;

use dashmap::DashMap;

use crate::attr::AttrValue;
use crate::byte_store::ByteStore;
use crate::directory_table::DirectoryTable;
use crate::path::Path;

/// The file-type-specific payload a `File` carries.
pub enum FileContent {
    Directory(RwLock<DirectoryTable>),
    Regular(ByteStore),
    SymbolicLink(Path),
}

pub struct File {
    id: u64,
    link_count: AtomicU32,
    /// Number of open `FileChannel`s referencing this file. Combined
    /// with `link_count`, this is what `FileStore::maybe_reclaim` checks
    /// before dropping its arena entry.
    channel_refs: AtomicU32,
    creation_time: AtomicI64,
    last_modified_time: AtomicI64,
    last_access_time: AtomicI64,
    attributes: DashMap<String, AttrValue>,
    content: FileContent,
}

impl File {
    fn new(id: u64, content: FileContent, now: i64) -> Self {
        File {
            id,
            link_count: AtomicU32::new(0),
            channel_refs: AtomicU32::new(0),
            creation_time: AtomicI64::new(now),
            last_modified_time: AtomicI64::new(now),
            last_access_time: AtomicI64::new(now),
            attributes: DashMap::new(),
            content,
        }
    }

    pub fn with_directory_table(id: u64, table: DirectoryTable, now: i64) -> Self {
        File::new(id, FileContent::Directory(RwLock::new(table)), now)
    }

    pub fn new_regular(id: u64, store: ByteStore, now: i64) -> Self {
        File::new(id, FileContent::Regular(store), now)
    }

    pub fn new_symbolic_link(id: u64, target: Path, now: i64) -> Self {
        File::new(id, FileContent::SymbolicLink(target), now)
    }

    /// Test-only convenience: a directory file with an empty table and
    /// no timestamps, used where only link-count bookkeeping matters.
    #[cfg(test)]
    pub fn new_directory(id: u64) -> Self {
        File::new(id, FileContent::Directory(RwLock::new(DirectoryTable::new_raw())), 0)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn link_count(&self) -> u32 {
        self.link_count.load(Ordering::SeqCst)
    }

    pub fn increment_links(&self) {
        self.link_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement_links(&self) {
        self.link_count.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn increment_channel_refs(&self) {
        self.channel_refs.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement_channel_refs(&self) {
        self.channel_refs.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn channel_refs(&self) -> u32 {
        self.channel_refs.load(Ordering::SeqCst)
    }

    /// Neither a directory entry nor an open channel references this
    /// file: it is eligible for removal from `FileStore`'s arena.
    pub fn is_reclaimable(&self) -> bool {
        self.link_count() == 0 && self.channel_refs() == 0
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.content, FileContent::Directory(_))
    }

    pub fn is_regular_file(&self) -> bool {
        matches!(self.content, FileContent::Regular(_))
    }

    pub fn is_symbolic_link(&self) -> bool {
        matches!(self.content, FileContent::SymbolicLink(_))
    }

    pub fn as_directory(&self) -> Option<&RwLock<DirectoryTable>> {
        match &self.content {
            FileContent::Directory(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_regular(&self) -> Option<&ByteStore> {
        match &self.content {
            FileContent::Regular(store) => Some(store),
            _ => None,
        }
    }

    pub fn as_symbolic_link(&self) -> Option<&Path> {
        match &self.content {
            FileContent::SymbolicLink(target) => Some(target),
            _ => None,
        }
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time.load(Ordering::SeqCst)
    }

    pub fn last_modified_time(&self) -> i64 {
        self.last_modified_time.load(Ordering::SeqCst)
    }

    pub fn last_access_time(&self) -> i64 {
        self.last_access_time.load(Ordering::SeqCst)
    }

    pub fn set_last_modified_time(&self, millis: i64) {
        self.last_modified_time.store(millis, Ordering::SeqCst);
    }

    pub fn set_last_access_time(&self, millis: i64) {
        self.last_access_time.store(millis, Ordering::SeqCst);
    }

    pub fn set_creation_time(&self, millis: i64) {
        self.creation_time.store(millis, Ordering::SeqCst);
    }

    pub fn get_attribute(&self, qualified_name: &str) -> Option<AttrValue> {
        self.attributes.get(qualified_name).map(|entry| entry.value().clone())
    }

    pub fn set_attribute(&self, qualified_name: String, value: AttrValue) {
        self.attributes.insert(qualified_name, value);
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|entry| entry.key().clone()).collect()
    }
}
