//! `FileStore` — the single owner of every `File` in a filesystem
//! instance, addressed by monotonically increasing 64-bit ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::attr::{AttrValue, AttributeProvider};
use crate::byte_store::ByteStore;
use crate::config::Configuration;
use crate::directory_table::DirectoryTable;
use crate::disk::Disk;
use crate::error::{Error, Result};
use crate::file::File;
use crate::path::Path;

pub struct FileStore {
    next_id: AtomicU64,
    arena: DashMap<u64, Arc<File>>,
    disk: Arc<Disk>,
    providers: HashMap<String, Box<dyn AttributeProvider>>,
}

fn now_millis() -> i64 {
    // A monotonic, wall-clock-independent counter would do just as well
    // here; `SystemTime` keeps timestamps meaningful to a caller that
    // inspects them, at the cost of being technically non-monotonic
    // under clock adjustment, same tradeoff the host OS makes.
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl FileStore {
    pub fn new(config: &Configuration) -> Self {
        FileStore {
            next_id: AtomicU64::new(0),
            arena: DashMap::new(),
            disk: Arc::new(Disk::new(config)),
            providers: crate::attr::build_registry(&config.attribute_providers),
        }
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self, id: u64) -> Option<Arc<File>> {
        self.arena.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn apply_defaults(&self, file: &File) {
        for provider in self.providers.values() {
            for (name, value) in provider.default_values() {
                file.set_attribute(name, value);
            }
        }
    }

    /// Create a filesystem's super-root: a directory whose `SELF` and
    /// `PARENT` entries both point at itself.
    pub fn create_root(&self) -> Arc<File> {
        let id = self.alloc_id();
        let now = now_millis();
        let file = Arc::new(File::with_directory_table(id, DirectoryTable::new_raw(), now));
        self.arena.insert(id, Arc::clone(&file));
        let table = DirectoryTable::new(id, id, &file, &file);
        *file.as_directory().unwrap().write().unwrap() = table;
        self.apply_defaults(&file);
        file
    }

    /// Create a new, empty subdirectory under `parent`, without linking
    /// it into `parent`'s table — the caller (`FileSystemService`) does
    /// that under the filesystem-wide lock once the name is validated.
    pub fn create_directory(&self, parent: &Arc<File>) -> Arc<File> {
        let id = self.alloc_id();
        let now = now_millis();
        let file = Arc::new(File::with_directory_table(id, DirectoryTable::new_raw(), now));
        self.arena.insert(id, Arc::clone(&file));
        let table = DirectoryTable::new(id, parent.id(), &file, parent);
        *file.as_directory().unwrap().write().unwrap() = table;
        self.apply_defaults(&file);
        file
    }

    pub fn create_regular_file(&self) -> Arc<File> {
        let id = self.alloc_id();
        let now = now_millis();
        let file = Arc::new(File::new_regular(id, ByteStore::new(Arc::clone(&self.disk)), now));
        self.arena.insert(id, Arc::clone(&file));
        self.apply_defaults(&file);
        file
    }

    pub fn create_symbolic_link(&self, target: Path) -> Arc<File> {
        let id = self.alloc_id();
        let now = now_millis();
        let file = Arc::new(File::new_symbolic_link(id, target, now));
        self.arena.insert(id, Arc::clone(&file));
        self.apply_defaults(&file);
        file
    }

    /// Duplicate a regular file's bytes and basic/posix attributes into
    /// a brand new file, used by `FileSystemService::move_or_copy` for
    /// cross-filesystem (or explicitly requested) copies.
    pub fn copy_regular_file(&self, source: &Arc<File>) -> Result<Arc<File>> {
        let source_store = source.as_regular().ok_or(Error::NotDirectory)?;
        let copy = self.create_regular_file();
        copy.as_regular().unwrap().copy_from(source_store)?;
        for name in source.attribute_names() {
            if let Some(value) = source.get_attribute(&name) {
                copy.set_attribute(name, value);
            }
        }
        Ok(copy)
    }

    /// Remove `id` from the arena if it is neither linked from any
    /// directory nor referenced by an open channel. No-op otherwise;
    /// safe to call speculatively after every unlink/close.
    pub fn maybe_reclaim(&self, id: u64) {
        if let Some(entry) = self.arena.get(&id) {
            if !entry.value().is_reclaimable() {
                return;
            }
        } else {
            return;
        }
        self.arena.remove(&id);
    }

    pub fn disk(&self) -> &Arc<Disk> {
        &self.disk
    }

    pub fn get_attribute(&self, file: &File, view: &str, attribute: &str) -> Result<Option<AttrValue>> {
        if !self.providers.contains_key(view) {
            return Err(Error::ProviderMismatch);
        }
        Ok(file.get_attribute(&format!("{view}:{attribute}")))
    }

    pub fn set_attribute(&self, file: &File, view: &str, attribute: &str, value: AttrValue) -> Result<()> {
        if !self.providers.contains_key(view) {
            return Err(Error::ProviderMismatch);
        }
        file.set_attribute(format!("{view}:{attribute}"), value);
        Ok(())
    }

    pub fn read_attributes(&self, file: &File, view: &str) -> Result<Vec<(String, AttrValue)>> {
        let provider = self.providers.get(view).ok_or(Error::ProviderMismatch)?;
        Ok(provider
            .attributes()
            .iter()
            .filter_map(|attribute| {
                file.get_attribute(&format!("{view}:{attribute}")).map(|value| (attribute.to_string(), value))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_root_has_link_count_two() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        assert_eq!(root.link_count(), 2);
    }

    #[test]
    fn create_directory_links_parent_and_self() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let child = store.create_directory(&root);
        // child.SELF -> child (1), child.PARENT -> root (parent gets +1).
        assert_eq!(child.link_count(), 1);
        assert_eq!(root.link_count(), 3);
    }

    #[test]
    fn maybe_reclaim_drops_unlinked_unreferenced_file() {
        let store = FileStore::new(&Configuration::unix());
        let file = store.create_regular_file();
        let id = file.id();
        drop(file);
        store.maybe_reclaim(id);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn maybe_reclaim_keeps_linked_file() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let child = store.create_directory(&root);
        let child_id = child.id();
        store.maybe_reclaim(child_id);
        assert!(store.get(child_id).is_some());
    }

    #[test]
    fn new_regular_file_gets_posix_defaults() {
        let store = FileStore::new(&Configuration::unix());
        let file = store.create_regular_file();
        let attrs = store.read_attributes(&file, "posix").unwrap();
        assert!(attrs.iter().any(|(name, _)| name == "permissions"));
    }
}
