//! `DirectoryTable` — a directory's name-to-file-id mapping, including
//! its reserved `SELF` (`.`) and `PARENT` (`..`) entries.
//!
//! Entries are plain `u64` ids, not owning references: the one true
//! strong reference to each `File` lives in `FileStore`'s arena. This
//! is what keeps a directory's `SELF`/`PARENT` entries from forming an
//! uncollectable reference cycle.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::file::File;
use crate::name::Name;

pub struct DirectoryTable {
    entries: HashMap<Name, u64>,
}

impl DirectoryTable {
    /// A freshly created directory's table: `SELF` points at `own_id`,
    /// `PARENT` at `parent_id` (equal to `own_id` for a root directory).
    /// Callers are responsible for bumping `own_file`'s and
    /// `parent_file`'s link counts to match (mirrors `link`'s contract).
    pub fn new(own_id: u64, parent_id: u64, own_file: &File, parent_file: &File) -> Self {
        let mut entries = HashMap::new();
        entries.insert(Name::self_name(), own_id);
        entries.insert(Name::parent_name(), parent_id);
        own_file.increment_links();
        parent_file.increment_links();
        DirectoryTable { entries }
    }

    /// An entryless table, for use only as a placeholder until
    /// `SELF`/`PARENT` are linked in by `FileStore` during creation.
    pub(crate) fn new_raw() -> Self {
        DirectoryTable { entries: HashMap::new() }
    }

    pub fn get(&self, name: &Name) -> Option<u64> {
        self.entries.get(name).copied()
    }

    /// Add a `name -> id` entry, incrementing `file`'s link count.
    pub fn link(&mut self, name: Name, id: u64, file: &File) -> Result<()> {
        if name.is_reserved() {
            return Err(Error::FileSystem("cannot link a reserved name".to_string()));
        }
        if self.entries.contains_key(&name) {
            return Err(Error::FileAlreadyExists);
        }
        self.entries.insert(name, id);
        file.increment_links();
        Ok(())
    }

    /// Remove `name`'s entry, decrementing `file`'s link count. Returns
    /// the id that was linked under `name`.
    pub fn unlink(&mut self, name: &Name, file: &File) -> Result<u64> {
        if name.is_reserved() {
            return Err(Error::FileSystem("cannot unlink a reserved name".to_string()));
        }
        match self.entries.remove(name) {
            Some(id) => {
                file.decrement_links();
                Ok(id)
            }
            None => Err(Error::NoSuchFile),
        }
    }

    /// Repoint `PARENT` at `new_parent_id`, adjusting link counts on
    /// both the old and new parent files. Used when a directory moves.
    pub fn relink_parent(&mut self, new_parent_id: u64, old_parent_file: &File, new_parent_file: &File) {
        self.entries.insert(Name::parent_name(), new_parent_id);
        old_parent_file.decrement_links();
        new_parent_file.increment_links();
    }

    /// True if the directory holds no entries beyond `SELF`/`PARENT`.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 2
    }

    /// A stable snapshot of the non-reserved `(name, id)` entries,
    /// ordered by displayed string (not canonical form).
    /// `DirectoryStream` freezes this as its single-use snapshot at open time.
    pub fn snapshot(&self) -> Vec<(Name, u64)> {
        let mut entries: Vec<(Name, u64)> = self
            .entries
            .iter()
            .filter(|(name, _)| !name.is_reserved())
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.display().cmp(b.display()));
        entries
    }

    /// The stored key equal to `name` (the same canonical match `get`
    /// uses), keeping whatever display casing was recorded when the
    /// entry was linked.
    pub fn entry_name(&self, name: &Name) -> Option<Name> {
        self.entries.keys().find(|key| *key == name).cloned()
    }

    /// Reverse lookup: the non-reserved name under which `id` is
    /// linked, if any. Used to reconstruct a canonical path from a
    /// chain of ids alone.
    pub fn name_for_id(&self, id: u64) -> Option<Name> {
        self.entries
            .iter()
            .find(|(key, value)| !key.is_reserved() && **value == id)
            .map(|(key, _)| key.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len() - 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseSensitivity;
    use crate::file::File;
    use std::sync::Arc;

    fn dir_file(id: u64) -> Arc<File> {
        Arc::new(File::new_directory(id))
    }

    #[test]
    fn new_root_table_has_self_and_parent_pointing_at_itself() {
        let root = dir_file(1);
        let table = DirectoryTable::new(1, 1, &root, &root);
        assert_eq!(table.get(&Name::self_name()), Some(1));
        assert_eq!(table.get(&Name::parent_name()), Some(1));
        // SELF + PARENT both point back at `root`: two increments.
        assert_eq!(root.link_count(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn link_and_unlink_round_trip_and_adjust_link_count() {
        let root = dir_file(1);
        let mut table = DirectoryTable::new(1, 1, &root, &root);
        let child = dir_file(2);
        table.link(Name::new("a", CaseSensitivity::CaseSensitive.into()), 2, &child).unwrap();
        assert_eq!(child.link_count(), 1);
        assert_eq!(table.len(), 1);
        let removed = table.unlink(&Name::new("a", CaseSensitivity::CaseSensitive.into()), &child).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(child.link_count(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn linking_a_reserved_name_is_rejected() {
        let root = dir_file(1);
        let mut table = DirectoryTable::new(1, 1, &root, &root);
        let child = dir_file(2);
        assert!(table.link(Name::self_name(), 2, &child).is_err());
    }

    #[test]
    fn linking_a_duplicate_name_is_rejected() {
        let root = dir_file(1);
        let mut table = DirectoryTable::new(1, 1, &root, &root);
        let a = Name::new("a", CaseSensitivity::CaseSensitive.into());
        table.link(a.clone(), dir_file(2).id(), &dir_file(2)).unwrap();
        assert!(matches!(table.link(a, 3, &dir_file(3)), Err(Error::FileAlreadyExists)));
    }
}
