//! `LookupService` — resolves a [`Path`] against a filesystem's
//! directory tree, following symbolic links up to a bounded depth.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::file::File;
use crate::file_store::FileStore;
use crate::name::Name;
use crate::path::Path;

/// The loop-depth bound past which a chain of symbolic links is
/// treated as a loop rather than a legitimately deep indirection chain.
pub const MAX_SYMLINK_DEPTH: u32 = 10;

pub enum LookupResult {
    /// Some component before the last one did not exist, or existed but
    /// was not a directory: there is no parent to report.
    NotFound,
    /// The final component does not exist, but everything before it
    /// resolved to a directory — useful for create-style operations.
    ParentFound { parent: Arc<File> },
    /// `name` is the name as stored in `parent`'s directory table
    /// (same canonical entry the caller's component matched, but
    /// keeping whatever display casing it was linked under), not
    /// necessarily the exact string the caller passed in.
    Found { parent: Arc<File>, file: Arc<File>, name: Name },
}

pub struct LookupService<'a> {
    store: &'a FileStore,
}

impl<'a> LookupService<'a> {
    pub fn new(store: &'a FileStore) -> Self {
        LookupService { store }
    }

    /// Resolve `path` starting from `base` (the filesystem's root or a
    /// working directory, per the caller). `follow_final_symlink`
    /// controls whether the last component is itself followed if it
    /// resolves to a symbolic link.
    pub fn lookup(&self, base: &Arc<File>, path: &Path, follow_final_symlink: bool) -> Result<LookupResult> {
        let mut depth = 0u32;
        self.lookup_with_depth(base, path, follow_final_symlink, &mut depth)
    }

    /// Same as `lookup`, but threading a single symlink-depth counter
    /// through every recursive target resolution, so a chain spanning
    /// multiple directory entries (and multiple `lookup` recursions) is
    /// bounded as one chain rather than resetting at each recursion.
    fn lookup_with_depth(
        &self,
        base: &Arc<File>,
        path: &Path,
        follow_final_symlink: bool,
        depth: &mut u32,
    ) -> Result<LookupResult> {
        let components = path.components();
        if components.is_empty() {
            return Ok(LookupResult::Found { parent: Arc::clone(base), file: Arc::clone(base), name: Name::self_name() });
        }

        let mut current = Arc::clone(base);

        for (index, component) in components.iter().enumerate() {
            let is_last = index == components.len() - 1;

            if !current.is_directory() {
                return Ok(LookupResult::NotFound);
            }

            let (child_id, entry_name) = {
                let table = current.as_directory().unwrap().read().unwrap();
                (table.get(component), table.entry_name(component))
            };

            let child_id = match child_id {
                Some(id) => id,
                None => {
                    return if is_last {
                        Ok(LookupResult::ParentFound { parent: current })
                    } else {
                        Ok(LookupResult::NotFound)
                    };
                }
            };
            // `entry_name` mirrors `child_id`: both come from the same
            // successful table lookup, so this is always `Some`.
            let entry_name = entry_name.unwrap_or_else(|| component.clone());

            let mut child = self.store.get(child_id).ok_or(Error::NoSuchFile)?;

            let should_follow = !is_last || follow_final_symlink;
            if should_follow {
                while child.is_symbolic_link() {
                    *depth += 1;
                    if *depth > MAX_SYMLINK_DEPTH {
                        return Err(Error::TooManySymbolicLinks);
                    }
                    let target = child.as_symbolic_link().unwrap().clone();
                    let resolved = self.resolve_symlink_target(&current, &target, depth)?;
                    child = resolved;
                }
            }

            if is_last {
                return Ok(LookupResult::Found { parent: current, file: child, name: entry_name });
            }
            current = child;
        }

        unreachable!("loop always returns on the last component")
    }

    /// Resolve a symlink's stored target path relative to the directory
    /// it was found in, recursing back through `lookup_with_depth` so
    /// the target's own intermediate components may also be symlinks,
    /// still bounded by the same shared depth counter.
    fn resolve_symlink_target(&self, containing_dir: &Arc<File>, target: &Path, depth: &mut u32) -> Result<Arc<File>> {
        let result = self.lookup_with_depth(containing_dir, target, true, depth)?;
        match result {
            LookupResult::Found { file, .. } => Ok(file),
            _ => Err(Error::NoSuchFile),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseSensitivity, Configuration};
    use crate::path::PathTag;

    fn link(parent: &Arc<File>, name: &str, child: &Arc<File>) {
        let name = Name::new(name, CaseSensitivity::CaseSensitive.into());
        parent.as_directory().unwrap().write().unwrap().link(name, child.id(), child).unwrap();
    }

    #[test]
    fn looks_up_nested_directories() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let a = store.create_directory(&root);
        link(&root, "a", &a);
        let b = store.create_directory(&a);
        link(&a, "b", &b);

        let tag = PathTag::new();
        let path = Path::new(tag, None, vec![Name::new("a", CaseSensitivity::CaseSensitive.into()), Name::new("b", CaseSensitivity::CaseSensitive.into())]);
        let lookup = LookupService::new(&store);
        match lookup.lookup(&root, &path, true).unwrap() {
            LookupResult::Found { file, .. } => assert_eq!(file.id(), b.id()),
            _ => panic!("expected Found"),
        }
    }

    #[test]
    fn missing_final_component_reports_parent_found() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let tag = PathTag::new();
        let path = Path::new(tag, None, vec![Name::new("missing", CaseSensitivity::CaseSensitive.into())]);
        let lookup = LookupService::new(&store);
        match lookup.lookup(&root, &path, true).unwrap() {
            LookupResult::ParentFound { parent } => assert_eq!(parent.id(), root.id()),
            _ => panic!("expected ParentFound"),
        }
    }

    #[test]
    fn missing_intermediate_component_reports_not_found() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let tag = PathTag::new();
        let path = Path::new(
            tag,
            None,
            vec![Name::new("missing", CaseSensitivity::CaseSensitive.into()), Name::new("x", CaseSensitivity::CaseSensitive.into())],
        );
        let lookup = LookupService::new(&store);
        assert!(matches!(lookup.lookup(&root, &path, true).unwrap(), LookupResult::NotFound));
    }

    #[test]
    fn self_referential_symlink_chain_hits_depth_bound() {
        let store = FileStore::new(&Configuration::unix());
        let root = store.create_root();
        let tag = PathTag::new();
        let self_path = Path::new(tag.clone(), None, vec![Name::new("loop", CaseSensitivity::CaseSensitive.into())]);
        let link_file = store.create_symbolic_link(self_path);
        link(&root, "loop", &link_file);

        let path = Path::new(tag, None, vec![Name::new("loop", CaseSensitivity::CaseSensitive.into())]);
        let lookup = LookupService::new(&store);
        assert!(matches!(lookup.lookup(&root, &path, true), Err(Error::TooManySymbolicLinks)));
    }
}
