//! `FileSystemService` — the operation surface a filesystem instance
//! exposes: create, open, delete, link, move/copy, and the handful of
//! path-identity queries built on top of them.
//!
//! A single `RwLock` guards the whole hierarchy (lookup, create,
//! delete, move, link); byte I/O through an open `FileChannel` never
//! takes this lock, only the per-`ByteStore` lock.

use std::sync::{Arc, RwLock};

use crate::attr::AttrValue;
use crate::channel::{FileChannel, OpenMode};
use crate::config::{Configuration, Features};
use crate::dir_stream::{DirectoryStream, SecureDirectoryStream};
use crate::error::{Error, Result};
use crate::file::File;
use crate::file_store::FileStore;
use crate::lookup::{LookupResult, LookupService};
use crate::name::Name;
use crate::path::{Path, PathService, PathTag};

pub enum CreateKind {
    Directory,
    Regular,
    SymbolicLink(Path),
}

pub struct FileSystemService {
    config: Configuration,
    store: Arc<FileStore>,
    root: Arc<File>,
    working_directory: Path,
    path_service: PathService,
    tree_lock: RwLock<()>,
}

impl FileSystemService {
    pub fn new(config: Configuration) -> Self {
        let store = Arc::new(FileStore::new(&config));
        let root = store.create_root();
        let tag = PathTag::new();
        let path_service = PathService::new(&config, tag);

        let working_directory = path_service.parse_one(&config.working_directory).normalize();
        Self::materialize_directories(&store, &root, &working_directory);

        FileSystemService { config, store, root, working_directory, path_service, tree_lock: RwLock::new(()) }
    }

    /// Create every directory along `path` that doesn't already exist,
    /// used once at construction to stand up the configured working
    /// directory the way a real filesystem ships it pre-created.
    fn materialize_directories(store: &Arc<FileStore>, root: &Arc<File>, path: &Path) {
        let mut current = Arc::clone(root);
        for component in path.components() {
            let existing = current.as_directory().unwrap().read().unwrap().get(component);
            current = match existing {
                Some(id) => store.get(id).expect("linked id always present in the arena"),
                None => {
                    let child = store.create_directory(&current);
                    current.as_directory().unwrap().write().unwrap().link(component.clone(), child.id(), &child).unwrap();
                    child
                }
            };
        }
    }

    pub fn path_service(&self) -> &PathService {
        &self.path_service
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn root(&self) -> &Arc<File> {
        &self.root
    }

    fn resolve_absolute(&self, path: &Path) -> Path {
        let combined = if path.is_absolute() { path.clone() } else { self.working_directory.resolve(path) };
        combined.normalize()
    }

    fn lookup(&self, path: &Path, follow_final_symlink: bool) -> Result<LookupResult> {
        let absolute = self.resolve_absolute(path);
        LookupService::new(&self.store).lookup(&self.root, &absolute, follow_final_symlink)
    }

    pub fn create_file(&self, path: &Path, kind: CreateKind) -> Result<Arc<File>> {
        let _guard = self.tree_lock.write().unwrap();
        match self.lookup(path, false)? {
            LookupResult::Found { .. } => Err(Error::FileAlreadyExists),
            LookupResult::NotFound => Err(Error::NoSuchFile),
            LookupResult::ParentFound { parent } => {
                let name = path.file_name().cloned().ok_or(Error::NoSuchFile)?;
                let file = match kind {
                    CreateKind::Directory => self.store.create_directory(&parent),
                    CreateKind::Regular => self.store.create_regular_file(),
                    CreateKind::SymbolicLink(target) => {
                        if !self.config.supports(Features::SYMBOLIC_LINKS) {
                            return Err(Error::UnsupportedOperation("symbolic links"));
                        }
                        self.store.create_symbolic_link(target)
                    }
                };
                parent.as_directory().unwrap().write().unwrap().link(name, file.id(), &file).unwrap();
                tracing::debug!(file_id = file.id(), "created file");
                Ok(file)
            }
        }
    }

    pub fn open_regular_file(&self, path: &Path, mode: OpenMode, create: bool) -> Result<FileChannel> {
        let _guard = self.tree_lock.write().unwrap();
        let file = match self.lookup(path, true)? {
            LookupResult::Found { file, .. } => {
                if !file.is_regular_file() {
                    return Err(Error::FileSystem("cannot open a directory or symbolic link as a regular file".to_string()));
                }
                file
            }
            LookupResult::ParentFound { parent } if create => {
                let name = path.file_name().cloned().ok_or(Error::NoSuchFile)?;
                let file = self.store.create_regular_file();
                parent.as_directory().unwrap().write().unwrap().link(name, file.id(), &file).unwrap();
                file
            }
            _ => return Err(Error::NoSuchFile),
        };
        FileChannel::open(file, Arc::clone(&self.store), mode)
    }

    pub fn delete(&self, path: &Path) -> Result<()> {
        let _guard = self.tree_lock.write().unwrap();
        match self.lookup(path, false)? {
            LookupResult::Found { parent, file, name } => {
                if Arc::ptr_eq(&file, &self.root) {
                    return Err(Error::UnsupportedOperation("delete the filesystem root"));
                }
                if file.is_directory() && !file.as_directory().unwrap().read().unwrap().is_empty() {
                    return Err(Error::DirectoryNotEmpty);
                }
                parent.as_directory().unwrap().write().unwrap().unlink(&name, &file)?;
                self.store.maybe_reclaim(file.id());
                tracing::debug!(file_id = file.id(), "deleted file");
                Ok(())
            }
            _ => Err(Error::NoSuchFile),
        }
    }

    pub fn link(&self, existing: &Path, new_path: &Path) -> Result<()> {
        if !self.config.supports(Features::HARD_LINKS) {
            return Err(Error::UnsupportedOperation("hard links"));
        }
        let _guard = self.tree_lock.write().unwrap();
        let existing_file = match self.lookup(existing, true)? {
            LookupResult::Found { file, .. } => file,
            _ => return Err(Error::NoSuchFile),
        };
        if existing_file.is_directory() {
            return Err(Error::UnsupportedOperation("hard link a directory"));
        }
        match self.lookup(new_path, false)? {
            LookupResult::ParentFound { parent } => {
                let name = new_path.file_name().cloned().ok_or(Error::NoSuchFile)?;
                let result = parent.as_directory().unwrap().write().unwrap().link(name, existing_file.id(), &existing_file);
                if result.is_ok() {
                    tracing::debug!(file_id = existing_file.id(), "linked file");
                }
                result
            }
            LookupResult::Found { .. } => Err(Error::FileAlreadyExists),
            LookupResult::NotFound => Err(Error::NoSuchFile),
        }
    }

    /// True if `descendant_candidate` is `ancestor` or lies anywhere
    /// below it, found by walking `PARENT` entries up to the root.
    fn is_same_or_ancestor(&self, ancestor: &Arc<File>, descendant_candidate: &Arc<File>) -> bool {
        let mut current = Arc::clone(descendant_candidate);
        loop {
            if Arc::ptr_eq(&current, ancestor) {
                return true;
            }
            if Arc::ptr_eq(&current, &self.root) {
                return false;
            }
            let parent_id = current.as_directory().and_then(|table| table.read().unwrap().get(&Name::parent_name()));
            match parent_id.and_then(|id| self.store.get(id)) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Atomic intra-filesystem move/rename.
    pub fn move_within(&self, source: &Path, destination: &Path, replace_existing: bool) -> Result<()> {
        let _guard = self.tree_lock.write().unwrap();
        let (src_parent, src_file, src_name) = match self.lookup(source, false)? {
            LookupResult::Found { parent, file, name } => (parent, file, name),
            _ => return Err(Error::NoSuchFile),
        };

        if src_file.is_directory() {
            let dest_base = match self.lookup(destination, false) {
                Ok(LookupResult::ParentFound { parent }) => Some(parent),
                Ok(LookupResult::Found { parent, .. }) => Some(parent),
                _ => None,
            };
            if let Some(dest_parent) = dest_base {
                if self.is_same_or_ancestor(&src_file, &dest_parent) {
                    return Err(Error::UnsupportedOperation("move a directory into its own subtree"));
                }
            }
        }

        let dest_name = destination.file_name().cloned().ok_or(Error::NoSuchFile)?;
        let dest_parent = match self.lookup(destination, false)? {
            LookupResult::ParentFound { parent } => parent,
            LookupResult::Found { parent, file, name } => {
                if !replace_existing {
                    return Err(Error::FileAlreadyExists);
                }
                parent.as_directory().unwrap().write().unwrap().unlink(&name, &file)?;
                self.store.maybe_reclaim(file.id());
                parent
            }
            LookupResult::NotFound => return Err(Error::NoSuchFile),
        };

        src_parent.as_directory().unwrap().write().unwrap().unlink(&src_name, &src_file)?;
        dest_parent.as_directory().unwrap().write().unwrap().link(dest_name, src_file.id(), &src_file)?;

        if src_file.is_directory() && !Arc::ptr_eq(&src_parent, &dest_parent) {
            src_file
                .as_directory()
                .unwrap()
                .write()
                .unwrap()
                .relink_parent(dest_parent.id(), &src_parent, &dest_parent);
        }
        tracing::debug!(file_id = src_file.id(), "moved file");
        Ok(())
    }

    /// Copy a regular file within this filesystem instance.
    pub fn copy_within(&self, source: &Path, destination: &Path, replace_existing: bool) -> Result<()> {
        let _guard = self.tree_lock.write().unwrap();
        let src_file = match self.lookup(source, true)? {
            LookupResult::Found { file, .. } => file,
            _ => return Err(Error::NoSuchFile),
        };
        if !src_file.is_regular_file() {
            return Err(Error::UnsupportedOperation("copy a non-regular file"));
        }
        let dest_parent = match self.lookup(destination, false)? {
            LookupResult::ParentFound { parent } => parent,
            LookupResult::Found { parent, file, name } => {
                if !replace_existing {
                    return Err(Error::FileAlreadyExists);
                }
                parent.as_directory().unwrap().write().unwrap().unlink(&name, &file)?;
                self.store.maybe_reclaim(file.id());
                parent
            }
            LookupResult::NotFound => return Err(Error::NoSuchFile),
        };
        let dest_name = destination.file_name().cloned().ok_or(Error::NoSuchFile)?;
        let copy = self.store.copy_regular_file(&src_file)?;
        dest_parent.as_directory().unwrap().write().unwrap().link(dest_name, copy.id(), &copy)?;
        Ok(())
    }

    /// Non-atomic cross-filesystem move: copy the bytes into `dest_fs`,
    /// then delete the source. Directory moves across filesystems are
    /// out of scope — this is the documented, explicitly non-atomic
    /// option.
    pub fn move_across(&self, source: &Path, dest_fs: &FileSystemService, destination: &Path, replace_existing: bool) -> Result<()> {
        let (src_parent, src_file, src_name) = {
            let _guard = self.tree_lock.write().unwrap();
            match self.lookup(source, false)? {
                LookupResult::Found { parent, file, name } => (parent, file, name),
                _ => return Err(Error::NoSuchFile),
            }
        };
        if !src_file.is_regular_file() {
            return Err(Error::UnsupportedOperation("cross-filesystem move of a non-regular file"));
        }

        {
            let _guard = dest_fs.tree_lock.write().unwrap();
            let dest_parent = match dest_fs.lookup(destination, false)? {
                LookupResult::ParentFound { parent } => parent,
                LookupResult::Found { parent, file, name } => {
                    if !replace_existing {
                        return Err(Error::FileAlreadyExists);
                    }
                    parent.as_directory().unwrap().write().unwrap().unlink(&name, &file)?;
                    dest_fs.store.maybe_reclaim(file.id());
                    parent
                }
                LookupResult::NotFound => return Err(Error::NoSuchFile),
            };
            let dest_name = destination.file_name().cloned().ok_or(Error::NoSuchFile)?;
            let copy = dest_fs.store.copy_regular_file(&src_file)?;
            dest_parent.as_directory().unwrap().write().unwrap().link(dest_name, copy.id(), &copy)?;
        }

        let _guard = self.tree_lock.write().unwrap();
        src_parent.as_directory().unwrap().write().unwrap().unlink(&src_name, &src_file)?;
        self.store.maybe_reclaim(src_file.id());
        Ok(())
    }

    pub fn secure_directory_stream(&self, path: &Path) -> Result<SecureDirectoryStream> {
        let _guard = self.tree_lock.read().unwrap();
        if !self.config.supports(Features::SECURE_DIRECTORY_STREAMS) {
            return Err(Error::UnsupportedOperation("secure directory streams"));
        }
        match self.lookup(path, true)? {
            LookupResult::Found { file, .. } => SecureDirectoryStream::new(file, Arc::clone(&self.store)),
            _ => Err(Error::NoSuchFile),
        }
    }

    pub fn list_directory(&self, path: &Path) -> Result<DirectoryStream> {
        let _guard = self.tree_lock.read().unwrap();
        match self.lookup(path, true)? {
            LookupResult::Found { file, .. } => DirectoryStream::open(&file),
            _ => Err(Error::NoSuchFile),
        }
    }

    /// The fully resolved, canonical, absolute form of `path`.
    ///
    /// Verifies the path exists (following every symbolic link along
    /// the way, up to the usual depth bound) and substitutes each
    /// component with the name actually stored in its parent's
    /// directory table — so on a case-insensitive filesystem,
    /// `to_real_path("C:\work\notes.TXT")` returns the casing under
    /// which `notes.txt` was created, not the caller's input casing.
    /// Unlike a real filesystem's `realpath`, it does not splice
    /// resolved symlink targets into the returned path's textual form.
    pub fn to_real_path(&self, path: &Path) -> Result<Path> {
        let _guard = self.tree_lock.read().unwrap();
        match self.lookup(path, true)? {
            LookupResult::Found { parent, name, .. } => Ok(self.canonical_path(&parent, name)),
            _ => Err(Error::NoSuchFile),
        }
    }

    /// Reconstruct the canonical absolute path to `name` inside
    /// `parent`, climbing `PARENT` links from `parent` up to the root
    /// and substituting each ancestor's stored directory-entry name
    /// for whatever casing the caller typed.
    fn canonical_path(&self, parent: &Arc<File>, name: Name) -> Path {
        let root = self.working_directory.root().cloned();
        if name.is_self() {
            return Path::new(self.path_service.tag().clone(), root, Vec::new());
        }
        let mut names = vec![name];
        let mut current = Arc::clone(parent);
        while !Arc::ptr_eq(&current, &self.root) {
            let current_id = current.id();
            let parent_id = current
                .as_directory()
                .unwrap()
                .read()
                .unwrap()
                .get(&Name::parent_name())
                .expect("every directory has a PARENT entry");
            let up = self.store.get(parent_id).expect("linked parent always present in the arena");
            let stored_name = up
                .as_directory()
                .unwrap()
                .read()
                .unwrap()
                .name_for_id(current_id)
                .expect("a directory is always linked under some name in its parent");
            names.push(stored_name);
            current = up;
        }
        names.reverse();
        Path::new(self.path_service.tag().clone(), root, names)
    }

    pub fn is_same_file(&self, a: &Path, b: &Path) -> Result<bool> {
        let _guard = self.tree_lock.read().unwrap();
        let file_a = match self.lookup(a, true)? {
            LookupResult::Found { file, .. } => file,
            _ => return Err(Error::NoSuchFile),
        };
        let file_b = match self.lookup(b, true)? {
            LookupResult::Found { file, .. } => file,
            _ => return Err(Error::NoSuchFile),
        };
        Ok(Arc::ptr_eq(&file_a, &file_b))
    }

    pub fn exists(&self, path: &Path) -> bool {
        let _guard = self.tree_lock.read().unwrap();
        matches!(self.lookup(path, true), Ok(LookupResult::Found { .. }))
    }

    pub fn read_symbolic_link(&self, path: &Path) -> Result<Path> {
        let _guard = self.tree_lock.read().unwrap();
        match self.lookup(path, false)? {
            LookupResult::Found { file, .. } => file.as_symbolic_link().cloned().ok_or(Error::NotLink),
            _ => Err(Error::NoSuchFile),
        }
    }

    pub fn get_attribute(&self, path: &Path, view: &str, attribute: &str) -> Result<Option<AttrValue>> {
        let _guard = self.tree_lock.read().unwrap();
        let file = self.resolve_for_attributes(path)?;
        self.store.get_attribute(&file, view, attribute)
    }

    pub fn set_attribute(&self, path: &Path, view: &str, attribute: &str, value: AttrValue) -> Result<()> {
        let _guard = self.tree_lock.read().unwrap();
        let file = self.resolve_for_attributes(path)?;
        self.store.set_attribute(&file, view, attribute, value)
    }

    pub fn read_attributes(&self, path: &Path, view: &str) -> Result<Vec<(String, AttrValue)>> {
        let _guard = self.tree_lock.read().unwrap();
        let file = self.resolve_for_attributes(path)?;
        self.store.read_attributes(&file, view)
    }

    fn resolve_for_attributes(&self, path: &Path) -> Result<Arc<File>> {
        match self.lookup(path, true)? {
            LookupResult::Found { file, .. } => Ok(file),
            _ => Err(Error::NoSuchFile),
        }
    }
}
