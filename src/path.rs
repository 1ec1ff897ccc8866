//! `Path` — an immutable ordered sequence of names with an optional
//! root, plus the `PathService` that parses raw strings into `Path`
//! values according to a `Configuration`.

use std::fmt;
use std::sync::Arc;

use crate::config::{Configuration, PathType};
use crate::name::{Canonicalization, Name};

/// Opaque tag identifying which filesystem instance produced a `Path`.
///
/// Two paths only compare equal when they share a tag: "users may
/// create distinct paths that resolve to the same file" across
/// different filesystem instances, and those must not be conflated.
#[derive(Clone)]
pub struct PathTag(Arc<()>);

impl PathTag {
    pub fn new() -> Self {
        PathTag(Arc::new(()))
    }
}

impl Default for PathTag {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PathTag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for PathTag {}

impl fmt::Debug for PathTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathTag({:p})", Arc::as_ptr(&self.0))
    }
}

/// An immutable path value: an optional root name plus an ordered list
/// of component names.
///
/// Equality compares *displayed* strings component-wise (not canonical
/// forms) within the same filesystem: `Path` does not itself know
/// whether `"/Foo"` and `"/FOO"` name the same file on a
/// case-insensitive filesystem — only `LookupService` does.
#[derive(Clone)]
pub struct Path {
    tag: PathTag,
    root: Option<Name>,
    components: Vec<Name>,
}

impl Path {
    pub(crate) fn new(tag: PathTag, root: Option<Name>, components: Vec<Name>) -> Self {
        Path { tag, root, components }
    }

    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Name> {
        self.root.as_ref()
    }

    pub fn components(&self) -> &[Name] {
        &self.components
    }

    pub fn tag(&self) -> &PathTag {
        &self.tag
    }

    /// Collapse `.` and `..` components, stopping at the root (never
    /// escaping it) for absolute paths. `..` is preserved (not collapsed)
    /// at the start of a relative path, since there is nothing to pop.
    pub fn normalize(&self) -> Path {
        let mut stack: Vec<Name> = Vec::with_capacity(self.components.len());
        for component in &self.components {
            if component.is_self() {
                continue;
            }
            if component.is_parent() {
                match stack.last() {
                    Some(top) if !top.is_parent() => {
                        stack.pop();
                    }
                    Some(_) => stack.push(component.clone()),
                    None => {
                        if self.root.is_none() {
                            stack.push(component.clone());
                        }
                        // else: root-bounded stop, drop the `..`.
                    }
                }
            } else {
                stack.push(component.clone());
            }
        }
        Path::new(self.tag.clone(), self.root.clone(), stack)
    }

    /// `this.resolve(other)`: `other` wins outright if absolute,
    /// otherwise its components are appended to `this`'s.
    pub fn resolve(&self, other: &Path) -> Path {
        if other.is_absolute() {
            return other.clone();
        }
        if other.components.is_empty() {
            return self.clone();
        }
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Path::new(self.tag.clone(), self.root.clone(), components)
    }

    /// Resolve `other` against this path's parent, i.e.
    /// `self.parent().resolve(other)`.
    pub fn resolve_sibling(&self, other: &Path) -> Path {
        match self.parent() {
            Some(parent) => parent.resolve(other),
            None => other.clone(),
        }
    }

    /// The path without its final component, or `None` if this path has
    /// no parent to express (an empty relative path, or a bare root).
    pub fn parent(&self) -> Option<Path> {
        if self.components.is_empty() {
            return None;
        }
        let mut components = self.components.clone();
        components.pop();
        Some(Path::new(self.tag.clone(), self.root.clone(), components))
    }

    pub fn file_name(&self) -> Option<&Name> {
        self.components.last()
    }

    /// Requires both paths to share a root (or both have none).
    /// Strips the common prefix, emits one `..` per remaining component
    /// of `self`, then the remaining components of `other`.
    pub fn relativize(&self, other: &Path) -> Option<Path> {
        if self.root.is_some() != other.root.is_some() {
            return None;
        }
        if let (Some(a), Some(b)) = (&self.root, &other.root) {
            if a != b {
                return None;
            }
        }
        let common = self
            .components
            .iter()
            .zip(other.components.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut components: Vec<Name> =
            (common..self.components.len()).map(|_| Name::parent_name()).collect();
        components.extend(other.components[common..].iter().cloned());
        Some(Path::new(self.tag.clone(), None, components))
    }

    pub fn starts_with(&self, other: &Path) -> bool {
        if self.tag != other.tag {
            return false;
        }
        if self.root.as_ref().map(Name::display) != other.root.as_ref().map(Name::display) {
            return false;
        }
        other.components.len() <= self.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a.display() == b.display())
    }

    pub fn ends_with(&self, other: &Path) -> bool {
        if self.tag != other.tag {
            return false;
        }
        if other.is_absolute() {
            return self.is_absolute()
                && self.root.as_ref().map(Name::display) == other.root.as_ref().map(Name::display)
                && self.components.len() == other.components.len()
                && self
                    .components
                    .iter()
                    .zip(other.components.iter())
                    .all(|(a, b)| a.display() == b.display());
        }
        if other.components.len() > self.components.len() {
            return false;
        }
        let offset = self.components.len() - other.components.len();
        self.components[offset..]
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a.display() == b.display())
    }

    /// `self.components()[begin..end]` as a relative path.
    pub fn subpath(&self, begin: usize, end: usize) -> Path {
        Path::new(self.tag.clone(), None, self.components[begin..end].to_vec())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.components.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.components.is_empty()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.root.as_ref().map(Name::display) == other.root.as_ref().map(Name::display)
            && self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a.display() == b.display())
    }
}
impl Eq for Path {}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.to_display_string("/"))
    }
}

impl Path {
    fn to_display_string(&self, separator: &str) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            out.push_str(root.display());
            if !out.ends_with(separator) {
                out.push_str(separator);
            }
        }
        for (index, component) in self.components.iter().enumerate() {
            if index > 0 {
                out.push_str(separator);
            }
            out.push_str(component.display());
        }
        out
    }
}

/// Parses raw strings into `Path` values and renders `Path` values back
/// to strings, according to a filesystem's configured separators, root
/// syntax, and case sensitivity.
pub struct PathService {
    tag: PathTag,
    separator: char,
    alternates: Vec<char>,
    canonicalization: Canonicalization,
    path_type: PathType,
}

impl PathService {
    pub fn new(config: &Configuration, tag: PathTag) -> Self {
        PathService {
            tag,
            separator: config.separator,
            alternates: config.alternate_separators.clone(),
            canonicalization: config.case_sensitivity.into(),
            path_type: config.path_type,
        }
    }

    pub fn tag(&self) -> &PathTag {
        &self.tag
    }

    fn is_separator(&self, c: char) -> bool {
        c == self.separator || self.alternates.contains(&c)
    }

    /// Parse a root-less relative path from already-split components.
    pub fn relative_path(&self, components: Vec<&str>) -> Path {
        let names = components
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|c| Name::new(c, self.canonicalization))
            .collect();
        Path::new(self.tag.clone(), None, names)
    }

    pub fn empty_path(&self) -> Path {
        Path::new(self.tag.clone(), None, Vec::new())
    }

    /// Parse `first` followed by `more`, joined with the configured
    /// separator(s), exactly as a single path string would be split.
    pub fn parse(&self, first: &str, more: &[&str]) -> Path {
        let mut joined = String::from(first);
        for part in more {
            joined.push(self.separator);
            joined.push_str(part);
        }
        self.parse_one(&joined)
    }

    fn split_root<'a>(&self, raw: &'a str) -> (Option<String>, &'a str) {
        match self.path_type {
            PathType::Unix => {
                if raw.chars().next().map(|c| self.is_separator(c)).unwrap_or(false) {
                    (Some("/".to_string()), &raw[raw.chars().next().unwrap().len_utf8()..])
                } else {
                    (None, raw)
                }
            }
            PathType::Windows => {
                let bytes = raw.as_bytes();
                if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
                    let drive = bytes[0].to_ascii_uppercase() as char;
                    let mut rest = &raw[2..];
                    if rest.chars().next().map(|c| self.is_separator(c)).unwrap_or(false) {
                        rest = &rest[rest.chars().next().unwrap().len_utf8()..];
                    }
                    (Some(format!("{drive}:\\")), rest)
                } else {
                    (None, raw)
                }
            }
        }
    }

    pub fn parse_one(&self, raw: &str) -> Path {
        let (root, rest) = self.split_root(raw);
        let root_name = root.map(|r| Name::new(&r, Canonicalization::Simple));
        let components = rest
            .split(|c| self.is_separator(c))
            .filter(|c| !c.is_empty())
            .map(|c| Name::new(c, self.canonicalization))
            .collect();
        Path::new(self.tag.clone(), root_name, components)
    }

    pub fn to_string(&self, path: &Path) -> String {
        path.to_display_string(&self.separator.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    fn service() -> PathService {
        PathService::new(&Configuration::unix(), PathTag::new())
    }

    #[test]
    fn normalize_collapses_dot_and_dotdot() {
        let svc = service();
        let path = svc.parse_one("/a/./b/../c");
        assert_eq!(svc.to_string(&path.normalize()), "/a/c");
    }

    #[test]
    fn normalize_never_escapes_root() {
        let svc = service();
        let path = svc.parse_one("/../../a");
        assert_eq!(svc.to_string(&path.normalize()), "/a");
    }

    #[test]
    fn normalize_is_identity_for_clean_relative_paths() {
        let svc = service();
        let path = svc.parse_one("a/b/c");
        let normalized = path.normalize();
        assert_eq!(svc.to_string(&path), svc.to_string(&normalized));
    }

    #[test]
    fn relativize_emits_parent_then_remainder() {
        let svc = service();
        let a = svc.parse_one("/a/b/c");
        let b = svc.parse_one("/a/x/y");
        let rel = a.relativize(&b).unwrap();
        assert_eq!(svc.to_string(&rel), "../../x/y");
    }

    #[test]
    fn resolve_absolute_other_wins() {
        let svc = service();
        let a = svc.parse_one("/a/b");
        let b = svc.parse_one("/c");
        assert_eq!(svc.to_string(&a.resolve(&b)), "/c");
    }

    #[test]
    fn windows_drive_root_is_uppercased_and_canonical() {
        let svc = PathService::new(&Configuration::windows(), PathTag::new());
        let path = svc.parse_one("c:/foo/bar");
        assert_eq!(svc.to_string(&path), "C:\\foo\\bar");
    }
}
