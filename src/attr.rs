//! Attribute views — named, provider-scoped metadata attached to every
//! `File`.
//!
//! Each attribute lives under a `"<view>:<attribute>"` key in a
//! `File`'s attribute map. A provider owns one view's set of attribute
//! names and supplies the defaults a newly created file starts with.

use std::collections::HashMap;

/// A typed attribute value. Providers agree on which variant a given
/// attribute name holds; callers get `None` back from a mismatched read
/// rather than a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    /// Milliseconds since the Unix epoch.
    Time(i64),
    Id(u64),
    List(Vec<String>),
}

/// A named set of attributes a file can carry, plus the defaults a
/// freshly created file should start with.
pub trait AttributeProvider: Send + Sync {
    /// The view name attributes under this provider are qualified with,
    /// e.g. `"posix"` for `"posix:permissions"`.
    fn name(&self) -> &'static str;

    /// The bare attribute names (without the view prefix) this provider owns.
    fn attributes(&self) -> &'static [&'static str];

    /// Default `(qualified_name, value)` pairs for a newly created file.
    fn default_values(&self) -> Vec<(String, AttrValue)>;

    fn qualified(&self, attribute: &str) -> String {
        format!("{}:{}", self.name(), attribute)
    }
}

/// `basic` — attributes every file has regardless of platform: size,
/// the three timestamps, and a type discriminant. Populated by
/// `FileStore`/`File` directly rather than stored redundantly; this
/// provider only supplies the file-type-independent defaults.
pub struct BasicAttributeProvider;

impl AttributeProvider for BasicAttributeProvider {
    fn name(&self) -> &'static str {
        "basic"
    }
    fn attributes(&self) -> &'static [&'static str] {
        &["size", "creationTime", "lastModifiedTime", "lastAccessTime", "fileKey"]
    }
    fn default_values(&self) -> Vec<(String, AttrValue)> {
        Vec::new()
    }
}

/// `owner` — a single owning principal, as a free-form name.
pub struct OwnerAttributeProvider;

impl AttributeProvider for OwnerAttributeProvider {
    fn name(&self) -> &'static str {
        "owner"
    }
    fn attributes(&self) -> &'static [&'static str] {
        &["owner"]
    }
    fn default_values(&self) -> Vec<(String, AttrValue)> {
        vec![(self.qualified("owner"), AttrValue::Text("nobody".to_string()))]
    }
}

/// `posix` — Unix-style permission bits and an owning group.
pub struct PosixAttributeProvider;

impl AttributeProvider for PosixAttributeProvider {
    fn name(&self) -> &'static str {
        "posix"
    }
    fn attributes(&self) -> &'static [&'static str] {
        &["permissions", "group"]
    }
    fn default_values(&self) -> Vec<(String, AttrValue)> {
        vec![
            (self.qualified("permissions"), AttrValue::Integer(0o644)),
            (self.qualified("group"), AttrValue::Text("nobody".to_string())),
        ]
    }
}

/// `dos` — the classic MS-DOS attribute bits.
pub struct DosAttributeProvider;

impl AttributeProvider for DosAttributeProvider {
    fn name(&self) -> &'static str {
        "dos"
    }
    fn attributes(&self) -> &'static [&'static str] {
        &["readonly", "hidden", "archive", "system"]
    }
    fn default_values(&self) -> Vec<(String, AttrValue)> {
        vec![
            (self.qualified("readonly"), AttrValue::Bool(false)),
            (self.qualified("hidden"), AttrValue::Bool(false)),
            (self.qualified("archive"), AttrValue::Bool(true)),
            (self.qualified("system"), AttrValue::Bool(false)),
        ]
    }
}

/// Builds the provider by name, per `Configuration::attribute_providers`.
pub fn provider_by_name(name: &str) -> Option<Box<dyn AttributeProvider>> {
    match name {
        "basic" => Some(Box::new(BasicAttributeProvider)),
        "owner" => Some(Box::new(OwnerAttributeProvider)),
        "posix" => Some(Box::new(PosixAttributeProvider)),
        "dos" => Some(Box::new(DosAttributeProvider)),
        // "unix" and "acl" round out the unix/windows presets but carry
        // no additional attributes of their own in this implementation.
        "unix" | "acl" => None,
        _ => None,
    }
}

/// Instantiate every provider named in `names`, skipping unrecognized ones.
pub fn build_registry(names: &[String]) -> HashMap<String, Box<dyn AttributeProvider>> {
    let mut registry = HashMap::new();
    for name in names {
        if let Some(provider) = provider_by_name(name) {
            registry.insert(provider.name().to_string(), provider);
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_defaults_include_permissions_and_group() {
        let defaults = PosixAttributeProvider.default_values();
        assert!(defaults.iter().any(|(k, _)| k == "posix:permissions"));
        assert!(defaults.iter().any(|(k, _)| k == "posix:group"));
    }

    #[test]
    fn registry_skips_unknown_provider_names() {
        let registry = build_registry(&["posix".to_string(), "nonsense".to_string()]);
        assert!(registry.contains_key("posix"));
        assert_eq!(registry.len(), 1);
    }
}
