//! `Name` — a canonical, comparison-stable filename token.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use unicode_normalization::char::compose;
use unicode_normalization::UnicodeNormalization;

use crate::config::CaseSensitivity;

/// How a `Name`'s canonical (comparison) form is derived from its
/// displayed string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonicalization {
    /// Canonical form equals the displayed string.
    Simple,
    /// Canonical form is the displayed string, ASCII-lowercased.
    CaseInsensitiveAscii,
    /// Canonical form is the NFKC-normalized, case-folded string.
    CaseInsensitiveUnicode,
    /// Canonical form approximates a locale collation key: NFD
    /// decomposition with combining marks stripped, then lowercased.
    /// Real locale-aware collation is out of scope for a test double.
    Collating,
}

impl From<CaseSensitivity> for Canonicalization {
    fn from(value: CaseSensitivity) -> Self {
        match value {
            CaseSensitivity::CaseSensitive => Canonicalization::Simple,
            CaseSensitivity::CaseInsensitiveAscii => Canonicalization::CaseInsensitiveAscii,
            CaseSensitivity::CaseInsensitiveUnicode => Canonicalization::CaseInsensitiveUnicode,
        }
    }
}

fn canonicalize(display: &str, mode: Canonicalization) -> String {
    match mode {
        Canonicalization::Simple => display.to_string(),
        Canonicalization::CaseInsensitiveAscii => display.to_ascii_lowercase(),
        Canonicalization::CaseInsensitiveUnicode => {
            display.nfkc().collect::<String>().to_lowercase()
        }
        Canonicalization::Collating => display
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase(),
    }
}

fn is_combining_mark(c: char) -> bool {
    // Recompose would undo an accent; a character survives decomposition
    // as a free-standing combining mark only when it doesn't compose
    // back onto anything, which is the cheap signal we want here.
    compose('a', c).is_none() && ('\u{0300}'..='\u{036F}').contains(&c)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Inner {
    Dot,
    DotDot,
    Named { display: Arc<str>, canonical: Arc<str> },
}

/// An immutable filename token. Equality and hashing use the canonical
/// form; [`Name::display`] returns the original string.
///
/// `SELF` (`.`) and `PARENT` (`..`) are shared sentinel values that
/// compare equal to each other regardless of canonicalization mode.
#[derive(Debug, Clone)]
pub struct Name(Inner);

impl Name {
    /// Construct a `Name` from a raw component string.
    ///
    /// Returns the shared `SELF`/`PARENT` sentinels for `"."` / `".."`
    /// irrespective of `mode`.
    pub fn new(raw: &str, mode: Canonicalization) -> Name {
        match raw {
            "." => Name::self_name(),
            ".." => Name::parent_name(),
            _ => Name(Inner::Named {
                display: Arc::from(raw),
                canonical: Arc::from(canonicalize(raw, mode).as_str()),
            }),
        }
    }

    pub fn self_name() -> Name {
        Name(Inner::Dot)
    }

    pub fn parent_name() -> Name {
        Name(Inner::DotDot)
    }

    pub fn is_self(&self) -> bool {
        matches!(self.0, Inner::Dot)
    }

    pub fn is_parent(&self) -> bool {
        matches!(self.0, Inner::DotDot)
    }

    /// True for the two reserved directory-table entries.
    pub fn is_reserved(&self) -> bool {
        self.is_self() || self.is_parent()
    }

    /// The original, user-facing string.
    pub fn display(&self) -> &str {
        match &self.0 {
            Inner::Dot => ".",
            Inner::DotDot => "..",
            Inner::Named { display, .. } => display,
        }
    }

    fn canonical(&self) -> &str {
        match &self.0 {
            Inner::Dot => ".",
            Inner::DotDot => "..",
            Inner::Named { canonical, .. } => canonical,
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Inner::Dot, Inner::Dot) => true,
            (Inner::DotDot, Inner::DotDot) => true,
            (Inner::Dot, _) | (Inner::DotDot, _) | (_, Inner::Dot) | (_, Inner::DotDot) => false,
            (Inner::Named { canonical: a, .. }, Inner::Named { canonical: b, .. }) => a == b,
        }
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Inner::Dot => 0u8.hash(state),
            Inner::DotDot => 1u8.hash(state),
            Inner::Named { .. } => {
                2u8.hash(state);
                self.canonical().hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_dotdot_are_shared_sentinels() {
        let a = Name::new(".", Canonicalization::CaseInsensitiveAscii);
        let b = Name::new(".", Canonicalization::Simple);
        assert!(a.is_self());
        assert_eq!(a, b);
        assert_ne!(Name::new(".", Canonicalization::Simple), Name::new("..", Canonicalization::Simple));
    }

    #[test]
    fn case_insensitive_ascii_compares_canonical_but_keeps_display() {
        let foo = Name::new("Foo", Canonicalization::CaseInsensitiveAscii);
        let foo_upper = Name::new("FOO", Canonicalization::CaseInsensitiveAscii);
        assert_eq!(foo, foo_upper);
        assert_eq!(foo.display(), "Foo");
        assert_eq!(foo_upper.display(), "FOO");
    }

    #[test]
    fn case_sensitive_mode_distinguishes_case() {
        let foo = Name::new("Foo", Canonicalization::Simple);
        let foo_upper = Name::new("FOO", Canonicalization::Simple);
        assert_ne!(foo, foo_upper);
    }
}
