//! `Configuration` — the value the core consumes to decide root names,
//! separators, case sensitivity, and which optional capabilities are on.
//!
//! Building and registering providers/factory presets from a
//! configuration file is the out-of-scope CLI layer; this module only
//! carries the data.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Optional capabilities a filesystem instance supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Features: u32 {
        const SYMBOLIC_LINKS          = 0b0001;
        const HARD_LINKS              = 0b0010;
        const GROUPS                  = 0b0100;
        const SECURE_DIRECTORY_STREAMS = 0b1000;
    }
}

/// How `Name` canonicalizes display strings for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseSensitivity {
    CaseSensitive,
    CaseInsensitiveAscii,
    CaseInsensitiveUnicode,
}

/// Root/path syntax flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathType {
    /// Single root (`/`), `/` separator, no alternates.
    Unix,
    /// Drive-letter roots (`C:\`), `\` canonical separator, `/` alternate.
    Windows,
}

/// Everything the core needs to stand up a filesystem instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub roots: Vec<String>,
    pub working_directory: String,
    pub separator: char,
    pub alternate_separators: Vec<char>,
    pub case_sensitivity: CaseSensitivity,
    pub supported_features: Features,
    pub attribute_providers: Vec<String>,
    pub path_type: PathType,
    /// Size, in bytes, of a single `Disk` block. Must be a power of two.
    pub block_size: usize,
    /// Upper bound reported by `fs_stat`/`Disk::total_space`; the `Disk`
    /// itself never allocates more than this many bytes of blocks.
    pub max_size: u64,
}

const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;
const DEFAULT_MAX_SIZE: u64 = 4 * 1024 * 1024 * 1024; // 4 GiB ceiling, like jimfs.

impl Configuration {
    /// A POSIX-flavored preset: single `/` root, case-sensitive names,
    /// symbolic and hard links supported. Mirrors the source system's
    /// "unix-like" factory preset, expressed here as a plain data
    /// builder rather than a provider-registering factory.
    pub fn unix() -> Self {
        Self {
            roots: vec!["/".to_string()],
            working_directory: "/work".to_string(),
            separator: '/',
            alternate_separators: Vec::new(),
            case_sensitivity: CaseSensitivity::CaseSensitive,
            supported_features: Features::SYMBOLIC_LINKS | Features::HARD_LINKS | Features::GROUPS,
            attribute_providers: vec![
                "basic".to_string(),
                "owner".to_string(),
                "posix".to_string(),
                "unix".to_string(),
            ],
            path_type: PathType::Unix,
            block_size: DEFAULT_BLOCK_SIZE,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    /// A Windows-flavored preset: a single `C:\` root, case-insensitive
    /// ASCII names, no hard links.
    pub fn windows() -> Self {
        Self {
            roots: vec!["C:\\".to_string()],
            working_directory: "C:\\work".to_string(),
            separator: '\\',
            alternate_separators: vec!['/'],
            case_sensitivity: CaseSensitivity::CaseInsensitiveAscii,
            supported_features: Features::SYMBOLIC_LINKS,
            attribute_providers: vec![
                "basic".to_string(),
                "owner".to_string(),
                "dos".to_string(),
                "acl".to_string(),
            ],
            path_type: PathType::Windows,
            block_size: DEFAULT_BLOCK_SIZE,
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    pub fn supports(&self, feature: Features) -> bool {
        self.supported_features.contains(feature)
    }
}
