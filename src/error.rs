//! Error taxonomy shared by every core operation.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Wire-visible error taxonomy for the in-memory filesystem core.
///
/// Mirrors the POSIX/Windows-flavoured errors a real filesystem facade
/// would need to translate into, without committing to either host's
/// exact error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No file exists at the resolved path.
    NoSuchFile,
    /// A create-style operation found something already at the target name.
    FileAlreadyExists,
    /// A directory was required but the resolved file is not one.
    NotDirectory,
    /// `delete` was asked to remove a directory that still has entries.
    DirectoryNotEmpty,
    /// `read_symbolic_link` (or similar) was used on a non-symlink.
    NotLink,
    /// Catch-all filesystem error carrying a human-readable reason.
    FileSystem(String),
    /// The operation is not permitted for the calling context.
    AccessDenied,
    /// A recognized but unimplemented capability was requested
    /// (e.g. memory-mapping a channel, ATOMIC_MOVE across filesystems).
    UnsupportedOperation(&'static str),
    /// Symlink resolution exceeded the loop-depth bound.
    TooManySymbolicLinks,
    /// The channel this operation targets has already been closed.
    ClosedChannel,
    /// The watch service this operation targets has already been closed.
    ClosedWatchService,
    /// An attribute name's view prefix does not match any registered provider.
    ProviderMismatch,
    /// The backing `Disk` could not grow to satisfy an allocation.
    OutOfMemory,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoSuchFile => write!(f, "no such file or directory"),
            Error::FileAlreadyExists => write!(f, "file already exists"),
            Error::NotDirectory => write!(f, "not a directory"),
            Error::DirectoryNotEmpty => write!(f, "directory not empty"),
            Error::NotLink => write!(f, "not a symbolic link"),
            Error::FileSystem(reason) => write!(f, "filesystem error: {reason}"),
            Error::AccessDenied => write!(f, "access denied"),
            Error::UnsupportedOperation(op) => write!(f, "unsupported operation: {op}"),
            Error::TooManySymbolicLinks => write!(f, "too many levels of symbolic links"),
            Error::ClosedChannel => write!(f, "channel is closed"),
            Error::ClosedWatchService => write!(f, "watch service is closed"),
            Error::ProviderMismatch => write!(f, "no attribute provider for the requested view"),
            Error::OutOfMemory => write!(f, "disk exhausted"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        let kind = match err {
            Error::NoSuchFile => ErrorKind::NotFound,
            Error::FileAlreadyExists => ErrorKind::AlreadyExists,
            Error::AccessDenied => ErrorKind::PermissionDenied,
            Error::UnsupportedOperation(_) => ErrorKind::Unsupported,
            Error::ClosedChannel | Error::ClosedWatchService => ErrorKind::NotConnected,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, err.to_string())
    }
}
