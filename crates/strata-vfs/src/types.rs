//! Core VFS types.
//!
//! Metadata values are plain data and serializable, so they can be logged or
//! shipped across process boundaries without touching the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// POSIX-like mode: file type bits plus permission bits.
///
/// Type bits use the `S_IFMT` layout. A mode with no type bits set is treated
/// as a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(u32);

impl FileMode {
    /// Mask selecting the file type bits.
    pub const TYPE_MASK: u32 = 0o170_000;
    /// Mask selecting permission bits (including setuid/setgid/sticky).
    pub const PERM_MASK: u32 = 0o7777;

    pub const FIFO: u32 = 0o010_000;
    pub const CHAR_DEVICE: u32 = 0o020_000;
    pub const DIR: u32 = 0o040_000;
    pub const BLOCK_DEVICE: u32 = 0o060_000;
    pub const REGULAR: u32 = 0o100_000;
    pub const SYMLINK: u32 = 0o120_000;
    pub const SOCKET: u32 = 0o140_000;

    /// Wrap raw mode bits.
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Regular file with the given permissions.
    pub const fn file(perm: u32) -> Self {
        Self(Self::REGULAR | (perm & Self::PERM_MASK))
    }

    /// Directory with the given permissions.
    pub const fn dir(perm: u32) -> Self {
        Self(Self::DIR | (perm & Self::PERM_MASK))
    }

    /// Raw mode bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Permission bits only.
    pub const fn perm(self) -> u32 {
        self.0 & Self::PERM_MASK
    }

    /// File type bits only.
    pub const fn file_type(self) -> u32 {
        self.0 & Self::TYPE_MASK
    }

    pub const fn is_dir(self) -> bool {
        self.file_type() == Self::DIR
    }

    /// True for regular files, including modes with no type bits.
    pub const fn is_regular(self) -> bool {
        matches!(self.file_type(), 0 | Self::REGULAR)
    }

    /// True for anything that is neither a regular file nor a directory.
    pub const fn is_special(self) -> bool {
        !self.is_regular() && !self.is_dir()
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Renders like `ls -l`: `drwxr-xr-x`.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.file_type() {
            Self::DIR => 'd',
            Self::SYMLINK => 'l',
            Self::FIFO => 'p',
            Self::SOCKET => 's',
            Self::CHAR_DEVICE => 'c',
            Self::BLOCK_DEVICE => 'b',
            _ => '-',
        };
        write!(f, "{kind}")?;
        const RWX: [char; 3] = ['r', 'w', 'x'];
        for shift in (0..9).rev() {
            let set = self.0 & (1 << shift) != 0;
            let c = if set { RWX[(8 - shift) % 3] } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// File metadata as reported by `stat`, `lstat` and `read_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Last path segment; `/` for the root.
    pub name: String,
    /// Logical size in bytes (uncompressed). Zero for directories.
    pub size: u64,
    /// Type and permission bits.
    pub mode: FileMode,
    /// Last modification time.
    pub mtime: SystemTime,
}

impl FileInfo {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.mode.is_regular()
    }
}

bitflags::bitflags! {
    /// Open file flags.
    ///
    /// Access is read-only when neither `WRITE_ONLY` nor `READ_WRITE` is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        const WRITE_ONLY = 1 << 0;
        const READ_WRITE = 1 << 1;
        /// Create if not exists.
        const CREATE = 1 << 2;
        /// Truncate on open.
        const TRUNCATE = 1 << 3;
        /// With `CREATE`: fail if the target exists.
        const EXCLUSIVE = 1 << 4;
    }
}

impl OpenFlags {
    /// Read-only access (no flags).
    pub const READ_ONLY: Self = Self::empty();

    /// Create and truncate for writing.
    pub fn create_truncate() -> Self {
        Self::WRITE_ONLY | Self::CREATE | Self::TRUNCATE
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self::READ_WRITE | Self::CREATE | Self::EXCLUSIVE
    }

    pub fn readable(self) -> bool {
        !self.contains(Self::WRITE_ONLY)
    }

    pub fn writable(self) -> bool {
        self.intersects(Self::WRITE_ONLY | Self::READ_WRITE)
    }

    /// True if opening with these flags may change the filesystem.
    pub fn mutates(self) -> bool {
        self.writable() || self.intersects(Self::CREATE | Self::TRUNCATE)
    }
}
