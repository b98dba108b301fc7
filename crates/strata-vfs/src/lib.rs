//! Virtual filesystem with interchangeable backends.
//!
//! Every backend and wrapper implements [`Vfs`], a small synchronous,
//! path-based capability set: `stat`, `open`, `open_file`, `mkdir`,
//! `remove` and `read_dir`.
//!
//! - [`MemoryFs`]: an in-memory tree with sorted directories and optional
//!   zlib compression of stored files.
//! - [`DiskFs`]: a directory of the host filesystem.
//! - [`Mounter`]: several filesystems composed into one namespace.
//! - [`ReadOnly`], [`Chroot`], [`Rewriter`]: wrappers that guard or
//!   translate paths.
//!
//! Helpers such as [`walk`], [`mkdir_all`] and [`clone_fs`] work over any
//! of them.
//!
//! ```
//! use strata_vfs::{FileMode, MemoryFs, mkdir_all, read_file, write_file};
//!
//! let fs = MemoryFs::new();
//! mkdir_all(&fs, "a/b", FileMode::dir(0o755))?;
//! write_file(&fs, "a/b/hello.txt", b"hi", FileMode::file(0o644))?;
//! assert_eq!(read_file(&fs, "a/b/hello.txt")?, b"hi");
//! # Ok::<(), strata_vfs::VfsError>(())
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod hook;
pub mod mount;
pub mod ops;
pub mod path;
pub mod types;
pub mod util;
pub mod wrappers;

#[cfg(unix)]
pub use backends::disk::DiskFs;
pub use backends::memory::{File, MemoryFs};
pub use config::VfsConfig;
pub use error::{VfsError, VfsResult};
pub use hook::{CloseErrorHook, close_error_hook, set_close_error_hook};
pub use mount::{MountInfo, Mounter};
pub use ops::{Compressor, ReadHandle, Vfs, WriteHandle};
pub use types::{FileInfo, FileMode, OpenFlags};
pub use util::{WalkControl, clone_fs, compress, mkdir_all, read_file, remove_all, walk, write_file};
pub use wrappers::{Chroot, Container, ReadOnly, Rewriter};
