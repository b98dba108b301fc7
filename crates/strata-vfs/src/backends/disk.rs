//! Host filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use std::fmt;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::TempDir;

use super::clamp_seek;
use crate::error::{VfsError, VfsResult};
use crate::ops::{ReadHandle, Vfs, WriteHandle};
use crate::path;
use crate::types::{FileInfo, FileMode, OpenFlags};

/// Host filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `open("src/main.rs")` opens
/// `/home/amy/project/src/main.rs`.
///
/// `..` cannot climb above the root, and symlinks that lead outside it are
/// refused with `InvalidPath`.
pub struct DiskFs {
    root: PathBuf,
    /// Owns the directory of a temporary filesystem; removed on drop.
    temp: Option<TempDir>,
}

impl fmt::Debug for DiskFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskFs")
            .field("root", &self.root)
            .field("temporary", &self.temp.is_some())
            .finish()
    }
}

impl DiskFs {
    /// Create a filesystem rooted at an existing directory.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl AsRef<Path>) -> VfsResult<Self> {
        let root = root.as_ref();
        let display = root.display().to_string();
        let root = dunce::canonicalize(root).map_err(|e| VfsError::from_io(e, &display))?;
        if !fs::metadata(&root)
            .map_err(|e| VfsError::from_io(e, &display))?
            .is_dir()
        {
            return Err(VfsError::not_a_directory(display));
        }
        Ok(Self { root, temp: None })
    }

    /// Create a filesystem in a fresh temporary directory whose name starts
    /// with `prefix`. The directory is deleted when the filesystem is
    /// dropped or [`close`](DiskFs::close)d.
    pub fn temporary(prefix: &str) -> VfsResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(VfsError::Io)?;
        let root = dunce::canonicalize(temp.path()).map_err(VfsError::Io)?;
        tracing::debug!(root = %root.display(), "created temporary filesystem");
        Ok(Self {
            root,
            temp: Some(temp),
        })
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Release the filesystem, deleting the directory if it is temporary.
    pub fn close(self) -> VfsResult<()> {
        match self.temp {
            Some(temp) => temp.close().map_err(VfsError::Io),
            None => Ok(()),
        }
    }

    fn open_handle(&self, path: &str, flags: OpenFlags, mode: FileMode) -> VfsResult<DiskHandle> {
        if mode.is_special() || mode.is_dir() {
            return Err(VfsError::unsupported(format!(
                "{path}: disk filesystem does not support special files"
            )));
        }
        let (clean, full) = self.resolve(path)?;
        if path::split(&clean).1.is_empty() {
            return Err(VfsError::invalid_name(clean));
        }

        let writable = flags.writable();
        let mut options = fs::OpenOptions::new();
        options.read(flags.readable()).write(writable);
        if writable {
            options
                .create(flags.contains(OpenFlags::CREATE))
                .truncate(flags.contains(OpenFlags::TRUNCATE))
                .create_new(flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE));
        }
        let perm = if mode == FileMode::default() {
            0o644
        } else {
            mode.perm()
        };
        options.mode(perm);

        let file = options
            .open(&full)
            .map_err(|e| VfsError::from_io(e, &clean))?;
        let meta = file.metadata().map_err(|e| VfsError::from_io(e, &clean))?;
        if meta.is_dir() {
            return Err(VfsError::is_a_directory(clean));
        }
        tracing::trace!(path = %clean, ?flags, "disk open_file");
        Ok(DiskHandle {
            path: clean,
            file: Some(file),
        })
    }

    /// Map a VFS path to a host path under the root.
    fn resolve(&self, p: &str) -> VfsResult<(String, PathBuf)> {
        let clean = path::clean(p)?;
        let full = self.root.join(clean.trim_start_matches('/'));

        // Existing paths are checked through their canonical form, new ones
        // through their parent.
        let canonical = match dunce::canonicalize(&full) {
            Ok(c) => Some(c),
            Err(_) => full
                .parent()
                .and_then(|parent| dunce::canonicalize(parent).ok())
                .zip(full.file_name())
                .map(|(parent, name)| parent.join(name)),
        };
        if let Some(canonical) = canonical {
            if !canonical.starts_with(&self.root) {
                return Err(VfsError::invalid_path(format!(
                    "{} is not under {}",
                    canonical.display(),
                    self.root.display()
                )));
            }
        }
        Ok((clean, full))
    }
}

/// Convert host metadata to FileInfo.
fn metadata_to_info(name: String, meta: &fs::Metadata) -> FileInfo {
    FileInfo {
        name,
        size: if meta.is_dir() { 0 } else { meta.len() },
        mode: FileMode::new(meta.mode()),
        mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

fn base_name(clean: &str) -> String {
    match path::split(clean) {
        (_, "") => "/".to_string(),
        (_, base) => base.to_string(),
    }
}

impl fmt::Display for DiskFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Disk {}", self.root.display())
    }
}

impl Vfs for DiskFs {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        let (clean, full) = self.resolve(path)?;
        let meta = fs::metadata(&full).map_err(|e| VfsError::from_io(e, &clean))?;
        Ok(metadata_to_info(base_name(&clean), &meta))
    }

    fn lstat(&self, path: &str) -> VfsResult<FileInfo> {
        let (clean, full) = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full).map_err(|e| VfsError::from_io(e, &clean))?;
        Ok(metadata_to_info(base_name(&clean), &meta))
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>> {
        Ok(Box::new(self.open_handle(path, OpenFlags::READ_ONLY, FileMode::default())?))
    }

    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>> {
        Ok(Box::new(self.open_handle(path, flags, mode)?))
    }

    fn mkdir(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        let (clean, full) = self.resolve(path)?;
        let perm = if mode == FileMode::default() {
            0o755
        } else {
            mode.perm()
        };
        fs::DirBuilder::new()
            .mode(perm)
            .create(&full)
            .map_err(|e| VfsError::from_io(e, &clean))
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        let (clean, full) = self.resolve(path)?;
        if clean == "/" {
            return Err(VfsError::invalid_path("cannot remove the root directory"));
        }
        let meta = fs::symlink_metadata(&full).map_err(|e| VfsError::from_io(e, &clean))?;
        let result = if meta.is_dir() {
            fs::remove_dir(&full)
        } else {
            fs::remove_file(&full)
        };
        result.map_err(|e| VfsError::from_io(e, &clean))
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        let (clean, full) = self.resolve(path)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| VfsError::from_io(e, &clean))? {
            let entry = entry.map_err(|e| VfsError::from_io(e, &clean))?;
            let meta = entry.metadata().map_err(|e| VfsError::from_io(e, &clean))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(metadata_to_info(name, &meta));
        }
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        Ok(entries)
    }
}

/// Handle over an open host file.
#[derive(Debug)]
struct DiskHandle {
    path: String,
    file: Option<fs::File>,
}

/// `EBADF`: the descriptor lacks the requested access.
const EBADF: i32 = 9;

fn handle_error(e: io::Error, path: &str) -> VfsError {
    if e.raw_os_error() == Some(EBADF) {
        VfsError::bad_descriptor(format!("{path}: {e}"))
    } else {
        VfsError::from_io(e, path)
    }
}

impl ReadHandle for DiskHandle {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let file = self.file.as_mut().ok_or(VfsError::UseAfterClose)?;
        file.read(buf).map_err(|e| handle_error(e, &self.path))
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        let file = self.file.as_mut().ok_or(VfsError::UseAfterClose)?;
        let cur = file
            .stream_position()
            .map_err(|e| handle_error(e, &self.path))?;
        let len = file
            .metadata()
            .map_err(|e| handle_error(e, &self.path))?
            .len();
        file.seek(SeekFrom::Start(clamp_seek(cur, len, pos)))
            .map_err(|e| handle_error(e, &self.path))
    }

    fn close(&mut self) -> VfsResult<()> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(VfsError::UseAfterClose),
        }
    }
}

impl WriteHandle for DiskHandle {
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        let file = self.file.as_mut().ok_or(VfsError::UseAfterClose)?;
        file.write(buf).map_err(|e| handle_error(e, &self.path))
    }
}
