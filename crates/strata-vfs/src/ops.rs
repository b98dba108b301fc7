//! Capability traits shared by every backend and wrapper.
//!
//! All operations are synchronous and path-based. Paths are interpreted
//! relative to the filesystem's own root; composition (mounts, chroot,
//! rewriting) is done by wrappers that translate the path and delegate.

use std::fmt;
use std::io::{self, SeekFrom};

use crate::error::{VfsError, VfsResult};
use crate::types::{FileInfo, FileMode, OpenFlags};

/// Toggle and query transparent compression of a file's stored form.
pub trait Compressor {
    /// True if the stored form of the file, as of the last open or close,
    /// is compressed.
    fn is_compressed(&self) -> bool;

    /// Request that the payload be compressed when the handle is closed.
    /// Only takes effect on writable handles.
    fn set_compressed(&mut self, compressed: bool);
}

/// A cursor over a file's content.
///
/// Handles are owned by one caller at a time. Dropping a handle without
/// calling [`close`](ReadHandle::close) closes it implicitly; errors from the
/// implicit close go to the close-error hook.
pub trait ReadHandle: Send {
    /// Read into `buf` from the current offset. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Move the offset. Out-of-range targets are clamped to `[0, len]`.
    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64>;

    /// Release the handle. Writable handles publish their content here.
    fn close(&mut self) -> VfsResult<()>;

    /// Compression control, if the backend supports it.
    fn as_compressor(&mut self) -> Option<&mut dyn Compressor> {
        None
    }

    /// Read everything from the current offset to the end.
    fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

/// A cursor that can also write.
pub trait WriteHandle: ReadHandle {
    /// Write `buf` at the current offset, overwriting then appending.
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize>;

    /// Write the whole buffer.
    fn write_all(&mut self, mut buf: &[u8]) -> VfsResult<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(VfsError::Io(io::Error::from(io::ErrorKind::WriteZero)));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

/// Core filesystem operations.
///
/// `Display` gives a short diagnostic name; wrappers include the name of the
/// filesystem they wrap.
pub trait Vfs: Send + Sync + fmt::Display {
    /// File metadata.
    fn stat(&self, path: &str) -> VfsResult<FileInfo>;

    /// Same as [`stat`](Vfs::stat); links are not modeled.
    fn lstat(&self, path: &str) -> VfsResult<FileInfo> {
        self.stat(path)
    }

    /// Open a file for reading. Fails with `IsADirectory` on a directory.
    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>>;

    /// Open a file with explicit flags, creating it with `mode` if asked to.
    ///
    /// `FileMode::default()` leaves the permissions to the backend.
    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>>;

    /// Create a directory. The parent must exist.
    fn mkdir(&self, path: &str, mode: FileMode) -> VfsResult<()>;

    /// Remove a file or an empty directory.
    fn remove(&self, path: &str) -> VfsResult<()>;

    /// Entries of a directory, sorted by name.
    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>>;

    /// Check if a path exists.
    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }
}

impl io::Read for dyn ReadHandle + '_ {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ReadHandle::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Seek for dyn ReadHandle + '_ {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ReadHandle::seek(self, pos).map_err(io::Error::from)
    }
}

impl io::Read for dyn WriteHandle + '_ {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ReadHandle::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Seek for dyn WriteHandle + '_ {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        ReadHandle::seek(self, pos).map_err(io::Error::from)
    }
}

impl io::Write for dyn WriteHandle + '_ {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        WriteHandle::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
