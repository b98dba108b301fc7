//! Filesystems that wrap another one.
//!
//! Each wrapper forwards to an inner [`Vfs`] after checking the operation
//! or rewriting the path. Errors from the inner filesystem pass through
//! unchanged.

use std::fmt;
use std::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::ops::{ReadHandle, Vfs, WriteHandle};
use crate::path;
use crate::types::{FileInfo, FileMode, OpenFlags};

/// A filesystem that delegates to another.
pub trait Container {
    /// The wrapped filesystem.
    fn inner(&self) -> &Arc<dyn Vfs>;
}

/// Rejects every operation that could modify the inner filesystem.
pub struct ReadOnly {
    inner: Arc<dyn Vfs>,
}

impl ReadOnly {
    pub fn new(inner: Arc<dyn Vfs>) -> Self {
        Self { inner }
    }
}

impl Container for ReadOnly {
    fn inner(&self) -> &Arc<dyn Vfs> {
        &self.inner
    }
}

impl fmt::Display for ReadOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RO {}", self.inner)
    }
}

impl Vfs for ReadOnly {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        self.inner.stat(path)
    }

    fn lstat(&self, path: &str) -> VfsResult<FileInfo> {
        self.inner.lstat(path)
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>> {
        self.inner.open(path)
    }

    /// Only plain reads get through; any write, create or truncate flag
    /// fails with `ReadOnlyViolation`.
    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>> {
        if flags.mutates() {
            return Err(VfsError::ReadOnlyViolation);
        }
        self.inner.open_file(path, flags, mode)
    }

    fn mkdir(&self, _path: &str, _mode: FileMode) -> VfsResult<()> {
        Err(VfsError::ReadOnlyViolation)
    }

    fn remove(&self, _path: &str) -> VfsResult<()> {
        Err(VfsError::ReadOnlyViolation)
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        self.inner.read_dir(path)
    }
}

/// Exposes a subdirectory of the inner filesystem as its root.
///
/// Paths are normalized before being re-rooted, so `..` cannot leave the
/// new root.
pub struct Chroot {
    root: String,
    inner: Arc<dyn Vfs>,
}

impl Chroot {
    /// `root` must be an existing directory of `inner`.
    pub fn new(root: &str, inner: Arc<dyn Vfs>) -> VfsResult<Self> {
        let root = path::clean(root)?;
        if !inner.stat(&root)?.is_dir() {
            return Err(VfsError::not_a_directory(root));
        }
        Ok(Self { root, inner })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn translate(&self, p: &str) -> VfsResult<String> {
        let p = path::clean(p)?;
        if self.root == "/" {
            Ok(p)
        } else if p == "/" {
            Ok(self.root.clone())
        } else {
            Ok(format!("{}{}", self.root, p))
        }
    }
}

impl Container for Chroot {
    fn inner(&self) -> &Arc<dyn Vfs> {
        &self.inner
    }
}

impl fmt::Display for Chroot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chroot {} {}", self.root, self.inner)
    }
}

impl Vfs for Chroot {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        let mut info = self.inner.stat(&self.translate(path)?)?;
        if path::clean(path)? == "/" {
            info.name = "/".to_string();
        }
        Ok(info)
    }

    fn lstat(&self, path: &str) -> VfsResult<FileInfo> {
        let mut info = self.inner.lstat(&self.translate(path)?)?;
        if path::clean(path)? == "/" {
            info.name = "/".to_string();
        }
        Ok(info)
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>> {
        self.inner.open(&self.translate(path)?)
    }

    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>> {
        self.inner.open_file(&self.translate(path)?, flags, mode)
    }

    fn mkdir(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        self.inner.mkdir(&self.translate(path)?, mode)
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        if path::clean(path)? == "/" {
            return Err(VfsError::invalid_path("cannot remove the root directory"));
        }
        self.inner.remove(&self.translate(path)?)
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        self.inner.read_dir(&self.translate(path)?)
    }
}

/// Path rewriting function used by [`Rewriter`].
pub type RewriteFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Passes every path through a function before delegating.
pub struct Rewriter {
    inner: Arc<dyn Vfs>,
    rewrite: RewriteFn,
}

impl Rewriter {
    pub fn new(inner: Arc<dyn Vfs>, rewrite: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            inner,
            rewrite: Box::new(rewrite),
        }
    }
}

impl Container for Rewriter {
    fn inner(&self) -> &Arc<dyn Vfs> {
        &self.inner
    }
}

impl fmt::Display for Rewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rewriter {}", self.inner)
    }
}

impl Vfs for Rewriter {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        self.inner.stat(&(self.rewrite)(path))
    }

    fn lstat(&self, path: &str) -> VfsResult<FileInfo> {
        self.inner.lstat(&(self.rewrite)(path))
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>> {
        self.inner.open(&(self.rewrite)(path))
    }

    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>> {
        self.inner.open_file(&(self.rewrite)(path), flags, mode)
    }

    fn mkdir(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        self.inner.mkdir(&(self.rewrite)(path), mode)
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        self.inner.remove(&(self.rewrite)(path))
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        self.inner.read_dir(&(self.rewrite)(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryFs;
    use crate::util::{mkdir_all, read_file, write_file};

    fn file() -> FileMode {
        FileMode::file(0o644)
    }

    fn dir() -> FileMode {
        FileMode::dir(0o755)
    }

    #[test]
    fn test_read_only() {
        let mem: Arc<dyn Vfs> = Arc::new(MemoryFs::new());
        write_file(mem.as_ref(), "f", b"x", file()).unwrap();
        mkdir_all(mem.as_ref(), "d", dir()).unwrap();

        let ro = ReadOnly::new(mem.clone());
        assert_eq!(read_file(&ro, "f").unwrap(), b"x");
        assert!(ro.stat("f").is_ok());
        assert!(ro.lstat("d").unwrap().is_dir());
        assert_eq!(ro.read_dir("/").unwrap().len(), 2);
        assert!(Arc::ptr_eq(ro.inner(), &mem));
        assert_eq!(ro.to_string(), "RO Memory");
    }

    #[test]
    fn test_read_only_write_forbidden() {
        let mem: Arc<dyn Vfs> = Arc::new(MemoryFs::new());
        write_file(mem.as_ref(), "f", b"x", file()).unwrap();
        mkdir_all(mem.as_ref(), "d", dir()).unwrap();
        let ro = ReadOnly::new(mem.clone());

        assert!(matches!(
            ro.open_file("new", OpenFlags::CREATE | OpenFlags::WRITE_ONLY, file()),
            Err(VfsError::ReadOnlyViolation)
        ));
        assert!(matches!(
            ro.open_file("f", OpenFlags::TRUNCATE, file()),
            Err(VfsError::ReadOnlyViolation)
        ));
        assert!(matches!(ro.mkdir("x", dir()), Err(VfsError::ReadOnlyViolation)));
        assert!(matches!(ro.remove("d"), Err(VfsError::ReadOnlyViolation)));
        assert!(!mem.exists("new"));

        let mut r = ro.open_file("f", OpenFlags::READ_ONLY, FileMode::default()).unwrap();
        assert_eq!(r.read_to_end().unwrap(), b"x");
        r.close().unwrap();
    }

    #[test]
    fn test_chroot() {
        let mem: Arc<dyn Vfs> = Arc::new(MemoryFs::new());
        mkdir_all(mem.as_ref(), "sub/dir", dir()).unwrap();
        write_file(mem.as_ref(), "sub/dir/f", b"data", file()).unwrap();

        let ch = Chroot::new("sub", mem.clone()).unwrap();
        assert_eq!(read_file(&ch, "dir/f").unwrap(), b"data");
        assert!(matches!(
            read_file(&ch, "../dir/f"),
            Err(VfsError::InvalidPath(_))
        ));

        let infos = ch.read_dir("/").unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "dir");
        assert_eq!(ch.stat("dir/f").unwrap().size, 4);
        assert_eq!(ch.stat("/").unwrap().name, "/");
        assert!(ch.lstat("dir").unwrap().is_dir());

        ch.mkdir("newdir", dir()).unwrap();
        write_file(&ch, "newdir/g", b"g", file()).unwrap();
        assert_eq!(read_file(mem.as_ref(), "sub/newdir/g").unwrap(), b"g");
        ch.remove("newdir/g").unwrap();
        ch.remove("newdir").unwrap();
        assert!(matches!(ch.remove("/"), Err(VfsError::InvalidPath(_))));

        assert!(Arc::ptr_eq(ch.inner(), &mem));
        assert_eq!(ch.to_string(), "Chroot /sub Memory");
    }

    #[test]
    fn test_chroot_requires_directory() {
        let mem: Arc<dyn Vfs> = Arc::new(MemoryFs::new());
        write_file(mem.as_ref(), "file", b"x", file()).unwrap();
        assert!(matches!(
            Chroot::new("file", mem.clone()),
            Err(VfsError::NotADirectory(_))
        ));
        assert!(Chroot::new("nonexistent", mem).err().unwrap().is_not_exist());
    }

    #[test]
    fn test_rewriter() {
        let mem: Arc<dyn Vfs> = Arc::new(MemoryFs::new());
        write_file(mem.as_ref(), "a", b"A", file()).unwrap();
        mkdir_all(mem.as_ref(), "d", dir()).unwrap();

        let rew = Rewriter::new(mem.clone(), |p| match p {
            "x" => "a".to_string(),
            "y" => "d".to_string(),
            other => other.to_string(),
        });
        assert_eq!(read_file(&rew, "x").unwrap(), b"A");
        assert_eq!(rew.stat("x").unwrap().name, "a");
        assert!(rew.lstat("y").unwrap().is_dir());
        assert!(rew.read_dir("y").unwrap().is_empty());

        rew.mkdir("z", dir()).unwrap();
        write_file(&rew, "z/f", b"f", file()).unwrap();
        rew.remove("z/f").unwrap();
        rew.remove("z").unwrap();

        assert!(Arc::ptr_eq(rew.inner(), &mem));
        assert_eq!(rew.to_string(), "Rewriter Memory");
    }

    #[test]
    fn test_wrappers_compose() {
        let mem: Arc<dyn Vfs> = Arc::new(MemoryFs::new());
        mkdir_all(mem.as_ref(), "jail", dir()).unwrap();
        let ch: Arc<dyn Vfs> = Arc::new(Chroot::new("jail", mem).unwrap());
        let ro = ReadOnly::new(ch);
        assert_eq!(ro.to_string(), "RO Chroot /jail Memory");
    }
}
