//! Mount table with longest-prefix routing.
//!
//! Routes filesystem operations to the appropriate backend based on path.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{VfsError, VfsResult};
use crate::ops::{ReadHandle, Vfs, WriteHandle};
use crate::path;
use crate::types::{FileInfo, FileMode, OpenFlags};

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The mount path (e.g., "/mnt/project").
    pub path: String,
    /// `Display` of the mounted filesystem.
    pub fs: String,
}

/// Composes independently owned filesystems into one namespace.
///
/// Mount points are matched by longest component prefix. If `/mnt` and
/// `/mnt/project` are both mounted, `/mnt/project/src/main.rs` is routed to
/// the `/mnt/project` mount as `/src/main.rs`. Paths outside every mount
/// fail with `NotExist`.
///
/// The table lock is released before delegating, so a slow backend never
/// blocks mounts or other lookups.
pub struct Mounter {
    /// Mount points, keyed by canonical path.
    mounts: RwLock<BTreeMap<String, Arc<dyn Vfs>>>,
}

impl fmt::Debug for Mounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mounter")
            .field("mounts", &self.mounts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Mounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Mounter {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Mount a filesystem at the given path.
    ///
    /// Fails with `AlreadyExists` if something is already mounted at exactly
    /// this path, and with `NotADirectory` if the path exists in the
    /// filesystems mounted so far and is not a directory.
    ///
    /// The target is checked without holding the table lock. The insert only
    /// happens if the mount that served the check still owns the path;
    /// otherwise the check is repeated. A concurrent write inside that
    /// mount can still turn the target into a file after the check.
    pub fn mount(&self, path: &str, fs: impl Vfs + 'static) -> VfsResult<()> {
        self.mount_arc(path, Arc::new(fs))
    }

    /// Mount a filesystem (already wrapped in Arc) at the given path.
    pub fn mount_arc(&self, path: &str, fs: Arc<dyn Vfs>) -> VfsResult<()> {
        let p = path::clean(path)?;
        loop {
            let checked = {
                let mounts = self.mounts.read();
                if mounts.contains_key(&p) {
                    return Err(already_mounted(&p));
                }
                route(&mounts, &p)
            };
            if let Some(route) = &checked {
                match route.fs.stat(&route.rel) {
                    Ok(info) if !info.is_dir() => return Err(VfsError::not_a_directory(p)),
                    Ok(_) => {}
                    Err(e) if e.is_not_exist() => {}
                    Err(e) => return Err(e),
                }
            }

            let mut mounts = self.mounts.write();
            if mounts.contains_key(&p) {
                return Err(already_mounted(&p));
            }
            let current = route(&mounts, &p);
            let unchanged = match (&checked, &current) {
                (None, None) => true,
                (Some(a), Some(b)) => a.mount_path == b.mount_path && Arc::ptr_eq(&a.fs, &b.fs),
                _ => false,
            };
            if !unchanged {
                tracing::trace!(path = %p, "mount table changed during target check, retrying");
                continue;
            }
            tracing::debug!(path = %p, fs = %fs, "mounting filesystem");
            mounts.insert(p, fs);
            return Ok(());
        }
    }

    /// Unmount the filesystem at the given path and hand it back.
    ///
    /// Anything mounted strictly below `path` must be unmounted first.
    pub fn umount(&self, path: &str) -> VfsResult<Arc<dyn Vfs>> {
        let p = path::clean(path)?;
        let mut mounts = self.mounts.write();
        if !mounts.contains_key(&p) {
            return Err(VfsError::not_exist(format!(
                "no filesystem mounted at {p}"
            )));
        }
        if mounts
            .keys()
            .any(|other| other != &p && path::relative_to(other, &p).is_some())
        {
            return Err(VfsError::mounted_below(p));
        }
        tracing::debug!(path = %p, "unmounting filesystem");
        mounts
            .remove(&p)
            .ok_or_else(|| VfsError::not_exist(format!("no filesystem mounted at {p}")))
    }

    /// List all current mounts, sorted by path.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .read()
            .iter()
            .map(|(path, fs)| MountInfo {
                path: path.clone(),
                fs: fs.to_string(),
            })
            .collect()
    }

    /// Find the innermost mount for `path`.
    ///
    /// Returns the mounted filesystem and the path relative to it.
    pub fn resolve(&self, path: &str) -> VfsResult<(Arc<dyn Vfs>, String)> {
        let route = self.route(path)?;
        Ok((route.fs, route.rel))
    }

    fn route(&self, path: &str) -> VfsResult<Route> {
        let p = path::clean(path)?;
        let route = route(&self.mounts.read(), &p);
        match route {
            Some(route) => {
                tracing::trace!(path = %p, mount = %route.mount_path, rel = %route.rel, "resolved mount");
                Ok(route)
            }
            None => Err(VfsError::not_exist(format!(
                "no filesystem mounted for {p}"
            ))),
        }
    }
}

/// Result of routing a path through the mount table.
struct Route {
    mount_path: String,
    fs: Arc<dyn Vfs>,
    rel: String,
}

impl Route {
    /// Report a mount point under its name in the outer namespace.
    fn rename_mount_root(&self, info: &mut FileInfo) {
        if self.rel == "/" && self.mount_path != "/" {
            info.name = path::split(&self.mount_path).1.to_string();
        }
    }
}

/// Longest component-prefix match of the canonical path `p`.
fn route(mounts: &BTreeMap<String, Arc<dyn Vfs>>, p: &str) -> Option<Route> {
    mounts
        .iter()
        .filter_map(|(mount_path, fs)| {
            path::relative_to(p, mount_path).map(|rel| (mount_path, fs, rel))
        })
        .max_by_key(|(mount_path, _, _)| mount_path.len())
        .map(|(mount_path, fs, rel)| Route {
            mount_path: mount_path.clone(),
            fs: Arc::clone(fs),
            rel,
        })
}

fn already_mounted(p: &str) -> VfsError {
    VfsError::already_exists(format!("filesystem already mounted at {p}"))
}

impl fmt::Display for Mounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mounter{")?;
        for (i, (path, fs)) in self.mounts.read().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{path}: {fs}")?;
        }
        f.write_str("}")
    }
}

impl Vfs for Mounter {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        let route = self.route(path)?;
        let mut info = route.fs.stat(&route.rel)?;
        route.rename_mount_root(&mut info);
        Ok(info)
    }

    fn lstat(&self, path: &str) -> VfsResult<FileInfo> {
        let route = self.route(path)?;
        let mut info = route.fs.lstat(&route.rel)?;
        route.rename_mount_root(&mut info);
        Ok(info)
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>> {
        let (fs, rel) = self.resolve(path)?;
        fs.open(&rel)
    }

    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>> {
        let (fs, rel) = self.resolve(path)?;
        fs.open_file(&rel, flags, mode)
    }

    fn mkdir(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        let (fs, rel) = self.resolve(path)?;
        fs.mkdir(&rel, mode)
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        let (fs, rel) = self.resolve(path)?;
        fs.remove(&rel)
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        let (fs, rel) = self.resolve(path)?;
        fs.read_dir(&rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{File, MemoryFs};
    use crate::util::{read_file, write_file};

    fn memory_with(files: &[(&str, &str)]) -> MemoryFs {
        MemoryFs::from_files(files.iter().map(|(p, d)| (*p, File::new(*d)))).unwrap()
    }

    #[test]
    fn test_basic_mount() {
        let table = Mounter::new();
        table.mount("/scratch", memory_with(&[("test.txt", "hello")])).unwrap();

        assert_eq!(read_file(&table, "/scratch/test.txt").unwrap(), b"hello");
        assert!(table.stat("/scratch").unwrap().is_dir());
    }

    #[test]
    fn test_multiple_mounts() {
        let table = Mounter::new();
        table.mount("/scratch", memory_with(&[("a.txt", "scratch")])).unwrap();
        table.mount("/data", memory_with(&[("b.txt", "data")])).unwrap();

        assert_eq!(read_file(&table, "/scratch/a.txt").unwrap(), b"scratch");
        assert_eq!(read_file(&table, "/data/b.txt").unwrap(), b"data");
        assert!(table.stat("/other").unwrap_err().is_not_exist());
    }

    #[test]
    fn test_nested_mount() {
        let table = Mounter::new();
        table.mount("/mnt", memory_with(&[("outer.txt", "outer")])).unwrap();
        table.mount("/mnt/project", memory_with(&[("inner.txt", "inner")])).unwrap();

        assert_eq!(read_file(&table, "/mnt/outer.txt").unwrap(), b"outer");
        assert_eq!(read_file(&table, "/mnt/project/inner.txt").unwrap(), b"inner");
        assert!(table.stat("/mnt/project/outer.txt").unwrap_err().is_not_exist());
    }

    #[test]
    fn test_prefix_matches_whole_segments() {
        let table = Mounter::new();
        table.mount("/", memory_with(&[("subway/x", "root")])).unwrap();
        table.mount("/sub", MemoryFs::new()).unwrap();

        let (fs, rel) = table.resolve("/subway/x").unwrap();
        assert_eq!(rel, "/subway/x");
        assert_eq!(read_file(fs.as_ref(), &rel).unwrap(), b"root");
    }

    #[test]
    fn test_mount_twice_keeps_first() {
        let table = Mounter::new();
        table.mount("/scratch", memory_with(&[("keep", "1")])).unwrap();

        let err = table.mount("/scratch/", MemoryFs::new()).unwrap_err();
        assert!(err.is_exist());
        assert!(err.to_string().contains("already mounted"));
        assert_eq!(read_file(&table, "/scratch/keep").unwrap(), b"1");
    }

    #[test]
    fn test_mount_on_file_fails() {
        let table = Mounter::new();
        table.mount("/", memory_with(&[("file", "x")])).unwrap();
        assert!(matches!(
            table.mount("/file", MemoryFs::new()),
            Err(VfsError::NotADirectory(_))
        ));
        // Missing targets are allowed.
        table.mount("/elsewhere", MemoryFs::new()).unwrap();
    }

    #[test]
    fn test_umount() {
        let table = Mounter::new();
        table.mount("/scratch", memory_with(&[("test.txt", "data")])).unwrap();
        assert!(read_file(&table, "/scratch/test.txt").is_ok());

        let fs = table.umount("/scratch").unwrap();
        assert_eq!(fs.to_string(), "Memory");
        assert!(read_file(&table, "/scratch/test.txt").is_err());

        let err = table.umount("/scratch").err().unwrap();
        assert!(err.is_not_exist());
        assert!(err.to_string().contains("no filesystem mounted"));
    }

    #[test]
    fn test_umount_with_mount_below() {
        let table = Mounter::new();
        table.mount("/", MemoryFs::new()).unwrap();
        table.mount("/a/b", MemoryFs::new()).unwrap();

        let err = table.umount("/").err().unwrap();
        assert!(matches!(err, VfsError::MountedBelow(_)));
        assert!(err.to_string().contains("mounted below"));
        assert_eq!(table.mounts().len(), 2);

        table.umount("/a/b").unwrap();
        table.umount("/").unwrap();
        assert!(table.mounts().is_empty());
    }

    #[test]
    fn test_list_mounts() {
        let table = Mounter::new();
        table.mount("/scratch", MemoryFs::new()).unwrap();
        table.mount("/data", MemoryFs::new()).unwrap();

        let mounts = table.mounts();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].path, "/data");
        assert_eq!(mounts[1].path, "/scratch");
        assert_eq!(mounts[1].fs, "Memory");
        assert_eq!(table.to_string(), "Mounter{/data: Memory, /scratch: Memory}");
    }

    #[test]
    fn test_writes_land_in_inner_mount() {
        let table = Mounter::new();
        let outer = Arc::new(MemoryFs::new());
        outer.mkdir("/sub", FileMode::dir(0o755)).unwrap();
        let inner = Arc::new(MemoryFs::new());
        table.mount_arc("/", outer.clone()).unwrap();
        table.mount_arc("/sub", inner.clone()).unwrap();

        write_file(&table, "/sub/f", b"x", FileMode::file(0o644)).unwrap();
        assert_eq!(read_file(inner.as_ref(), "/f").unwrap(), b"x");
        assert!(outer.stat("/sub/f").unwrap_err().is_not_exist());
    }

    #[test]
    fn test_stat_mount_point_uses_mount_name() {
        let table = Mounter::new();
        let outer = memory_with(&[]);
        outer.mkdir("/sub", FileMode::dir(0o755)).unwrap();
        table.mount("/", outer).unwrap();
        table.mount("/sub", MemoryFs::new()).unwrap();
        table.mount("/a/b", MemoryFs::new()).unwrap();

        assert_eq!(table.stat("/").unwrap().name, "/");
        assert_eq!(table.stat("/sub").unwrap().name, "sub");
        assert_eq!(table.lstat("/sub").unwrap().name, "sub");
        assert_eq!(table.stat("/a/b").unwrap().name, "b");
        let listed: Vec<_> = table.read_dir("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(listed, vec!["sub"]);
    }

    #[test]
    fn test_mount_target_checked_against_current_table() {
        let table = Mounter::new();
        table.mount("/", memory_with(&[("data/file", "x")])).unwrap();
        table.mount("/data", memory_with(&[("file", "y")])).unwrap();
        assert!(matches!(
            table.mount("/data/file", MemoryFs::new()),
            Err(VfsError::NotADirectory(_))
        ));

        table.umount("/data").unwrap();
        table.mount("/data", MemoryFs::new()).unwrap();
        table.mount("/data/file", MemoryFs::new()).unwrap();
        assert_eq!(table.mounts().len(), 3);
    }
}
