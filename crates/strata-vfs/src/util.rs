//! Helpers built only on the [`Vfs`] trait.
//!
//! These work the same over any backend or wrapper.

use crate::error::{VfsError, VfsResult};
use crate::ops::{ReadHandle, Vfs, WriteHandle};
use crate::path;
use crate::types::{FileInfo, FileMode, OpenFlags};

/// Read a whole file.
pub fn read_file(fs: &dyn Vfs, path: &str) -> VfsResult<Vec<u8>> {
    let mut handle = fs.open(path)?;
    match handle.read_to_end() {
        Ok(data) => {
            handle.close()?;
            Ok(data)
        }
        Err(err) => {
            let _ = handle.close();
            Err(err)
        }
    }
}

/// Create or truncate `path` and write `data` to it.
///
/// If the write fails the handle is still closed, and the write error is
/// the one returned.
pub fn write_file(fs: &dyn Vfs, path: &str, data: &[u8], mode: FileMode) -> VfsResult<()> {
    let mut handle = fs.open_file(path, OpenFlags::create_truncate(), mode)?;
    if let Err(err) = handle.write_all(data) {
        let _ = handle.close();
        return Err(err);
    }
    handle.close()
}

/// Create a directory and any missing parents.
///
/// Existing directories along the way are fine; an existing file is
/// `NotADirectory`.
pub fn mkdir_all(fs: &dyn Vfs, path: &str, mode: FileMode) -> VfsResult<()> {
    let p = path::clean(path)?;
    let mut current = String::with_capacity(p.len());
    for seg in path::components(&p) {
        current.push('/');
        current.push_str(seg);
        match fs.stat(&current) {
            Ok(info) if info.is_dir() => continue,
            Ok(_) => return Err(VfsError::not_a_directory(current)),
            Err(e) if e.is_not_exist() => {}
            Err(e) => return Err(e),
        }
        match fs.mkdir(&current, mode) {
            // Lost a race with another creator.
            Err(e) if e.is_exist() => {}
            other => other?,
        }
    }
    Ok(())
}

/// Remove `path` and everything below it.
///
/// A missing target is not an error. For the root, only its contents are
/// removed.
pub fn remove_all(fs: &dyn Vfs, path: &str) -> VfsResult<()> {
    let info = match fs.lstat(path) {
        Ok(info) => info,
        Err(e) if e.is_not_exist() => return Ok(()),
        Err(e) => return Err(e),
    };
    if info.is_dir() {
        for child in fs.read_dir(path)? {
            remove_all(fs, &path::join(path, &child.name))?;
        }
        if path::clean(path)? == "/" {
            return Ok(());
        }
    }
    match fs.remove(path) {
        Err(e) if e.is_not_exist() => Ok(()),
        other => other,
    }
}

/// What [`walk`] does after visiting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    /// Do not descend into this directory. Has no effect on files.
    SkipDir,
}

/// Visit `root` and everything below it, pre-order, children in name order.
///
/// Paths passed to `visit` are `root` joined with the entry names, so a
/// relative root yields relative paths. An error from `visit` or from the
/// filesystem stops the walk and is returned.
pub fn walk<F>(fs: &dyn Vfs, root: &str, mut visit: F) -> VfsResult<()>
where
    F: FnMut(&str, &FileInfo) -> VfsResult<WalkControl>,
{
    let info = fs.lstat(root)?;
    walk_entry(fs, root, &info, &mut visit)
}

fn walk_entry<F>(fs: &dyn Vfs, path: &str, info: &FileInfo, visit: &mut F) -> VfsResult<()>
where
    F: FnMut(&str, &FileInfo) -> VfsResult<WalkControl>,
{
    let control = visit(path, info)?;
    if !info.is_dir() || control == WalkControl::SkipDir {
        return Ok(());
    }
    for child in fs.read_dir(path)? {
        walk_entry(fs, &path::join(path, &child.name), &child, visit)?;
    }
    Ok(())
}

/// Copy every directory and file of `src` into `dst`.
///
/// Directories that already exist in `dst` are reused; files are
/// overwritten.
pub fn clone_fs(dst: &dyn Vfs, src: &dyn Vfs) -> VfsResult<()> {
    walk(src, "/", |p, info| {
        if info.is_dir() {
            if p != "/" {
                if let Err(e) = dst.mkdir(p, info.mode) {
                    if !(e.is_exist() && dst.stat(p)?.is_dir()) {
                        return Err(e);
                    }
                }
            }
        } else {
            let data = read_file(src, p)?;
            write_file(dst, p, &data, info.mode)?;
        }
        Ok(WalkControl::Continue)
    })
}

/// Re-store every file of `fs` compressed where that saves space.
///
/// Fails with `Unsupported` on a backend whose handles cannot compress.
pub fn compress(fs: &dyn Vfs) -> VfsResult<()> {
    walk(fs, "/", |p, info| {
        if info.is_dir() {
            return Ok(WalkControl::Continue);
        }
        let mut handle = fs.open_file(p, OpenFlags::READ_WRITE, info.mode)?;
        match handle.as_compressor() {
            Some(c) => c.set_compressed(true),
            None => {
                let _ = handle.close();
                return Err(VfsError::unsupported(format!("{fs} cannot compress {p}")));
            }
        }
        handle.close()?;
        Ok(WalkControl::Continue)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryFs;

    fn dir() -> FileMode {
        FileMode::dir(0o755)
    }

    fn file() -> FileMode {
        FileMode::file(0o644)
    }

    #[test]
    fn test_write_then_read() {
        let fs = MemoryFs::new();
        write_file(&fs, "f", b"hello", file()).unwrap();
        assert_eq!(read_file(&fs, "f").unwrap(), b"hello");
        write_file(&fs, "f", b"hi", file()).unwrap();
        assert_eq!(read_file(&fs, "f").unwrap(), b"hi");
    }

    #[test]
    fn test_write_file_missing_parent() {
        let fs = MemoryFs::new();
        assert!(write_file(&fs, "a/b", b"x", file()).unwrap_err().is_not_exist());
    }

    #[test]
    fn test_mkdir_all_idempotent() {
        let fs = MemoryFs::new();
        mkdir_all(&fs, "a/b/c", dir()).unwrap();
        mkdir_all(&fs, "a/b/c", dir()).unwrap();
        mkdir_all(&fs, "/", dir()).unwrap();
        assert!(fs.stat("a/b/c").unwrap().is_dir());
    }

    #[test]
    fn test_mkdir_all_through_file() {
        let fs = MemoryFs::new();
        mkdir_all(&fs, "a", dir()).unwrap();
        write_file(&fs, "a/f", b"x", file()).unwrap();
        assert!(matches!(
            mkdir_all(&fs, "a/f/g", dir()),
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_remove_all() {
        let fs = MemoryFs::new();
        mkdir_all(&fs, "a/b/c", dir()).unwrap();
        write_file(&fs, "a/b/c/f", b"abc", file()).unwrap();
        write_file(&fs, "a/g", b"g", file()).unwrap();

        remove_all(&fs, "a").unwrap();
        assert!(fs.stat("a").unwrap_err().is_not_exist());
        remove_all(&fs, "a").unwrap();

        write_file(&fs, "single", b"x", file()).unwrap();
        remove_all(&fs, "single").unwrap();
        assert!(!fs.exists("single"));
    }

    #[test]
    fn test_remove_all_root_keeps_root() {
        let fs = MemoryFs::new();
        mkdir_all(&fs, "a/b", dir()).unwrap();
        write_file(&fs, "f", b"x", file()).unwrap();
        remove_all(&fs, "/").unwrap();
        assert!(fs.read_dir("/").unwrap().is_empty());
    }

    fn sample() -> MemoryFs {
        let fs = MemoryFs::new();
        mkdir_all(&fs, "a/b/c", dir()).unwrap();
        mkdir_all(&fs, "d", dir()).unwrap();
        write_file(&fs, "a/f", b"x", file()).unwrap();
        write_file(&fs, "a/b/g", b"y", file()).unwrap();
        write_file(&fs, "e", b"z", file()).unwrap();
        fs
    }

    #[test]
    fn test_walk_order() {
        let fs = sample();
        let mut seen = Vec::new();
        walk(&fs, "/", |p, _| {
            seen.push(p.to_string());
            Ok(WalkControl::Continue)
        })
        .unwrap();
        assert_eq!(
            seen,
            vec!["/", "/a", "/a/b", "/a/b/c", "/a/b/g", "/a/f", "/d", "/e"]
        );
    }

    #[test]
    fn test_walk_relative_root() {
        let fs = sample();
        let mut seen = Vec::new();
        walk(&fs, "a/b", |p, _| {
            seen.push(p.to_string());
            Ok(WalkControl::Continue)
        })
        .unwrap();
        assert_eq!(seen, vec!["a/b", "a/b/c", "a/b/g"]);
    }

    #[test]
    fn test_walk_skip_dir() {
        let fs = sample();
        let mut seen = Vec::new();
        walk(&fs, "/", |p, info| {
            seen.push(p.to_string());
            if p == "/a" || (p == "/e" && !info.is_dir()) {
                return Ok(WalkControl::SkipDir);
            }
            Ok(WalkControl::Continue)
        })
        .unwrap();
        assert_eq!(seen, vec!["/", "/a", "/d", "/e"]);
    }

    #[test]
    fn test_walk_error_aborts() {
        let fs = sample();
        let mut count = 0;
        let err = walk(&fs, "/", |p, _| {
            count += 1;
            if p == "/a/b" {
                return Err(VfsError::unsupported("stop"));
            }
            Ok(WalkControl::Continue)
        })
        .unwrap_err();
        assert!(matches!(err, VfsError::Unsupported(_)));
        assert_eq!(count, 3);
    }

    #[test]
    fn test_walk_missing_root() {
        let fs = MemoryFs::new();
        let err = walk(&fs, "nope", |_, _| Ok(WalkControl::Continue)).unwrap_err();
        assert!(err.is_not_exist());
    }

    #[test]
    fn test_clone_fs() {
        let src = sample();
        let dst = MemoryFs::new();
        mkdir_all(&dst, "a", dir()).unwrap();
        clone_fs(&dst, &src).unwrap();

        assert_eq!(read_file(&dst, "a/b/g").unwrap(), b"y");
        assert_eq!(read_file(&dst, "e").unwrap(), b"z");
        assert!(dst.stat("a/b/c").unwrap().is_dir());
    }

    #[test]
    fn test_clone_zero_perm() {
        let src = MemoryFs::new();
        mkdir_all(&src, "d", FileMode::dir(0)).unwrap();
        write_file(&src, "d/f", b"x", FileMode::file(0)).unwrap();
        let dst = MemoryFs::new();
        clone_fs(&dst, &src).unwrap();
        assert_eq!(read_file(&dst, "d/f").unwrap(), b"x");
    }

    #[test]
    fn test_compress_keeps_content() {
        let fs = MemoryFs::new();
        let big = b"all work and no play ".repeat(100);
        write_file(&fs, "big", &big, file()).unwrap();
        write_file(&fs, "small", b"hello", file()).unwrap();

        compress(&fs).unwrap();

        assert_eq!(read_file(&fs, "big").unwrap(), big);
        assert_eq!(read_file(&fs, "small").unwrap(), b"hello");
        assert_eq!(fs.stat("big").unwrap().size, big.len() as u64);

        let mut h = fs.open("big").unwrap();
        assert!(h.as_compressor().unwrap().is_compressed());
        h.close().unwrap();
    }
}
