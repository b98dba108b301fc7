//! In-memory filesystem backend.
//!
//! All data lives in a [`Tree`](store) behind a single reader/writer lock.
//! Nothing is persisted; the tree is dropped with the last reference.

mod codec;
mod handle;
mod store;

pub use handle::{MemoryReadHandle, MemoryWriteHandle};
pub use store::{Dir, Entry, File, Node};

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::config::VfsConfig;
use crate::error::{VfsError, VfsResult};
use crate::ops::{ReadHandle, Vfs, WriteHandle};
use crate::path;
use crate::types::{FileInfo, FileMode, OpenFlags};
use handle::CommitTarget;
use store::Tree;

/// In-memory filesystem.
///
/// Thread-safe: lookups share the read lock, anything that changes the tree
/// (creating opens, `mkdir`, `remove`, closing a modified write handle)
/// takes the write lock. No lock is held while a caller owns a handle.
pub struct MemoryFs {
    tree: Arc<RwLock<Tree>>,
    config: Arc<VfsConfig>,
}

impl fmt::Debug for MemoryFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFs")
            .field("tree", &"<locked>")
            .field("config", &self.config)
            .finish()
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem with default settings.
    pub fn new() -> Self {
        Self::with_config(VfsConfig::default())
    }

    pub fn with_config(config: VfsConfig) -> Self {
        Self {
            tree: Arc::new(RwLock::new(Tree::new(config.dir_mode()))),
            config: Arc::new(config),
        }
    }

    /// Build a filesystem holding `files`, creating parent directories as
    /// needed.
    ///
    /// Fails if one path is used both as a file and as a directory, or if
    /// the same file appears twice. Files whose mode was never set get the
    /// configured default file mode.
    pub fn from_files<I, S>(files: I) -> VfsResult<Self>
    where
        I: IntoIterator<Item = (S, File)>,
        S: AsRef<str>,
    {
        Self::from_files_with_config(files, VfsConfig::default())
    }

    pub fn from_files_with_config<I, S>(files: I, config: VfsConfig) -> VfsResult<Self>
    where
        I: IntoIterator<Item = (S, File)>,
        S: AsRef<str>,
    {
        let fs = Self::with_config(config);
        {
            let mut tree = fs.tree.write();
            for (p, mut file) in files {
                let p = path::clean(p.as_ref())?;
                if !file.mode.is_regular() {
                    return Err(VfsError::unsupported(format!(
                        "{p}: memory filesystem does not support special files"
                    )));
                }
                let (parent, base) = path::split(&p);
                if base.is_empty() {
                    return Err(VfsError::invalid_name(p));
                }
                if file.mode == FileMode::default() {
                    file.mode = fs.config.file_mode();
                } else {
                    file.mode = FileMode::file(file.mode.perm());
                }
                file.id = tree.allocate_id();
                let dir = ensure_dirs(&mut tree, parent, fs.config.dir_mode())?;
                if let Some(existing) = dir.get(base) {
                    return Err(match existing.node {
                        Node::Dir(_) => VfsError::already_exists(format!(
                            "{p} is both a file and a directory"
                        )),
                        Node::File(_) => VfsError::already_exists(p),
                    });
                }
                dir.add(Entry::file(base, file))?;
            }
        }
        Ok(fs)
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    fn commit_target(&self, path: String, id: u64) -> CommitTarget {
        CommitTarget {
            tree: Arc::clone(&self.tree),
            config: Arc::clone(&self.config),
            path,
            id,
        }
    }
}

/// Walk `dir_path` from the root, creating missing directories.
fn ensure_dirs<'t>(tree: &'t mut Tree, dir_path: &str, mode: FileMode) -> VfsResult<&'t mut Dir> {
    let mut dir = tree.dir_entry_mut("/")?;
    for seg in path::components(dir_path) {
        if dir.get(seg).is_none() {
            dir.add(Entry::dir(seg, Dir::new(mode)))?;
        }
        dir = match dir.get_mut(seg).map(|e| &mut e.node) {
            Some(Node::Dir(child)) => child,
            _ => {
                return Err(VfsError::not_a_directory(format!(
                    "{dir_path} is both a file and a directory"
                )));
            }
        };
    }
    Ok(dir)
}

impl fmt::Display for MemoryFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Memory")
    }
}

impl Vfs for MemoryFs {
    fn stat(&self, path: &str) -> VfsResult<FileInfo> {
        let p = path::clean(path)?;
        let tree = self.tree.read();
        Ok(tree.lookup(&p)?.info())
    }

    fn open(&self, path: &str) -> VfsResult<Box<dyn ReadHandle>> {
        let p = path::clean(path)?;
        let tree = self.tree.read();
        match &tree.lookup(&p)?.node {
            Node::Dir(_) => Err(VfsError::is_a_directory(p)),
            Node::File(file) => {
                let content = file.decoded()?;
                Ok(Box::new(MemoryReadHandle::new(content, file.compressed)))
            }
        }
    }

    fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: FileMode,
    ) -> VfsResult<Box<dyn WriteHandle>> {
        let p = path::clean(path)?;
        if !mode.is_regular() {
            return Err(VfsError::unsupported(format!(
                "{p}: memory filesystem does not support special files"
            )));
        }
        let (parent, base) = path::split(&p);
        if base.is_empty() {
            return Err(VfsError::invalid_name(p));
        }
        let readable = flags.readable();
        let writable = flags.writable();
        tracing::trace!(path = %p, ?flags, "memory open_file");

        if !flags.mutates() {
            let tree = self.tree.read();
            let (content, compressed, id) = match tree.dir_entry(parent)?.get(base) {
                None => return Err(VfsError::not_exist(p)),
                Some(Entry { node: Node::Dir(_), .. }) => {
                    return Err(VfsError::is_a_directory(p));
                }
                Some(Entry { node: Node::File(file), .. }) => {
                    (file.decoded()?, file.compressed, file.id)
                }
            };
            drop(tree);
            let target = self.commit_target(p, id);
            return Ok(Box::new(MemoryWriteHandle::new(
                content, compressed, readable, false, false, target,
            )));
        }

        let truncate = writable && flags.contains(OpenFlags::TRUNCATE);
        let mut tree = self.tree.write();
        let fresh_id = tree.allocate_id();
        let dir = tree.dir_entry_mut(parent)?;
        let (content, compressed, id) = match dir.get(base) {
            Some(Entry { node: Node::Dir(_), .. }) => {
                return Err(VfsError::is_a_directory(p));
            }
            Some(Entry { node: Node::File(file), .. }) => {
                if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) {
                    return Err(VfsError::already_exists(p));
                }
                let content = if truncate {
                    Vec::new()
                } else {
                    file.decoded()?
                };
                (content, file.compressed, file.id)
            }
            None => {
                if !flags.contains(OpenFlags::CREATE) {
                    return Err(VfsError::not_exist(p));
                }
                let mode = if mode == FileMode::default() {
                    self.config.file_mode()
                } else {
                    FileMode::file(mode.perm())
                };
                let mut file = File::new(Vec::new()).with_mode(mode);
                file.id = fresh_id;
                dir.add(Entry::file(base, file))?;
                (Vec::new(), false, fresh_id)
            }
        };
        drop(tree);
        let target = self.commit_target(p, id);
        Ok(Box::new(MemoryWriteHandle::new(
            content, compressed, readable, writable, truncate, target,
        )))
    }

    fn mkdir(&self, path: &str, mode: FileMode) -> VfsResult<()> {
        let p = path::clean(path)?;
        let (parent, base) = path::split(&p);
        if base.is_empty() {
            return Err(VfsError::already_exists(p));
        }
        let mut tree = self.tree.write();
        let dir = tree.dir_entry_mut(parent)?;
        if dir.get(base).is_some() {
            return Err(VfsError::already_exists(p));
        }
        let mode = if mode == FileMode::default() {
            self.config.dir_mode()
        } else {
            FileMode::dir(mode.perm())
        };
        dir.add(Entry::dir(base, Dir::new(mode)))
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        let p = path::clean(path)?;
        let (parent, base) = path::split(&p);
        if base.is_empty() {
            return Err(VfsError::invalid_path("cannot remove the root directory"));
        }
        let mut tree = self.tree.write();
        let dir = tree.dir_entry_mut(parent)?;
        match dir.get(base) {
            None => return Err(VfsError::not_exist(p)),
            Some(Entry { node: Node::Dir(d), .. }) if !d.is_empty() => {
                return Err(VfsError::directory_not_empty(p));
            }
            Some(_) => {}
        }
        dir.remove(base)?;
        Ok(())
    }

    fn read_dir(&self, path: &str) -> VfsResult<Vec<FileInfo>> {
        let p = path::clean(path)?;
        let tree = self.tree.read();
        match &tree.lookup(&p)?.node {
            Node::Dir(dir) => Ok(dir.entries().iter().map(Entry::info).collect()),
            Node::File(_) => Err(VfsError::not_a_directory(p)),
        }
    }
}
