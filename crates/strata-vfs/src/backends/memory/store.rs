//! Directory tree for the in-memory backend.
//!
//! Directories keep their children in a `Vec` sorted by name. Lookups use
//! binary search; inserts and removals shift the tail. The sort order is the
//! order `read_dir` and `walk` report.

use std::time::SystemTime;

use super::codec;
use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::types::{FileInfo, FileMode};

/// A regular file.
///
/// `data` holds the stored form, which is zlib-compressed when `compressed`
/// is set. `size` is always the logical length.
#[derive(Debug, Clone)]
pub struct File {
    /// Identity within one tree. Lets a closing handle detect that the
    /// file it was opened on has been removed or replaced.
    pub(crate) id: u64,
    pub(crate) data: Vec<u8>,
    pub(crate) size: u64,
    pub(crate) compressed: bool,
    pub(crate) mode: FileMode,
    pub(crate) mtime: SystemTime,
}

impl File {
    /// A plain file holding `data`, modified now.
    ///
    /// The mode is left unset; the filesystem it is added to fills in its
    /// default file mode.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            id: 0,
            size: data.len() as u64,
            data,
            compressed: false,
            mode: FileMode::default(),
            mtime: SystemTime::now(),
        }
    }

    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = mtime;
        self
    }

    /// Logical (uncompressed) length.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the stored form is compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// The logical content, decompressing if needed.
    pub(crate) fn decoded(&self) -> VfsResult<Vec<u8>> {
        if self.compressed {
            codec::decompress(&self.data, self.size)
        } else {
            Ok(self.data.clone())
        }
    }
}

/// A directory: children sorted by name, no duplicates.
#[derive(Debug, Clone)]
pub struct Dir {
    pub(crate) mode: FileMode,
    pub(crate) mtime: SystemTime,
    entries: Vec<Entry>,
}

impl Dir {
    pub fn new(mode: FileMode) -> Self {
        Self {
            mode,
            mtime: SystemTime::now(),
            entries: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.position(name).ok().map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        match self.position(name) {
            Ok(i) => Some(&mut self.entries[i]),
            Err(_) => None,
        }
    }

    /// Insert at the sorted position. A duplicate name leaves the directory
    /// untouched.
    pub fn add(&mut self, entry: Entry) -> VfsResult<()> {
        match self.position(&entry.name) {
            Ok(_) => Err(VfsError::already_exists(entry.name)),
            Err(i) => {
                self.entries.insert(i, entry);
                self.mtime = SystemTime::now();
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> VfsResult<Entry> {
        match self.position(name) {
            Ok(i) => {
                self.mtime = SystemTime::now();
                Ok(self.entries.remove(i))
            }
            Err(_) => Err(VfsError::not_exist(name)),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    File(File),
    Dir(Dir),
}

/// A named node.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub node: Node,
}

impl Entry {
    pub fn file(name: impl Into<String>, file: File) -> Self {
        Self {
            name: name.into(),
            node: Node::File(file),
        }
    }

    pub fn dir(name: impl Into<String>, dir: Dir) -> Self {
        Self {
            name: name.into(),
            node: Node::Dir(dir),
        }
    }

    pub fn info(&self) -> FileInfo {
        match &self.node {
            Node::File(f) => FileInfo {
                name: self.name.clone(),
                size: f.size,
                mode: f.mode,
                mtime: f.mtime,
            },
            Node::Dir(d) => FileInfo {
                name: self.name.clone(),
                size: 0,
                mode: d.mode,
                mtime: d.mtime,
            },
        }
    }
}

/// The whole tree, rooted at an entry named `/`.
#[derive(Debug)]
pub(crate) struct Tree {
    root: Entry,
    next_id: u64,
}

impl Tree {
    pub(crate) fn new(root_mode: FileMode) -> Self {
        Self {
            root: Entry::dir("/", Dir::new(root_mode)),
            next_id: 1,
        }
    }

    /// Hand out a fresh file identity.
    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Resolve a canonical path to a directory, one segment at a time.
    pub(crate) fn dir_entry(&self, p: &str) -> VfsResult<&Dir> {
        let mut dir = match &self.root.node {
            Node::Dir(d) => d,
            Node::File(_) => return Err(VfsError::not_a_directory("/")),
        };
        for seg in path::components(p) {
            match dir.get(seg).map(|e| &e.node) {
                Some(Node::Dir(child)) => dir = child,
                Some(Node::File(_)) => return Err(VfsError::not_a_directory(p)),
                None => return Err(VfsError::not_exist(p)),
            }
        }
        Ok(dir)
    }

    pub(crate) fn dir_entry_mut(&mut self, p: &str) -> VfsResult<&mut Dir> {
        let mut dir = match &mut self.root.node {
            Node::Dir(d) => d,
            Node::File(_) => return Err(VfsError::not_a_directory("/")),
        };
        for seg in path::components(p) {
            match dir.get_mut(seg).map(|e| &mut e.node) {
                Some(Node::Dir(child)) => dir = child,
                Some(Node::File(_)) => return Err(VfsError::not_a_directory(p)),
                None => return Err(VfsError::not_exist(p)),
            }
        }
        Ok(dir)
    }

    /// Look up any entry, the root included.
    pub(crate) fn lookup(&self, p: &str) -> VfsResult<&Entry> {
        let (parent, base) = path::split(p);
        if base.is_empty() {
            return Ok(&self.root);
        }
        self.dir_entry(parent)?
            .get(base)
            .ok_or_else(|| VfsError::not_exist(p))
    }

    pub(crate) fn lookup_mut(&mut self, p: &str) -> VfsResult<&mut Entry> {
        let (parent, base) = path::split(p);
        if base.is_empty() {
            return Ok(&mut self.root);
        }
        self.dir_entry_mut(parent)?
            .get_mut(base)
            .ok_or_else(|| VfsError::not_exist(p))
    }
}
