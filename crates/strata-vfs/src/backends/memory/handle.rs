//! File handles for the in-memory backend.
//!
//! A handle works on its own decoded copy of the payload. Writable handles
//! publish that copy back into the tree only when closed, so other readers
//! never observe a partial write.

use parking_lot::RwLock;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use super::codec::{self, Encoded};
use super::store::{Node, Tree};
use crate::backends::clamp_seek;
use crate::config::VfsConfig;
use crate::error::{VfsError, VfsResult};
use crate::hook;
use crate::ops::{Compressor, ReadHandle, WriteHandle};

/// Working buffer plus offset. The offset never exceeds the buffer length.
#[derive(Debug, Default)]
struct Cursor {
    buf: Vec<u8>,
    offset: u64,
}

impl Cursor {
    fn new(buf: Vec<u8>) -> Self {
        Self { buf, offset: 0 }
    }

    fn read(&mut self, out: &mut [u8]) -> usize {
        let start = self.offset as usize;
        let n = out.len().min(self.buf.len() - start);
        out[..n].copy_from_slice(&self.buf[start..start + n]);
        self.offset += n as u64;
        n
    }

    fn seek(&mut self, pos: SeekFrom) -> u64 {
        self.offset = clamp_seek(self.offset, self.buf.len() as u64, pos);
        self.offset
    }

    /// Overwrite in place, then append whatever runs past the end.
    fn write(&mut self, data: &[u8]) -> usize {
        let start = self.offset as usize;
        let overlap = data.len().min(self.buf.len() - start);
        self.buf[start..start + overlap].copy_from_slice(&data[..overlap]);
        self.buf.extend_from_slice(&data[overlap..]);
        self.offset += data.len() as u64;
        data.len()
    }
}

/// Read-only handle returned by `open`.
#[derive(Debug)]
pub struct MemoryReadHandle {
    cursor: Cursor,
    compressed: bool,
    closed: bool,
}

impl MemoryReadHandle {
    pub(crate) fn new(content: Vec<u8>, compressed: bool) -> Self {
        Self {
            cursor: Cursor::new(content),
            compressed,
            closed: false,
        }
    }

    fn check_open(&self) -> VfsResult<()> {
        if self.closed {
            Err(VfsError::UseAfterClose)
        } else {
            Ok(())
        }
    }
}

impl ReadHandle for MemoryReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_open()?;
        Ok(self.cursor.read(buf))
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.check_open()?;
        Ok(self.cursor.seek(pos))
    }

    fn close(&mut self) -> VfsResult<()> {
        self.check_open()?;
        self.closed = true;
        self.cursor = Cursor::default();
        Ok(())
    }

    fn as_compressor(&mut self) -> Option<&mut dyn Compressor> {
        Some(self)
    }
}

impl Compressor for MemoryReadHandle {
    fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Read handles never write back, so the request is ignored.
    fn set_compressed(&mut self, _compressed: bool) {}
}

/// Where a writable handle publishes its content.
pub(crate) struct CommitTarget {
    pub(crate) tree: Arc<RwLock<Tree>>,
    pub(crate) config: Arc<VfsConfig>,
    pub(crate) path: String,
    pub(crate) id: u64,
}

/// Handle returned by `open_file`.
pub struct MemoryWriteHandle {
    cursor: Cursor,
    readable: bool,
    writable: bool,
    stored_compressed: bool,
    compress_on_close: bool,
    /// Set by any `set_compressed` call, so asking for the plain form also
    /// rewrites a compressed file.
    compression_requested: bool,
    dirty: bool,
    closed: bool,
    target: CommitTarget,
}

impl std::fmt::Debug for MemoryWriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWriteHandle")
            .field("path", &self.target.path)
            .field("len", &self.cursor.buf.len())
            .field("offset", &self.cursor.offset)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .field("closed", &self.closed)
            .finish()
    }
}

impl MemoryWriteHandle {
    /// `dirty` marks content that differs from the stored file from the
    /// start, as after a truncating open.
    pub(crate) fn new(
        content: Vec<u8>,
        stored_compressed: bool,
        readable: bool,
        writable: bool,
        dirty: bool,
        target: CommitTarget,
    ) -> Self {
        Self {
            cursor: Cursor::new(content),
            readable,
            writable,
            stored_compressed,
            compress_on_close: false,
            compression_requested: false,
            dirty,
            closed: false,
            target,
        }
    }

    fn check_open(&self) -> VfsResult<()> {
        if self.closed {
            Err(VfsError::UseAfterClose)
        } else {
            Ok(())
        }
    }

    /// Publish the working buffer into the tree.
    fn commit(&mut self) -> VfsResult<()> {
        let content = std::mem::take(&mut self.cursor.buf);
        let size = content.len() as u64;

        // Encode before taking the lock; only the swap happens under it.
        let encoded = if self.compress_on_close {
            codec::compress(&content, self.target.config.compression_level)?
        } else {
            Encoded::Plain
        };
        let (data, compressed) = match encoded {
            Encoded::Compressed(out) => (out, true),
            Encoded::Plain => (content, false),
        };
        tracing::debug!(
            path = %self.target.path,
            size,
            stored = data.len(),
            compressed,
            "committing file"
        );

        let mut tree = self.target.tree.write();
        let entry = tree
            .lookup_mut(&self.target.path)
            .map_err(|_| VfsError::not_exist(self.target.path.as_str()))?;
        match &mut entry.node {
            Node::File(file) if file.id == self.target.id => {
                file.data = data;
                file.size = size;
                file.compressed = compressed;
                if self.dirty {
                    file.mtime = SystemTime::now();
                }
                self.stored_compressed = compressed;
                Ok(())
            }
            // Removed or replaced while this handle was open.
            _ => Err(VfsError::not_exist(self.target.path.as_str())),
        }
    }
}

impl ReadHandle for MemoryWriteHandle {
    fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.check_open()?;
        if !self.readable {
            return Err(VfsError::bad_descriptor(format!(
                "{} not opened for reading",
                self.target.path
            )));
        }
        Ok(self.cursor.read(buf))
    }

    fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.check_open()?;
        Ok(self.cursor.seek(pos))
    }

    fn close(&mut self) -> VfsResult<()> {
        self.check_open()?;
        self.closed = true;
        if self.writable && (self.dirty || self.compression_requested) {
            self.commit()
        } else {
            self.cursor = Cursor::default();
            Ok(())
        }
    }

    fn as_compressor(&mut self) -> Option<&mut dyn Compressor> {
        Some(self)
    }
}

impl WriteHandle for MemoryWriteHandle {
    fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
        self.check_open()?;
        if !self.writable {
            return Err(VfsError::bad_descriptor(format!(
                "{} not opened for writing",
                self.target.path
            )));
        }
        self.dirty = true;
        Ok(self.cursor.write(buf))
    }
}

impl Compressor for MemoryWriteHandle {
    fn is_compressed(&self) -> bool {
        self.stored_compressed
    }

    fn set_compressed(&mut self, compressed: bool) {
        self.compress_on_close = compressed;
        self.compression_requested = true;
    }
}

impl Drop for MemoryWriteHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close() {
            hook::report_close_error(self.target.config.close_error_hook.as_ref(), &err);
        }
    }
}
