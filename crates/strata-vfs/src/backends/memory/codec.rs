//! zlib encoding of stored file payloads.

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

use crate::error::{VfsError, VfsResult};

/// Outcome of trying to compress a payload.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Encoded {
    /// Compressed form, strictly smaller than the input.
    Compressed(Vec<u8>),
    /// Compression did not save space; store the plain form.
    Plain,
}

/// Compress `data`, keeping the result only if it is strictly smaller.
pub(crate) fn compress(data: &[u8], level: u32) -> VfsResult<Encoded> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).map_err(VfsError::Io)?;
    let out = encoder.finish().map_err(VfsError::Io)?;
    if out.len() < data.len() {
        Ok(Encoded::Compressed(out))
    } else {
        Ok(Encoded::Plain)
    }
}

/// Decompress a stored payload whose logical length is `size`.
pub(crate) fn decompress(data: &[u8], size: u64) -> VfsResult<Vec<u8>> {
    let mut out = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| VfsError::content_corruption(e.to_string()))?;
    if out.len() as u64 != size {
        return Err(VfsError::content_corruption(format!(
            "expected {} bytes, decoded {}",
            size,
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressible_data_shrinks() {
        let data = b"abcabcabc".repeat(100);
        match compress(&data, 6).unwrap() {
            Encoded::Compressed(out) => {
                assert!(out.len() < data.len());
                assert_eq!(decompress(&out, data.len() as u64).unwrap(), data);
            }
            Encoded::Plain => panic!("expected compression"),
        }
    }

    #[test]
    fn test_tiny_data_stays_plain() {
        assert_eq!(compress(b"x", 6).unwrap(), Encoded::Plain);
        assert_eq!(compress(b"", 9).unwrap(), Encoded::Plain);
    }

    #[test]
    fn test_garbage_is_corruption() {
        let err = decompress(b"definitely not zlib", 10).unwrap_err();
        assert!(matches!(err, VfsError::ContentCorruption(_)));
    }

    #[test]
    fn test_size_mismatch_is_corruption() {
        let data = b"hello ".repeat(20);
        let Encoded::Compressed(out) = compress(&data, 9).unwrap() else {
            panic!("expected compression");
        };
        assert!(matches!(
            decompress(&out, 3),
            Err(VfsError::ContentCorruption(_))
        ));
    }
}
