//! VFS backend implementations.

use std::io::SeekFrom;

#[cfg(unix)]
pub mod disk;
pub mod memory;

/// Resolve a seek request against a buffer of `len` bytes, clamping the
/// result to `[0, len]`.
pub(crate) fn clamp_seek(offset: u64, len: u64, pos: SeekFrom) -> u64 {
    let target: i128 = match pos {
        SeekFrom::Start(n) => i128::from(n),
        SeekFrom::Current(d) => i128::from(offset) + i128::from(d),
        SeekFrom::End(d) => i128::from(len) + i128::from(d),
    };
    // The clamp keeps the value within u64.
    target.clamp(0, i128::from(len)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_seek() {
        assert_eq!(clamp_seek(0, 10, SeekFrom::Start(u64::MAX)), 10);
        assert_eq!(clamp_seek(0, 10, SeekFrom::End(i64::MIN)), 0);
        assert_eq!(clamp_seek(4, 10, SeekFrom::Current(-2)), 2);
        assert_eq!(clamp_seek(4, 10, SeekFrom::Current(-20)), 0);
        assert_eq!(clamp_seek(4, 10, SeekFrom::End(-3)), 7);
        assert_eq!(clamp_seek(4, 10, SeekFrom::End(3)), 10);
    }
}
