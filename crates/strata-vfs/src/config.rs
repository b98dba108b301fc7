//! Filesystem configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{VfsError, VfsResult};
use crate::hook::CloseErrorHook;
use crate::types::FileMode;

/// Highest zlib compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Settings for an in-memory filesystem.
///
/// Can be built in code or loaded from TOML:
///
/// ```toml
/// compression_level = 9
/// default_dir_mode = 0o700
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// zlib level used by compress-on-close, 0..=9.
    pub compression_level: u32,
    /// Permission bits for the root, for directories created with
    /// `FileMode::default()`, and for parents made by
    /// [`MemoryFs::from_files`](crate::MemoryFs::from_files).
    pub default_dir_mode: u32,
    /// Permission bits for files created with `FileMode::default()` and for
    /// [`File`](crate::File)s added without a mode.
    pub default_file_mode: u32,
    /// Receives errors from implicit closes of this filesystem's handles.
    /// Falls back to the process-wide hook when unset.
    #[serde(skip)]
    pub close_error_hook: Option<CloseErrorHook>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            default_dir_mode: 0o755,
            default_file_mode: 0o644,
            close_error_hook: None,
        }
    }
}

impl fmt::Debug for VfsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsConfig")
            .field("compression_level", &self.compression_level)
            .field("default_dir_mode", &format_args!("{:o}", self.default_dir_mode))
            .field("default_file_mode", &format_args!("{:o}", self.default_file_mode))
            .field("close_error_hook", &self.close_error_hook.is_some())
            .finish()
    }
}

impl VfsConfig {
    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> VfsResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| VfsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> VfsResult<()> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(VfsError::InvalidConfig(format!(
                "compression_level {} out of range 0..={}",
                self.compression_level, MAX_COMPRESSION_LEVEL
            )));
        }
        Ok(())
    }

    /// Set the compression level, clamped to 0..=9.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(MAX_COMPRESSION_LEVEL);
        self
    }

    pub fn with_default_dir_mode(mut self, perm: u32) -> Self {
        self.default_dir_mode = perm & FileMode::PERM_MASK;
        self
    }

    pub fn with_default_file_mode(mut self, perm: u32) -> Self {
        self.default_file_mode = perm & FileMode::PERM_MASK;
        self
    }

    pub fn with_close_error_hook(mut self, hook: CloseErrorHook) -> Self {
        self.close_error_hook = Some(hook);
        self
    }

    /// Directory mode built from `default_dir_mode`.
    pub fn dir_mode(&self) -> FileMode {
        FileMode::dir(self.default_dir_mode)
    }

    /// File mode built from `default_file_mode`.
    pub fn file_mode(&self) -> FileMode {
        FileMode::file(self.default_file_mode)
    }
}
