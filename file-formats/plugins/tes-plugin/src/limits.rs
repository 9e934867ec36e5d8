//! Decode limits, encode options and cancellation
//!
//! Plugin files are untrusted input: a compressed record declares its own
//! inflated size and groups declare their own length. [`DecodeLimits`] bounds
//! what the decoder is willing to allocate before it trusts any of those
//! fields.

use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Resource limits applied while decoding a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum inflated size of one compressed record (default: 64MB)
    pub max_decompressed_size: u64,
    /// Maximum ratio between inflated and compressed size (default: 1032:1)
    pub max_compression_ratio: u32,
    /// Maximum nesting depth of groups (default: 16)
    pub max_group_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_decompressed_size: 64 * 1024 * 1024,
            // deflate cannot do better than ~1032:1
            max_compression_ratio: 1032,
            max_group_depth: 16,
        }
    }
}

impl DecodeLimits {
    /// Create limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum inflated record size
    pub fn max_decompressed_size(mut self, bytes: u64) -> Self {
        self.max_decompressed_size = bytes;
        self
    }

    /// Set the maximum compression ratio
    pub fn max_compression_ratio(mut self, ratio: u32) -> Self {
        self.max_compression_ratio = ratio;
        self
    }

    /// Set the maximum group nesting depth
    pub fn max_group_depth(mut self, depth: usize) -> Self {
        self.max_group_depth = depth;
        self
    }

    /// Validate a declared decompressed size against the compressed input
    ///
    /// Must run before anything is allocated from `declared`.
    pub fn check_decompression(&self, compressed: usize, declared: u64) -> Result<()> {
        if declared > self.max_decompressed_size {
            return Err(Error::resource_limit(format!(
                "declared decompressed size {declared} exceeds limit {}",
                self.max_decompressed_size
            )));
        }
        let compressed = compressed.max(1) as u64;
        if declared > compressed.saturating_mul(self.max_compression_ratio as u64) {
            return Err(Error::resource_limit(format!(
                "compression ratio {declared}:{compressed} exceeds {}:1",
                self.max_compression_ratio
            )));
        }
        Ok(())
    }

    /// Validate group nesting depth
    pub fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_group_depth {
            return Err(Error::resource_limit(format!(
                "group nesting depth {depth} exceeds limit {}",
                self.max_group_depth
            )));
        }
        Ok(())
    }
}

/// Whether records are compressed when encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CompressionPolicy {
    /// Compress exactly the records flagged compressed
    #[default]
    Preserve,
    /// Compress every record except the file header
    Always,
    /// Never compress, clearing the compressed flag
    Never,
}

/// Options for encoding a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Compression policy
    pub compression: CompressionPolicy,
    /// zlib level, 0-9 (default: 6)
    pub compression_level: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            compression: CompressionPolicy::Preserve,
            compression_level: 6,
        }
    }
}

impl EncodeOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression policy
    pub fn compression(mut self, policy: CompressionPolicy) -> Self {
        self.compression = policy;
        self
    }

    /// Set the zlib level (clamped to 9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

/// Shared flag for cancelling a running build
///
/// Checked before each plugin decode; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
