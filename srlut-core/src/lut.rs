//! # LUT Atlas
//!
//! The precomputed lookup table that drives the upscale kernel: a square
//! `289x289` atlas with 4 channels per texel, one channel per sub-pixel
//! parity case of the 2x output block.
//!
//! Layout: the atlas is a 17x17 grid of 17x17-texel tiles. An axis
//! coordinate packs two quantized levels as `major * 17 + minor`, so a
//! single 2D fetch resolves four quantization dimensions plus the parity
//! channel. Texel bytes store signed deltas re-centered around 128.
//!
//! The table is immutable for the lifetime of a filter and is uploaded to
//! the GPU exactly once per instance. The crate ships a neutral table that
//! reproduces each quantized center level exactly (a pure 2x pixel
//! replicator); externally trained tables load via [`LutTable::from_file`]
//! and must use the identical layout.

use bytes::Bytes;
use std::path::Path;
use thiserror::Error;

/// Per-axis level stride: 16 coarse quantization levels plus the carry row.
pub const TILE_SIDE: u32 = 17;

/// Side of the full atlas in texels (`TILE_SIDE` squared).
pub const ATLAS_SIDE: u32 = TILE_SIDE * TILE_SIDE;

/// Channels per atlas texel, one per parity case.
pub const ATLAS_CHANNELS: u32 = 4;

/// Exact byte length of a serialized table.
pub const TABLE_BYTES: usize = (ATLAS_SIDE * ATLAS_SIDE * ATLAS_CHANNELS) as usize;

/// Bias the table generator adds to store signed deltas as unsigned bytes.
pub const DELTA_BIAS: i32 = 128;

const BUILTIN_TABLE: &[u8] = include_bytes!("../assets/lut_x2.bin");

const _: () = assert!(BUILTIN_TABLE.len() == TABLE_BYTES);

/// Errors loading a table.
#[derive(Debug, Error)]
pub enum LutError {
    #[error("table size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("failed to read table file: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable quantized lookup atlas.
///
/// Cloning is cheap (shared backing); the bytes themselves never change
/// after construction.
#[derive(Debug, Clone)]
pub struct LutTable {
    data: Bytes,
}

impl LutTable {
    /// Wrap raw table bytes, validating the length.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self, LutError> {
        let data = data.into();
        if data.len() != TABLE_BYTES {
            return Err(LutError::SizeMismatch {
                expected: TABLE_BYTES,
                actual: data.len(),
            });
        }
        Ok(Self { data })
    }

    /// Load a trained table from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LutError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }

    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            data: Bytes::from_static(BUILTIN_TABLE),
        }
    }

    /// Read one channel of one atlas texel.
    ///
    /// `x` and `y` must be below [`ATLAS_SIDE`] and `channel` below
    /// [`ATLAS_CHANNELS`]; the kernel's addressing never leaves that range.
    #[inline]
    pub fn read_channel(&self, x: u32, y: u32, channel: u32) -> u8 {
        self.data[((y * ATLAS_SIDE + x) * ATLAS_CHANNELS + channel) as usize]
    }

    /// Full atlas bytes in row-major RGBA order, as uploaded to the GPU.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
