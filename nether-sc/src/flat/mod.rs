//! Flat table engine
//!
//! The flat format (version 5) stores each section as a length-prefixed
//! schema-table blob:
//!
//! ```text
//! [len u32][resources] [len u32][exports] [len u32][text fields] [len u32][shapes]
//! [len u32][movie clips] [len u32][modifiers] [len u32][texture sets]
//! ```
//!
//! The compressed sub-variant prefixes a metadata blob and wraps that whole
//! sequence in one zstd frame. External matrix banks, when present, follow the
//! frame as a bank table plus one zstd frame per bank.
//!
//! - `tables` - Typed section records and the [`TableReader`] seam
//! - `read` - Section decoding into [`Contents`](crate::container::Contents)
//! - `tests` - Engine-level scenarios

mod read;
mod tables;


pub use read::decode_flat;
pub use tables::*;

use crate::error::Result;

/// First four bytes of every zstd frame, read little-endian
pub const ZSTD_MAGIC: u32 = 0xFD2F_B528;

/// Opaque decompression of one frame starting at `offset` within `data`
pub trait Decompressor {
    fn decompress(&self, data: &[u8], offset: usize) -> Result<Vec<u8>>;
}

/// [`Decompressor`] backed by the `zstd` crate
#[cfg(feature = "zstd")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdDecompressor;

#[cfg(feature = "zstd")]
impl Decompressor for ZstdDecompressor {
    fn decompress(&self, data: &[u8], offset: usize) -> Result<Vec<u8>> {
        use std::io::Read;

        use crate::error::ScError;

        let frame = data.get(offset..).ok_or(ScError::UnexpectedEof {
            offset,
            needed: 0,
            available: data.len(),
        })?;

        // Only the first frame; more frames or other data may follow it
        let mut decoder = zstd::stream::read::Decoder::new(frame)
            .map_err(|e| ScError::Decompression(e.to_string()))?
            .single_frame();
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| ScError::Decompression(e.to_string()))?;
        Ok(decompressed)
    }
}
