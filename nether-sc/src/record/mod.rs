//! Legacy tag-stream engine
//!
//! This module reads and writes the sequential record format:
//!
//! - `read` - Decoding main files and texture sidecars
//! - `write` - Emitting records in the order the runtime expects
//! - `tests` - Engine-level scenarios
//!
//! A main file starts with an object header (per-kind counts and the export
//! list) followed by `[tag u8][length i32][payload]` records up to an EOF
//! record. Texture sidecars hold texture records only.

mod read;
mod write;

#[cfg(test)]
mod tests;

pub use read::{decode_main, decode_texture_file};
pub use write::{encode_main, encode_texture_file};

use crate::error::{Result, ScError};

/// Bytes of the main-file header that follow the six object counts and are never read
pub const HEADER_RESERVED_BYTES: usize = 5;

/// Pre-sized object slots filled one record at a time
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlotCursor {
    kind: &'static str,
    loaded: usize,
    capacity: usize,
}

impl SlotCursor {
    pub(crate) fn new(kind: &'static str, capacity: usize) -> Self {
        Self {
            kind,
            loaded: 0,
            capacity,
        }
    }

    /// Take the next slot index
    pub(crate) fn claim(&mut self) -> Result<usize> {
        if self.loaded >= self.capacity {
            return Err(ScError::TooManyObjects { kind: self.kind });
        }
        self.loaded += 1;
        Ok(self.loaded - 1)
    }

    pub(crate) fn loaded(&self) -> usize {
        self.loaded
    }

    /// Fail unless every declared slot was filled
    pub(crate) fn ensure_complete(&self) -> Result<()> {
        if self.loaded != self.capacity {
            return Err(ScError::IncompleteStream {
                kind: self.kind,
                loaded: self.loaded,
                expected: self.capacity,
            });
        }
        Ok(())
    }
}
