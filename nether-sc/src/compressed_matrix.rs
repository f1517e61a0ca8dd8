//! Block-compressed matrix banks
//!
//! A compressed bank is laid out as:
//!
//! ```text
//! [float matrices: 6 x f32 each]
//! [block metadata: one u32 per block]      <- metadata position
//! [short matrices: 6 x i16 each]            <- matrix data position
//! [delta records, addressed in 16-bit words from the matrix data position]
//! ```
//!
//! Each metadata word holds a base matrix index in its low 13 bits and the
//! starting word of the block's delta chain above them. A block yields 16
//! matrices; every matrix applies one variable-length delta record to the
//! running quantized components of the previous one.

use byteorder::{ByteOrder, LittleEndian};
use hashbrown::HashMap;

use crate::error::{Result, ScError};
use crate::math::{ColorTransform, Matrix2x3};
use crate::matrix_bank::MatrixBank;
use crate::stream::ByteReader;

/// Matrices produced by one block
pub const BLOCK_SIZE: usize = 16;

const BASE_BITS: u32 = 13;
const BASE_MASK: u32 = (1 << BASE_BITS) - 1;
const DELTA_MASK: u32 = (1 << (32 - BASE_BITS)) - 1;

const FLOAT_MATRIX_SIZE: usize = 6 * 4;
const SHORT_MATRIX_SIZE: usize = 6 * 2;

/// Extract `length` bits starting at `offset` as a sign-extended integer
pub(crate) fn signed_bits(value: i32, offset: u32, length: u32) -> i32 {
    value.wrapping_shl(32 - offset - length) >> (32 - length)
}

/// Extract `length` bits starting at `offset` as an unsigned integer
pub(crate) fn unsigned_bits(value: i32, offset: u32, length: u32) -> i32 {
    ((value as u32 >> offset) & ((1u32 << length) - 1)) as i32
}

/// Join two 16-bit words into the 32-bit value the bit fields straddle
fn join(high: i32, low: i32) -> i32 {
    high.wrapping_shl(16) | low
}

/// Lazily decoded view over a compressed matrix bank
#[derive(Debug)]
pub struct CompressedMatrixBank<'a> {
    data: &'a [u8],
    float_matrix_count: usize,
    short_matrix_count: usize,
    block_count: usize,
    metadata_position: usize,
    matrix_data_position: usize,
    cache: HashMap<usize, [Matrix2x3; BLOCK_SIZE]>,
}

impl<'a> CompressedMatrixBank<'a> {
    pub fn new(
        data: &'a [u8],
        float_matrix_count: usize,
        short_matrix_count: usize,
        block_count: usize,
    ) -> Self {
        let metadata_position = float_matrix_count * FLOAT_MATRIX_SIZE;
        Self {
            data,
            float_matrix_count,
            short_matrix_count,
            block_count,
            metadata_position,
            matrix_data_position: metadata_position + block_count * 4,
            cache: HashMap::new(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Matrices stored verbatim before the compressed range
    pub fn uncompressed_matrix_count(&self) -> usize {
        self.float_matrix_count + self.short_matrix_count
    }

    pub fn matrix_data_position(&self) -> usize {
        self.matrix_data_position
    }

    fn word(&self, index: usize) -> Result<i32> {
        let offset = self.matrix_data_position + index * 2;
        let bytes = self.data.get(offset..offset + 2).ok_or(ScError::UnexpectedEof {
            offset,
            needed: 2,
            available: self.data.len().saturating_sub(offset),
        })?;
        Ok(LittleEndian::read_u16(bytes) as i32)
    }

    /// Decode one block into quantized components (a-d in 1/1024, x/y in twips)
    pub fn decode_block_quantized(&self, block: usize) -> Result<[[i16; 6]; BLOCK_SIZE]> {
        if block >= self.block_count {
            return Err(ScError::MatrixIndexOutOfRange {
                index: block * BLOCK_SIZE,
                count: self.block_count * BLOCK_SIZE,
            });
        }

        let mut reader = ByteReader::new(self.data);
        reader.seek(self.metadata_position + block * 4)?;
        let metadata = reader.read_u32()?;
        let base_index = (metadata & BASE_MASK) as usize;
        let mut delta_index = ((metadata >> BASE_BITS) & DELTA_MASK) as usize;

        let base_word = base_index * SHORT_MATRIX_SIZE / 2;
        let mut a = self.word(base_word)?;
        let mut b = self.word(base_word + 1)?;
        let mut c = self.word(base_word + 2)?;
        let mut d = self.word(base_word + 3)?;
        let mut x = self.word(base_word + 4)?;
        let mut y = self.word(base_word + 5)?;

        let mut out = [[0i16; 6]; BLOCK_SIZE];
        for slot in out.iter_mut() {
            let flag = self.word(delta_index)?;
            if flag & 3 == 0 {
                x = x.wrapping_add(signed_bits(flag, 2, 7));
                y = y.wrapping_add(signed_bits(flag, 9, 7));
                delta_index += 1;
            } else {
                match flag & 0xF {
                    1 => {
                        let d1 = self.word(delta_index + 1)?;
                        x = x.wrapping_add(signed_bits(join(d1, flag), 4, 14));
                        y = y.wrapping_add(signed_bits(d1, 2, 14));
                        delta_index += 2;
                    }
                    2 => {
                        let d1 = self.word(delta_index + 1)?;
                        a = a.wrapping_add(signed_bits(flag, 4, 7));
                        d = d.wrapping_add(signed_bits(join(d1, flag), 11, 7));
                        x = x.wrapping_add(signed_bits(d1, 2, 7));
                        y = y.wrapping_add(signed_bits(d1, 9, 7));
                        delta_index += 2;
                    }
                    3 => {
                        let d1 = self.word(delta_index + 1)?;
                        let d2 = self.word(delta_index + 2)?;
                        a = a.wrapping_add(signed_bits(flag, 4, 11));
                        d = d.wrapping_add(signed_bits(join(d1, flag), 15, 11));
                        x = x.wrapping_add(signed_bits(join(d2, d1), 10, 11));
                        y = y.wrapping_add(signed_bits(d2, 5, 11));
                        delta_index += 3;
                    }
                    5 => {
                        let d1 = self.word(delta_index + 1)?;
                        let d2 = self.word(delta_index + 2)?;
                        a = a.wrapping_add(signed_bits(flag, 4, 7));
                        b = b.wrapping_add(signed_bits(join(d1, flag), 11, 7));
                        c = c.wrapping_add(signed_bits(d1, 2, 7));
                        d = d.wrapping_add(signed_bits(d1, 9, 7));
                        x = x.wrapping_add(signed_bits(d2, 0, 8));
                        y = y.wrapping_add(signed_bits(d2, 8, 8));
                        delta_index += 3;
                    }
                    6 => {
                        let d1 = self.word(delta_index + 1)?;
                        let d2 = self.word(delta_index + 2)?;
                        let d3 = self.word(delta_index + 3)?;
                        a = a.wrapping_add(signed_bits(flag, 4, 10));
                        b = b.wrapping_add(signed_bits(join(d1, flag), 14, 10));
                        c = c.wrapping_add(signed_bits(join(d2, d1), 8, 10));
                        d = d.wrapping_add(signed_bits(d2, 2, 10));
                        x = x.wrapping_add(signed_bits(join(d3, d2), 12, 10));
                        y = y.wrapping_add(signed_bits(d3, 6, 10));
                        delta_index += 4;
                    }
                    7 => {
                        let d1 = self.word(delta_index + 1)?;
                        let d2 = self.word(delta_index + 2)?;
                        let d3 = self.word(delta_index + 3)?;
                        let d4 = self.word(delta_index + 4)?;
                        a = a.wrapping_add(signed_bits(flag, 4, 12));
                        b = b.wrapping_add(signed_bits(join(d2, d1), 0, 12));
                        c = c.wrapping_add(signed_bits(join(d2, d1), 12, 12));
                        d = d.wrapping_add(signed_bits(join(d3, d2), 8, 12));
                        x = x.wrapping_add(signed_bits(join(d4, d3), 4, 14));
                        y = y.wrapping_add(signed_bits(d4, 2, 14));
                        delta_index += 5;
                    }
                    0xF => {
                        a = a.wrapping_add(self.word(delta_index + 1)?);
                        b = b.wrapping_add(self.word(delta_index + 2)?);
                        c = c.wrapping_add(self.word(delta_index + 3)?);
                        d = d.wrapping_add(self.word(delta_index + 4)?);
                        x = x.wrapping_add(self.word(delta_index + 5)?);
                        y = y.wrapping_add(self.word(delta_index + 6)?);
                        delta_index += 7;
                    }
                    _ => {
                        return Err(ScError::InvalidDeltaFlag {
                            block,
                            flag: flag as u16,
                        });
                    }
                }
            }

            *slot = [a as i16, b as i16, c as i16, d as i16, x as i16, y as i16];
        }

        Ok(out)
    }

    /// Decode one block, reusing earlier results
    pub fn decode_block(&mut self, block: usize) -> Result<[Matrix2x3; BLOCK_SIZE]> {
        if let Some(matrices) = self.cache.get(&block) {
            return Ok(*matrices);
        }
        let quantized = self.decode_block_quantized(block)?;
        let matrices = quantized.map(Matrix2x3::from_quantized);
        self.cache.insert(block, matrices);
        tracing::trace!(block, "decoded matrix block");
        Ok(matrices)
    }

    /// Matrix at a bank-wide index inside the compressed range
    pub fn matrix(&mut self, index: usize) -> Result<Matrix2x3> {
        let count = self.block_count * BLOCK_SIZE;
        if index < self.uncompressed_matrix_count() || index >= count {
            return Err(ScError::MatrixIndexOutOfRange { index, count });
        }
        let block = self.decode_block(index / BLOCK_SIZE)?;
        Ok(block[index % BLOCK_SIZE])
    }
}

/// Sizes of one externally stored matrix bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalBankLayout {
    pub float_matrix_count: usize,
    pub short_matrix_count: usize,
    pub block_count: usize,
    pub color_transform_count: usize,
}

impl ExternalBankLayout {
    /// Matrices the assembled bank holds
    pub fn total_matrix_count(&self) -> usize {
        (self.float_matrix_count + self.short_matrix_count).max(self.block_count * BLOCK_SIZE)
    }
}

/// Assemble a full bank from decompressed external bank data
///
/// Float matrices fill the first slots, compressed blocks cover the indices
/// from the end of the verbatim matrices up to `block_count * 16`, short
/// matrices fill the slots after the float matrices, and color transforms
/// (multipliers first) follow the short matrices.
pub fn decode_external_bank(data: &[u8], layout: &ExternalBankLayout) -> Result<MatrixBank> {
    let mut bank = MatrixBank::new(layout.total_matrix_count(), layout.color_transform_count)?;
    let mut reader = ByteReader::new(data);

    for index in 0..layout.float_matrix_count {
        let matrix = Matrix2x3::new(
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
        );
        bank.set_matrix(index, matrix)?;
    }

    let mut compressed = CompressedMatrixBank::new(
        data,
        layout.float_matrix_count,
        layout.short_matrix_count,
        layout.block_count,
    );
    let uncompressed = compressed.uncompressed_matrix_count();
    for index in uncompressed..layout.block_count * BLOCK_SIZE {
        let matrix = compressed.matrix(index)?;
        bank.set_matrix(index, matrix)?;
    }

    reader.seek(compressed.matrix_data_position())?;
    for index in layout.float_matrix_count..uncompressed {
        let values = reader.read_i16_array(6)?;
        let quantized = [
            values[0], values[1], values[2], values[3], values[4], values[5],
        ];
        bank.set_matrix(index, Matrix2x3::from_quantized(quantized))?;
    }

    for index in 0..layout.color_transform_count {
        let bytes = reader.read_bytes(7)?;
        let transform = ColorTransform::from_multipliers(
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
        );
        bank.set_color_transform(index, transform)?;
    }

    tracing::debug!(
        matrices = bank.matrix_count(),
        color_transforms = bank.color_transform_count(),
        blocks = layout.block_count,
        "decoded external matrix bank"
    );
    Ok(bank)
}
