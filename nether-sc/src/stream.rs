//! Little-endian byte cursors
//!
//! [`ByteReader`] walks a borrowed slice and fails on every read past the end.
//! [`ByteWriter`] owns a growable buffer and knows how to emit self-describing
//! `[tag][length][payload]` blocks.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, ScError};
use crate::tag::Tag;

/// Length byte marking an absent string
pub const ABSENT_STRING: u8 = 0xFF;

/// Longest string that fits a length byte
pub const MAX_STRING_LEN: usize = 254;

/// Fixed-point scale of twip coordinates
pub const TWIPS_PER_UNIT: f32 = 20.0;

/// Bounds-checked reader over a byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Size of the underlying slice
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Move the cursor to an absolute offset (the end is a valid target)
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(ScError::UnexpectedEof {
                offset: pos,
                needed: 0,
                available: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(ScError::UnexpectedEof {
                offset: self.pos,
                needed: count,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    fn take_elements(&mut self, count: usize, width: usize) -> Result<&'a [u8]> {
        let bytes = count.checked_mul(width).ok_or(ScError::UnexpectedEof {
            offset: self.pos,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.take(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Booleans are a full byte; only `1` reads as true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? == 1)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Read an int32 twip value as a float
    pub fn read_twip(&mut self) -> Result<f32> {
        Ok(self.read_i32()? as f32 / TWIPS_PER_UNIT)
    }

    /// Read a length-prefixed string; length byte 255 means absent
    pub fn read_ascii(&mut self) -> Result<Option<String>> {
        let length = self.read_u8()?;
        if length == ABSENT_STRING {
            return Ok(None);
        }
        let bytes = self.take(length as usize)?;
        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>> {
        let bytes = self.take_elements(count, 2)?;
        Ok(bytes.chunks_exact(2).map(LittleEndian::read_u16).collect())
    }

    pub fn read_i16_array(&mut self, count: usize) -> Result<Vec<i16>> {
        let bytes = self.take_elements(count, 2)?;
        Ok(bytes.chunks_exact(2).map(LittleEndian::read_i16).collect())
    }

    pub fn read_u32_array(&mut self, count: usize) -> Result<Vec<u32>> {
        let bytes = self.take_elements(count, 4)?;
        Ok(bytes.chunks_exact(4).map(LittleEndian::read_u32).collect())
    }

    /// Split off the next `length` bytes as their own reader and advance past them
    pub fn window(&mut self, length: usize) -> Result<ByteReader<'a>> {
        Ok(ByteReader::new(self.take(length)?))
    }

    /// Read a `[tag u8][length i32]` record header
    pub fn read_record_header(&mut self) -> Result<(u8, usize)> {
        let tag = self.read_u8()?;
        let length = self.read_i32()?;
        let length = usize::try_from(length).map_err(|_| ScError::NegativeLength { tag, length })?;
        Ok((tag, length))
    }

    /// Fail unless a record window was read to its last byte
    pub fn expect_consumed(&self, tag: u8) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(ScError::LengthMismatch {
                tag,
                declared: self.data.len(),
                consumed: self.pos,
            });
        }
        Ok(())
    }
}

/// Growable little-endian writer
#[derive(Debug, Clone)]
pub struct ByteWriter {
    data: Vec<u8>,
    pos: usize,
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteWriter {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes written so far (high-water mark)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Move the write cursor inside the written range
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(ScError::UnexpectedEof {
                offset: pos,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn ensure_capacity(&mut self, count: usize) {
        let needed = self.pos + count;
        let capacity = self.data.capacity();
        if needed > capacity {
            let grown = capacity + capacity / 2;
            self.data.reserve_exact(grown.max(needed) - self.data.len());
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_bytes(&buf);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, value);
        self.write_bytes(&buf);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_bytes(&buf);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, value);
        self.write_bytes(&buf);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, value);
        self.write_bytes(&buf);
    }

    /// Write a float as an int32 twip value, rounded to the nearest twip
    pub fn write_twip(&mut self, value: f32) {
        self.write_i32((value * TWIPS_PER_UNIT).round() as i32);
    }

    /// Write a length-prefixed string; `None` writes the absent marker
    pub fn write_ascii(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            None => self.write_u8(ABSENT_STRING),
            Some(text) => {
                let bytes = text.as_bytes();
                if bytes.len() > MAX_STRING_LEN {
                    return Err(ScError::StringTooLong { len: bytes.len() });
                }
                self.write_u8(bytes.len() as u8);
                self.write_bytes(bytes);
            }
        }
        Ok(())
    }

    pub fn write_u16_array(&mut self, values: &[u16]) {
        self.ensure_capacity(values.len() * 2);
        for &value in values {
            self.write_u16(value);
        }
    }

    pub fn write_i16_array(&mut self, values: &[i16]) {
        self.ensure_capacity(values.len() * 2);
        for &value in values {
            self.write_i16(value);
        }
    }

    pub fn write_u32_array(&mut self, values: &[u32]) {
        self.ensure_capacity(values.len() * 4);
        for &value in values {
            self.write_u32(value);
        }
    }

    /// Write `[tag u8][length u32][payload]`, back-patching the length once
    /// `body` has written the payload
    pub fn write_block<F>(&mut self, tag: Tag, body: F) -> Result<()>
    where
        F: FnOnce(&mut ByteWriter) -> Result<()>,
    {
        self.write_u8(tag as u8);
        let length_pos = self.pos;
        self.write_u32(0);

        let start = self.pos;
        body(self)?;
        let end = self.pos;

        let length = u32::try_from(end - start)
            .map_err(|_| ScError::invalid("block", format!("{tag:?} payload exceeds 4 GiB")))?;
        self.pos = length_pos;
        self.write_u32(length);
        self.pos = end;
        Ok(())
    }

    /// Write a block with no payload (flag records, EOF)
    pub fn write_empty_block(&mut self, tag: Tag) {
        self.write_u8(tag as u8);
        self.write_u32(0);
    }
}
