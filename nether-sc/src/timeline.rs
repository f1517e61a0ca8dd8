//! Delta-coded frame element streams of flat-format movie clips
//!
//! A movie clip's stream starts with `frame_count: i32, element_count: u16,
//! reserved: u16`, followed by one `data_offset: i32, start: u16, end: u16`
//! header per frame. `data_offset` is relative to the start of the movie clip
//! stream; `start`/`end` count 16-bit words from there and bound the frame's
//! metadata words. Element shorts are read from the start of the frame data.

use crate::compressed_matrix::{signed_bits, unsigned_bits};
use crate::error::{Result, ScError};
use crate::movie_clip::FrameElement;
use crate::stream::ByteReader;

/// Decoder holding the "unmodified element" run mask between metadata words
#[derive(Debug, Default)]
pub struct FrameElementDecoder {
    unmodified_mask: i32,
}

impl FrameElementDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every frame of one movie clip
    pub fn decode_movie_clip_frames(
        &mut self,
        buffer: &[u8],
        movie_clip_data_offset: usize,
    ) -> Result<Vec<Vec<FrameElement>>> {
        self.unmodified_mask = 0;

        let mut header = ByteReader::new(buffer);
        header.seek(movie_clip_data_offset)?;
        let frame_count = header.read_i32()?;
        let element_count = header.read_u16()?;
        let _reserved = header.read_u16()?;

        let frame_count = usize::try_from(frame_count).map_err(|_| {
            ScError::InvalidTable(format!("negative frame count {frame_count} in timeline"))
        })?;
        tracing::trace!(frame_count, element_count, "decoding timeline");

        let mut frames = Vec::with_capacity(frame_count.min(header.remaining() / 8));
        for _ in 0..frame_count {
            let data_offset = header.read_i32()?;
            let start = header.read_u16()? as usize;
            let end = header.read_u16()? as usize;

            let data_offset = usize::try_from(data_offset).map_err(|_| {
                ScError::InvalidTable(format!("negative frame data offset {data_offset}"))
            })?;
            let frame_data = movie_clip_data_offset + data_offset;
            frames.push(self.decode_frame(buffer, frame_data, start, end)?);
        }

        Ok(frames)
    }

    fn decode_frame(
        &mut self,
        buffer: &[u8],
        frame_data: usize,
        start: usize,
        end: usize,
    ) -> Result<Vec<FrameElement>> {
        let mut elements = ByteReader::new(buffer);
        elements.seek(frame_data)?;

        if start == 0 {
            let count = end / 3;
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(read_triple(&mut elements)?);
            }
            return Ok(out);
        }

        let mut metadata = ByteReader::new(buffer);
        metadata.seek(frame_data + start * 2)?;
        let end_position = frame_data + end * 2;

        let mut out = Vec::new();
        while metadata.position() < end_position {
            if self.unmodified_mask & 1 != 0 {
                out.push(read_triple(&mut elements)?);
                self.unmodified_mask >>= 1;
                continue;
            }
            self.unmodified_mask >>= 1;

            let meta = metadata.read_u16()? as i32;
            match meta & 7 {
                0 | 4 => {
                    out.push(read_with_deltas(&mut elements, signed_bits(meta, 2, 7), 0)?);
                    out.push(read_with_deltas(&mut elements, signed_bits(meta, 9, 7), 0)?);
                    self.unmodified_mask >>= 1;
                }
                1 => out.push(read_with_deltas(&mut elements, signed_bits(meta, 3, 13), 0)?),
                2 => out.push(read_with_deltas(
                    &mut elements,
                    signed_bits(meta, 3, 4),
                    signed_bits(meta, 7, 9),
                )?),
                3 => {
                    let child_index = elements.read_u16()?;
                    let matrix = elements.read_u16()? as i32 + metadata.read_u16()? as i32;
                    let color = elements.read_u16()? as i32 + signed_bits(meta, 3, 13);
                    out.push(FrameElement::new(child_index, matrix as u16, color as u16));
                }
                5 => {
                    out.push(read_triple(&mut elements)?);
                    self.unmodified_mask = unsigned_bits(meta, 3, 13);
                }
                6 => {
                    let skip = signed_bits(meta, 3, 13);
                    skip_elements(&mut elements, skip)?;
                }
                _ => {
                    skip_elements(&mut elements, unsigned_bits(meta, 15, 1))?;
                    let child_index = signed_bits(meta, 3, 12) as u16;
                    let matrix_index = metadata.read_u16()?;
                    let color_transform_index = metadata.read_u16()?;
                    out.push(FrameElement::new(
                        child_index,
                        matrix_index,
                        color_transform_index,
                    ));
                }
            }
        }

        while self.unmodified_mask != 0 {
            out.push(read_triple(&mut elements)?);
            self.unmodified_mask >>= 1;
        }

        Ok(out)
    }
}

fn read_triple(reader: &mut ByteReader<'_>) -> Result<FrameElement> {
    Ok(FrameElement::new(
        reader.read_u16()?,
        reader.read_u16()?,
        reader.read_u16()?,
    ))
}

/// Read a triple, adding deltas to the matrix and color transform indices
fn read_with_deltas(
    reader: &mut ByteReader<'_>,
    matrix_delta: i32,
    color_delta: i32,
) -> Result<FrameElement> {
    let child_index = reader.read_u16()?;
    let matrix_index = reader.read_u16()? as i32 + matrix_delta;
    let color_transform_index = reader.read_u16()? as i32 + color_delta;
    Ok(FrameElement::new(
        child_index,
        matrix_index as u16,
        color_transform_index as u16,
    ))
}

fn skip_elements(reader: &mut ByteReader<'_>, count: i32) -> Result<()> {
    let target = reader.position() as i64 + count as i64 * 6;
    let target = usize::try_from(target).map_err(|_| {
        ScError::InvalidTable(format!("frame element skip of {count} moves before data start"))
    })?;
    reader.seek(target)
}
