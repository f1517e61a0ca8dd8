//! Tag-stream decoding

use super::{HEADER_RESERVED_BYTES, SlotCursor};
use crate::config::LoadOptions;
use crate::container::{Contents, Export};
use crate::error::{Result, ScError};
use crate::math::{ColorTransform, Matrix2x3};
use crate::matrix_bank::MatrixBank;
use crate::movie_clip::{MovieClip, MovieClipModifier};
use crate::shape::Shape;
use crate::stream::ByteReader;
use crate::tag::Tag;
use crate::text_field::TextField;
use crate::texture::Texture;

/// Decode a main file payload (already unpacked from its outer container)
///
/// Cross references are not resolved here; see
/// [`ScContainer::from_payload`](crate::container::ScContainer::from_payload).
///
/// # Errors
/// Fails on any structural problem: truncated data, a record whose payload
/// isn't consumed exactly, more records of a kind than the header declared,
/// or fewer at EOF.
pub fn decode_main(payload: &[u8], options: &LoadOptions) -> Result<Contents> {
    let mut reader = ByteReader::new(payload);

    // Read object counts
    let shape_count = reader.read_u16()? as usize;
    let movie_clip_count = reader.read_u16()? as usize;
    let texture_count = reader.read_u16()? as usize;
    let text_field_count = reader.read_u16()? as usize;
    let matrix_count = reader.read_u16()? as usize;
    let color_transform_count = reader.read_u16()? as usize;
    reader.skip(HEADER_RESERVED_BYTES)?;

    // Read exports: all ids first, then all names
    let export_count = reader.read_u16()? as usize;
    let export_ids = reader.read_u16_array(export_count)?;
    let mut exports = Vec::with_capacity(export_count);
    for id in export_ids {
        let name = reader
            .read_ascii()?
            .ok_or(ScError::MissingExportName { id })?;
        exports.push(Export::new(id, name));
    }

    let mut contents = Contents::with_suffixes(options);
    contents.exports = exports;
    contents
        .matrix_banks
        .push(MatrixBank::new(matrix_count, color_transform_count)?);

    let mut decoder = MainDecoder {
        options,
        contents,
        shapes: SlotCursor::new("shapes", shape_count),
        movie_clips: SlotCursor::new("movie clips", movie_clip_count),
        textures: SlotCursor::new("textures", texture_count),
        text_fields: SlotCursor::new("text fields", text_field_count),
        modifiers: SlotCursor::new("movie clip modifiers", 0),
        matrices: SlotCursor::new("matrices", matrix_count),
        color_transforms: SlotCursor::new("color transforms", color_transform_count),
    };
    decoder.contents.shapes.reserve(shape_count);
    decoder.contents.movie_clips.reserve(movie_clip_count);
    decoder.contents.textures.reserve(texture_count);
    decoder.contents.text_fields.reserve(text_field_count);

    decoder.run(&mut reader)?;

    let contents = decoder.contents;
    tracing::debug!(
        shapes = contents.shapes.len(),
        movie_clips = contents.movie_clips.len(),
        textures = contents.textures.len(),
        text_fields = contents.text_fields.len(),
        matrix_banks = contents.matrix_banks.len(),
        "decoded main file"
    );
    Ok(contents)
}

/// Decode a texture sidecar holding exactly `texture_count` textures
pub fn decode_texture_file(
    payload: &[u8],
    texture_count: usize,
    options: &LoadOptions,
) -> Result<Vec<Texture>> {
    let mut reader = ByteReader::new(payload);
    let mut cursor = SlotCursor::new("textures", texture_count);
    let mut textures = Vec::with_capacity(texture_count);

    loop {
        let (raw_tag, length) = reader.read_record_header()?;
        let mut body = reader.window(length)?;

        match Tag::from_u8(raw_tag) {
            Some(Tag::Eof) => {
                body.expect_consumed(raw_tag)?;
                cursor.ensure_complete()?;
                break;
            }
            Some(tag) if tag.is_texture() => {
                let index = cursor.claim()?;
                let mut texture = Texture::read(&mut body, tag, true)?;
                texture.set_index(index);
                textures.push(texture);
            }
            Some(_) => options.skip_unsupported(raw_tag, &mut body)?,
            None => options.skip_unknown(raw_tag, &mut body)?,
        }

        body.expect_consumed(raw_tag)?;
    }

    tracing::debug!(textures = textures.len(), "decoded texture file");
    Ok(textures)
}

struct MainDecoder<'o> {
    options: &'o LoadOptions,
    contents: Contents,
    shapes: SlotCursor,
    movie_clips: SlotCursor,
    textures: SlotCursor,
    text_fields: SlotCursor,
    modifiers: SlotCursor,
    matrices: SlotCursor,
    color_transforms: SlotCursor,
}

impl MainDecoder<'_> {
    fn run(&mut self, reader: &mut ByteReader<'_>) -> Result<()> {
        loop {
            let (raw_tag, length) = reader.read_record_header()?;
            let mut body = reader.window(length)?;

            let Some(tag) = Tag::from_u8(raw_tag) else {
                self.options.skip_unknown(raw_tag, &mut body)?;
                continue;
            };

            if tag == Tag::Eof {
                body.expect_consumed(raw_tag)?;
                return self.finish();
            }

            self.dispatch(tag, &mut body)?;
            body.expect_consumed(raw_tag)?;
        }
    }

    fn dispatch(&mut self, tag: Tag, body: &mut ByteReader<'_>) -> Result<()> {
        match tag {
            t if t.is_texture() => {
                let index = self.textures.claim()?;
                let has_data = !self.contents.flags.use_external_texture;
                let mut texture = Texture::read(body, t, has_data)?;
                texture.set_index(index);
                self.contents.textures.push(texture);
            }
            t if t.is_shape() => {
                self.shapes.claim()?;
                let shape = Shape::read(body, t, self.options)?;
                self.contents.shapes.push(shape);
            }
            t if t.is_movie_clip() => {
                self.movie_clips.claim()?;
                let movie_clip = MovieClip::read(body, t, self.options)?;
                self.contents.movie_clips.push(movie_clip);
            }
            t if t.is_text_field() => {
                self.text_fields.claim()?;
                let text_field = TextField::read(body, t)?;
                self.contents.register_font_name(text_field.font_name.as_deref());
                self.contents.text_fields.push(text_field);
            }
            Tag::Matrix | Tag::MatrixPrecise => {
                let index = self.matrices.claim()?;
                let matrix = Matrix2x3::read(body, tag == Tag::MatrixPrecise)?;
                self.current_bank()?.set_matrix(index, matrix)?;
            }
            Tag::ColorTransform => {
                let index = self.color_transforms.claim()?;
                let transform = ColorTransform::read(body)?;
                self.current_bank()?.set_color_transform(index, transform)?;
            }
            // No longer in use
            Tag::TimelineIndexes => self.options.skip_unsupported(tag as u8, body)?,
            Tag::HalfScalePossible => self.contents.flags.half_scale_possible = true,
            Tag::UseExternalTexture => self.contents.flags.use_external_texture = true,
            Tag::UseUncommonResolution => {
                self.contents.flags.use_uncommon_resolution = true;
                self.contents.flags.half_scale_possible = true;
            }
            Tag::ExternalFilesSuffixes => {
                let highres = body.read_ascii()?;
                let lowres = body.read_ascii()?;
                let flags = &mut self.contents.flags;
                if let Some(suffix) = highres {
                    flags.highres_suffix = suffix;
                }
                if let Some(suffix) = lowres {
                    flags.lowres_suffix = suffix;
                }
            }
            Tag::MovieClipModifiers => {
                let count = body.read_u16()? as usize;
                self.modifiers = SlotCursor::new("movie clip modifiers", count);
                self.contents.modifiers = Vec::with_capacity(count);
            }
            Tag::ModifierState2 | Tag::ModifierState3 | Tag::ModifierState4 => {
                self.modifiers.claim()?;
                let modifier = MovieClipModifier::read(body, tag)?;
                self.contents.modifiers.push(modifier);
            }
            // The previous bank must be complete before the next one starts.
            // Older readers only checked bank sizes at EOF and would accept a
            // short bank here.
            Tag::ExtraMatrixBank => {
                self.matrices.ensure_complete()?;
                self.color_transforms.ensure_complete()?;

                let matrix_count = body.read_u16()? as usize;
                let color_transform_count = body.read_u16()? as usize;
                self.contents
                    .matrix_banks
                    .push(MatrixBank::new(matrix_count, color_transform_count)?);
                self.matrices = SlotCursor::new("matrices", matrix_count);
                self.color_transforms = SlotCursor::new("color transforms", color_transform_count);
                tracing::trace!(
                    bank = self.contents.matrix_banks.len() - 1,
                    matrix_count,
                    color_transform_count,
                    "extra matrix bank"
                );
            }
            _ => self.options.skip_unsupported(tag as u8, body)?,
        }
        Ok(())
    }

    fn current_bank(&mut self) -> Result<&mut MatrixBank> {
        self.contents
            .matrix_banks
            .last_mut()
            .ok_or_else(|| ScError::invalid("matrix bank", "no bank declared"))
    }

    fn finish(&self) -> Result<()> {
        self.matrices.ensure_complete()?;
        self.color_transforms.ensure_complete()?;
        self.shapes.ensure_complete()?;
        self.movie_clips.ensure_complete()?;
        self.text_fields.ensure_complete()?;
        self.textures.ensure_complete()?;
        self.modifiers.ensure_complete()?;
        tracing::trace!(
            modifiers = self.modifiers.loaded(),
            "main file reached EOF"
        );
        Ok(())
    }
}
