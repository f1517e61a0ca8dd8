//! Tag-stream encoding

use super::HEADER_RESERVED_BYTES;
use crate::config::{default_highres_suffix, default_lowres_suffix};
use crate::container::Contents;
use crate::error::{Result, ScError};
use crate::matrix_bank::MatrixBank;
use crate::stream::ByteWriter;
use crate::tag::Tag;
use crate::texture::Texture;

/// Encode a main file payload
///
/// With `external_textures` set, texture records carry only their headers and
/// the USE_EXTERNAL_TEXTURE flag is emitted; the pixels then belong in a
/// sidecar written by [`encode_texture_file`].
///
/// USE_UNCOMMON_RESOLUTION is never written: the sidecar always goes to the
/// default `_tex.sc` name, and the flag would send a reload to the suffixed
/// variants instead.
pub fn encode_main(contents: &Contents, external_textures: bool) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    write_header(&mut writer, contents)?;

    // File flags
    let flags = &contents.flags;
    if flags.half_scale_possible {
        writer.write_empty_block(Tag::HalfScalePossible);
    }
    if external_textures {
        writer.write_empty_block(Tag::UseExternalTexture);
    }
    if flags.highres_suffix != default_highres_suffix()
        || flags.lowres_suffix != default_lowres_suffix()
    {
        writer.write_block(Tag::ExternalFilesSuffixes, |w| {
            w.write_ascii(Some(&flags.highres_suffix))?;
            w.write_ascii(Some(&flags.lowres_suffix))
        })?;
    }

    for texture in &contents.textures {
        writer.write_block(texture.tag(), |w| texture.write(w, !external_textures))?;
    }
    for shape in &contents.shapes {
        writer.write_block(shape.tag(), |w| shape.write(w))?;
    }
    for (index, bank) in contents.matrix_banks.iter().enumerate() {
        if index != 0 {
            writer.write_block(Tag::ExtraMatrixBank, |w| {
                w.write_u16(count_u16(bank.matrix_count(), "matrices")?);
                w.write_u16(count_u16(bank.color_transform_count(), "color transforms")?);
                Ok(())
            })?;
        }
        write_bank(&mut writer, bank)?;
    }
    for text_field in &contents.text_fields {
        writer.write_block(text_field.tag(), |w| text_field.write(w))?;
    }
    for movie_clip in &contents.movie_clips {
        writer.write_block(movie_clip.tag(), |w| movie_clip.write(w))?;
    }
    if !contents.modifiers.is_empty() {
        let count = count_u16(contents.modifiers.len(), "movie clip modifiers")?;
        writer.write_block(Tag::MovieClipModifiers, |w| {
            w.write_u16(count);
            Ok(())
        })?;
        for modifier in &contents.modifiers {
            writer.write_block(modifier.tag(), |w| {
                modifier.write(w);
                Ok(())
            })?;
        }
    }

    writer.write_empty_block(Tag::Eof);
    Ok(writer.into_bytes())
}

/// Encode a texture sidecar: every texture with its payload, then EOF
pub fn encode_texture_file(textures: &[Texture]) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    for texture in textures {
        writer.write_block(texture.tag(), |w| texture.write(w, true))?;
    }
    writer.write_empty_block(Tag::Eof);
    Ok(writer.into_bytes())
}

fn write_header(writer: &mut ByteWriter, contents: &Contents) -> Result<()> {
    let (matrix_count, color_transform_count) = contents
        .matrix_banks
        .first()
        .map_or((0, 0), |bank| {
            (bank.matrix_count(), bank.color_transform_count())
        });

    writer.write_u16(count_u16(contents.shapes.len(), "shapes")?);
    writer.write_u16(count_u16(contents.movie_clips.len(), "movie clips")?);
    writer.write_u16(count_u16(contents.textures.len(), "textures")?);
    writer.write_u16(count_u16(contents.text_fields.len(), "text fields")?);
    writer.write_u16(count_u16(matrix_count, "matrices")?);
    writer.write_u16(count_u16(color_transform_count, "color transforms")?);
    writer.write_bytes(&[0; HEADER_RESERVED_BYTES]);

    writer.write_u16(count_u16(contents.exports.len(), "exports")?);
    for export in &contents.exports {
        writer.write_u16(export.id);
    }
    for export in &contents.exports {
        writer.write_ascii(Some(&export.name))?;
    }
    Ok(())
}

fn write_bank(writer: &mut ByteWriter, bank: &MatrixBank) -> Result<()> {
    for matrix in bank.matrices() {
        writer.write_block(matrix.tag(), |w| {
            matrix.write(w);
            Ok(())
        })?;
    }
    for transform in bank.color_transforms() {
        writer.write_block(Tag::ColorTransform, |w| {
            transform.write(w);
            Ok(())
        })?;
    }
    Ok(())
}

fn count_u16(count: usize, kind: &'static str) -> Result<u16> {
    u16::try_from(count).map_err(|_| ScError::TooManyObjects { kind })
}
