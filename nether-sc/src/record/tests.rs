//! Tag-stream engine tests

use super::*;
use crate::config::LoadOptions;
use crate::container::{ContainerFlags, Contents, Export};
use crate::error::ScError;
use crate::math::{ColorTransform, Matrix2x3, ShortRect};
use crate::matrix_bank::MatrixBank;
use crate::movie_clip::{
    FrameElement, ModifierKind, MovieClip, MovieClipChild, MovieClipFrame, MovieClipModifier,
};
use crate::shape::{DrawCommand, Shape, ShapePoint};
use crate::stream::ByteWriter;
use crate::tag::Tag;
use crate::text_field::TextField;
use crate::texture::{PixelBuffer, Texture, TextureData, TextureType};

// =============================================================================
// Fixtures
// =============================================================================

fn triangle(id: u16) -> Shape {
    let points = vec![
        ShapePoint::new(0.0, 0.0, 0, 0),
        ShapePoint::new(10.0, 0.0, 0xFFFF, 0),
        ShapePoint::new(0.0, -5.5, 0, 0xFFFF),
    ];
    Shape::new(id, vec![DrawCommand::new(0, points).unwrap()])
}

fn tiny_texture() -> Texture {
    let mut texture = Texture::builder(TextureType::Rgba8, 2, 2)
        .pixels(PixelBuffer::U32(vec![
            0xFF00_00FF,
            0xFF00_FF00,
            0xFFFF_0000,
            0xFFFF_FFFF,
        ]))
        .build()
        .unwrap();
    texture.set_index(0);
    texture
}

fn bank() -> MatrixBank {
    let mut bank = MatrixBank::new(2, 1).unwrap();
    bank.set_matrix(0, Matrix2x3::IDENTITY).unwrap();
    bank.set_matrix(1, Matrix2x3::new(0.5, 0.0, 0.0, 2.0, 10.0, -5.5))
        .unwrap();
    bank.set_color_transform(0, ColorTransform::from_multipliers(255, 128, 0, 200, 1, 2, 3))
        .unwrap();
    bank
}

fn sample_contents() -> Contents {
    let mut contents = Contents::default();
    contents.exports.push(Export::new(2, "hero"));
    contents.textures.push(tiny_texture());
    contents.shapes.push(triangle(1));
    contents.matrix_banks.push(bank());

    let text_field = TextField::builder(3)
        .font_name("Arial")
        .bounds(ShortRect::new(-10, -5, 10, 5))
        .color(0xFFFF_FFFF)
        .default_text("hi")
        .build()
        .unwrap();
    contents.register_font_name(text_field.font_name.as_deref());
    contents.text_fields.push(text_field);

    let movie_clip = MovieClip::builder(2)
        .fps(30)
        .child(MovieClipChild::new(1, 0, Some("body".to_string())))
        .child(MovieClipChild::new(3, 0, None))
        .frame(MovieClipFrame::new(
            Some("start".to_string()),
            vec![
                FrameElement::new(0, 1, 0),
                FrameElement::new(1, FrameElement::NONE, FrameElement::NONE),
            ],
        ))
        .frame(MovieClipFrame::new(
            None,
            vec![FrameElement::new(0, 0, FrameElement::NONE)],
        ))
        .build()
        .unwrap();
    contents.movie_clips.push(movie_clip);

    contents
        .modifiers
        .push(MovieClipModifier::new(10, ModifierKind::Mask));
    contents
        .modifiers
        .push(MovieClipModifier::new(11, ModifierKind::Masked));

    contents.flags.half_scale_possible = true;
    contents
}

/// Header with the given object counts and no exports
fn header(counts: [u16; 6]) -> ByteWriter {
    let mut writer = ByteWriter::new();
    for count in counts {
        writer.write_u16(count);
    }
    writer.write_bytes(&[0; HEADER_RESERVED_BYTES]);
    writer.write_u16(0);
    writer
}

fn raw_record(writer: &mut ByteWriter, tag: u8, payload: &[u8]) {
    writer.write_u8(tag);
    writer.write_u32(payload.len() as u32);
    writer.write_bytes(payload);
}

fn finish(mut writer: ByteWriter) -> Vec<u8> {
    writer.write_empty_block(Tag::Eof);
    writer.into_bytes()
}

fn strict() -> LoadOptions {
    LoadOptions {
        strict: true,
        ..LoadOptions::default()
    }
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_decode_empty_main_file() {
    let bytes = finish(header([0; 6]));
    let contents = decode_main(&bytes, &LoadOptions::default()).unwrap();

    assert!(contents.shapes.is_empty());
    assert!(contents.exports.is_empty());
    assert_eq!(contents.matrix_banks.len(), 1);
    assert_eq!(contents.matrix_banks[0].matrix_count(), 0);
    assert_eq!(contents.flags, ContainerFlags::default());
}

#[test]
fn test_exports_read_ids_then_names() {
    let mut writer = ByteWriter::new();
    writer.write_bytes(&[0; 12]);
    writer.write_bytes(&[0; HEADER_RESERVED_BYTES]);
    writer.write_u16(2);
    writer.write_u16(7);
    writer.write_u16(9);
    writer.write_ascii(Some("intro")).unwrap();
    writer.write_ascii(Some("outro")).unwrap();
    let bytes = finish(writer);

    let contents = decode_main(&bytes, &LoadOptions::default()).unwrap();
    assert_eq!(
        contents.exports,
        vec![Export::new(7, "intro"), Export::new(9, "outro")]
    );
}

#[test]
fn test_absent_export_name_fails() {
    let mut writer = ByteWriter::new();
    writer.write_bytes(&[0; 12]);
    writer.write_bytes(&[0; HEADER_RESERVED_BYTES]);
    writer.write_u16(1);
    writer.write_u16(5);
    writer.write_ascii(None).unwrap();
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::MissingExportName { id: 5 }));
}

#[test]
fn test_too_many_shapes() {
    let mut writer = header([0; 6]);
    let shape = triangle(1);
    writer.write_block(shape.tag(), |w| shape.write(w)).unwrap();
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::TooManyObjects { kind: "shapes" }));
}

#[test]
fn test_missing_shape_at_eof() {
    let bytes = finish(header([1, 0, 0, 0, 0, 0]));

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ScError::IncompleteStream {
            kind: "shapes",
            loaded: 0,
            expected: 1
        }
    ));
}

#[test]
fn test_missing_color_transform_at_eof() {
    let mut writer = header([0, 0, 0, 0, 1, 1]);
    writer
        .write_block(Tag::Matrix, |w| {
            Matrix2x3::IDENTITY.write(w);
            Ok(())
        })
        .unwrap();
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ScError::IncompleteStream {
            kind: "color transforms",
            ..
        }
    ));
}

#[test]
fn test_unknown_tag_with_payload_is_skipped() {
    let mut writer = header([0; 6]);
    raw_record(&mut writer, 200, &[1, 2, 3]);
    let bytes = finish(writer);

    assert!(decode_main(&bytes, &LoadOptions::default()).is_ok());

    let err = decode_main(&bytes, &strict()).unwrap_err();
    assert!(matches!(err, ScError::UnsupportedTag { tag: 200, length: 3 }));
}

#[test]
fn test_unknown_tag_without_payload_fails() {
    let mut writer = header([0; 6]);
    raw_record(&mut writer, 200, &[]);
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::UnknownTag { tag: 200 }));
}

#[test]
fn test_timeline_indexes_are_skipped() {
    let mut writer = header([0; 6]);
    raw_record(&mut writer, Tag::TimelineIndexes as u8, &[4, 0, 0, 0, 1, 2, 3, 4]);
    let bytes = finish(writer);

    assert!(decode_main(&bytes, &LoadOptions::default()).is_ok());
    assert!(decode_main(&bytes, &strict()).is_err());
}

#[test]
fn test_record_length_mismatch() {
    let mut writer = header([0; 6]);
    // Flag records carry no payload
    raw_record(&mut writer, Tag::HalfScalePossible as u8, &[0, 0]);
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ScError::LengthMismatch {
            declared: 2,
            consumed: 0,
            ..
        }
    ));
}

#[test]
fn test_negative_record_length() {
    let mut writer = header([0; 6]);
    writer.write_u8(Tag::Shape as u8);
    writer.write_i32(-4);
    let bytes = writer.into_bytes();

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::NegativeLength { length: -4, .. }));
}

#[test]
fn test_truncated_stream() {
    let mut bytes = finish(header([0; 6]));
    bytes.truncate(bytes.len() - 2);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::UnexpectedEof { .. }));
}

#[test]
fn test_uncommon_resolution_implies_half_scale() {
    let mut writer = header([0; 6]);
    writer.write_block(Tag::ExternalFilesSuffixes, |w| {
        w.write_ascii(Some("_hd"))?;
        w.write_ascii(None)
    })
    .unwrap();
    writer.write_empty_block(Tag::UseUncommonResolution);
    let bytes = finish(writer);

    let contents = decode_main(&bytes, &LoadOptions::default()).unwrap();
    let flags = &contents.flags;
    assert!(flags.use_uncommon_resolution);
    assert!(flags.half_scale_possible);
    assert_eq!(flags.highres_suffix, "_hd");
    assert_eq!(flags.lowres_suffix, "_lowres");
}

#[test]
fn test_bank_must_be_complete_before_extra_bank() {
    let mut writer = header([0, 0, 0, 0, 1, 0]);
    writer
        .write_block(Tag::ExtraMatrixBank, |w| {
            w.write_u16(0);
            w.write_u16(0);
            Ok(())
        })
        .unwrap();
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ScError::IncompleteStream {
            kind: "matrices",
            loaded: 0,
            expected: 1
        }
    ));
}

#[test]
fn test_modifier_states_need_a_count() {
    let mut writer = header([0; 6]);
    let modifier = MovieClipModifier::new(4, ModifierKind::Unmasked);
    writer
        .write_block(modifier.tag(), |w| {
            modifier.write(w);
            Ok(())
        })
        .unwrap();
    let bytes = finish(writer);

    let err = decode_main(&bytes, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ScError::TooManyObjects {
            kind: "movie clip modifiers"
        }
    ));
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_main_file_round_trip() {
    let contents = sample_contents();
    let bytes = encode_main(&contents, false).unwrap();
    let decoded = decode_main(&bytes, &LoadOptions::default()).unwrap();

    assert_eq!(decoded, contents);
}

#[test]
fn test_re_encode_is_stable() {
    let contents = sample_contents();
    let first = encode_main(&contents, false).unwrap();
    let decoded = decode_main(&first, &LoadOptions::default()).unwrap();
    let second = encode_main(&decoded, false).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_extra_matrix_banks_round_trip() {
    let mut contents = sample_contents();
    let mut second = MatrixBank::new(1, 2).unwrap();
    second
        .set_matrix(0, Matrix2x3::new(1.0, 0.0, 0.0, 1.0, 3.0, 4.0))
        .unwrap();
    contents.matrix_banks.push(second);
    contents.matrix_banks.push(MatrixBank::default());

    let bytes = encode_main(&contents, false).unwrap();
    let decoded = decode_main(&bytes, &LoadOptions::default()).unwrap();

    assert_eq!(decoded.matrix_banks.len(), 3);
    assert_eq!(decoded.matrix_banks, contents.matrix_banks);
}

#[test]
fn test_non_default_suffixes_round_trip() {
    let mut contents = Contents::default();
    contents.matrix_banks.push(MatrixBank::default());
    contents.flags = ContainerFlags {
        half_scale_possible: true,
        use_external_texture: false,
        use_uncommon_resolution: false,
        highres_suffix: "_4k".to_string(),
        lowres_suffix: "_sd".to_string(),
    };

    let bytes = encode_main(&contents, false).unwrap();
    let decoded = decode_main(&bytes, &LoadOptions::default()).unwrap();
    assert_eq!(decoded.flags, contents.flags);
}

#[test]
fn test_uncommon_resolution_is_not_encoded() {
    let mut contents = Contents::default();
    contents.matrix_banks.push(MatrixBank::default());
    contents.flags.use_uncommon_resolution = true;
    contents.flags.half_scale_possible = true;

    let bytes = encode_main(&contents, true).unwrap();
    let decoded = decode_main(&bytes, &LoadOptions::default()).unwrap();
    assert!(!decoded.flags.use_uncommon_resolution);
    assert!(decoded.flags.half_scale_possible);
    assert!(decoded.flags.use_external_texture);
    assert!(!bytes.contains(&(Tag::UseUncommonResolution as u8)));
}

#[test]
fn test_external_textures_split_into_sidecar() {
    let contents = sample_contents();
    let main = encode_main(&contents, true).unwrap();
    let decoded = decode_main(&main, &LoadOptions::default()).unwrap();

    assert!(decoded.flags.use_external_texture);
    assert_eq!(decoded.textures.len(), 1);
    assert!(!decoded.textures[0].has_pixel_data());
    assert_eq!(
        decoded.textures[0].data(),
        &TextureData::Header { ktx_length: 0 }
    );

    let sidecar = encode_texture_file(&contents.textures).unwrap();
    let textures = decode_texture_file(&sidecar, 1, &LoadOptions::default()).unwrap();
    assert_eq!(textures, contents.textures);

    // Header-only textures cannot fill a sidecar
    assert!(encode_texture_file(&decoded.textures).is_err());
}

#[test]
fn test_texture_file_count_must_match() {
    let sidecar = encode_texture_file(&[tiny_texture()]).unwrap();

    let err = decode_texture_file(&sidecar, 0, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::TooManyObjects { kind: "textures" }));

    let err = decode_texture_file(&sidecar, 2, &LoadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        ScError::IncompleteStream {
            kind: "textures",
            loaded: 1,
            expected: 2
        }
    ));
}

#[test]
fn test_encode_order() {
    let contents = sample_contents();
    let bytes = encode_main(&contents, false).unwrap();

    // Walk the top-level records after the header
    let mut reader = crate::stream::ByteReader::new(&bytes);
    reader.skip(12 + HEADER_RESERVED_BYTES).unwrap();
    let export_count = reader.read_u16().unwrap() as usize;
    reader.read_u16_array(export_count).unwrap();
    for _ in 0..export_count {
        reader.read_ascii().unwrap();
    }

    let mut tags = Vec::new();
    loop {
        let (tag, length) = reader.read_record_header().unwrap();
        reader.skip(length).unwrap();
        tags.push(Tag::from_u8(tag).unwrap());
        if tag == Tag::Eof as u8 {
            break;
        }
    }

    assert_eq!(
        tags,
        vec![
            Tag::HalfScalePossible,
            Tag::Texture,
            Tag::Shape2,
            Tag::Matrix,
            Tag::Matrix,
            Tag::ColorTransform,
            contents.text_fields[0].tag(),
            Tag::MovieClip2,
            Tag::MovieClipModifiers,
            Tag::ModifierState2,
            Tag::ModifierState3,
            Tag::Eof,
        ]
    );
}
