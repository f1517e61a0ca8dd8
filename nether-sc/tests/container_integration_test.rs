//! Integration tests for whole-container loading and saving.
//!
//! Covers the flow:
//! 1. Build legacy files byte by byte (or through the container)
//! 2. Wrap them in a minimal outer envelope
//! 3. Load, cross-link and re-save through the public API

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use nether_sc::stream::ByteWriter;
use nether_sc::{
    Collaborators, ColorTransform, DrawCommand, ErrorKind, FLAT_FORMAT_VERSION, FrameElement,
    LEGACY_FORMAT_VERSION, LoadOptions, Matrix2x3, MovieClip, MovieClipChild, MovieClipFrame,
    PixelBuffer, Result, SaveOptions, ScContainer, ScError, ScFileCodec, Shape, ShapePoint, Tag,
    Texture, TextureType, texture_sidecar_path,
};

/// Outer envelope: version as u32 LE, then the payload verbatim
struct PlainEnvelope;

impl ScFileCodec for PlainEnvelope {
    fn unpack(&self, data: &[u8]) -> Result<(u32, Vec<u8>)> {
        if data.len() < 4 {
            return Err(ScError::UnexpectedEof {
                offset: 0,
                needed: 4,
                available: data.len(),
            });
        }
        let version = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        Ok((version, data[4..].to_vec()))
    }

    fn pack(&self, version: u32, payload: &[u8]) -> Result<Vec<u8>> {
        let mut data = version.to_le_bytes().to_vec();
        data.extend_from_slice(payload);
        Ok(data)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn triangle_shape(id: u16) -> Shape {
    let points = vec![
        ShapePoint::new(0.0, 0.0, 0, 0),
        ShapePoint::new(16.0, 0.0, 0xFFFF, 0),
        ShapePoint::new(0.0, 16.0, 0, 0xFFFF),
    ];
    Shape::new(id, vec![DrawCommand::new(0, points).unwrap()])
}

fn tiny_texture() -> Texture {
    Texture::builder(TextureType::Rgba8, 2, 2)
        .pixels(PixelBuffer::U32(vec![0xFF00_00FF; 4]))
        .build()
        .unwrap()
}

/// Minimal legacy main file: one triangle shape, one 2x2 texture, one
/// identity matrix, one default color transform, and optional exports and
/// flag records
fn minimal_legacy_file(shape_id: u16, exports: &[(u16, &str)], flags: &[Tag]) -> Vec<u8> {
    let mut writer = ByteWriter::new();

    // shapes, movie clips, textures, text fields, matrices, color transforms
    for count in [1u16, 0, 1, 0, 1, 1] {
        writer.write_u16(count);
    }
    writer.write_bytes(&[0; 5]);
    writer.write_u16(exports.len() as u16);
    for (id, _) in exports {
        writer.write_u16(*id);
    }
    for (_, name) in exports {
        writer.write_ascii(Some(name)).unwrap();
    }
    for flag in flags {
        writer.write_empty_block(*flag);
    }

    let texture = tiny_texture();
    let inline_pixels = !flags.contains(&Tag::UseExternalTexture);
    writer
        .write_block(texture.tag(), |w| texture.write(w, inline_pixels))
        .unwrap();
    let shape = triangle_shape(shape_id);
    writer.write_block(shape.tag(), |w| shape.write(w)).unwrap();
    writer
        .write_block(Tag::Matrix, |w| {
            Matrix2x3::IDENTITY.write(w);
            Ok(())
        })
        .unwrap();
    writer
        .write_block(Tag::ColorTransform, |w| {
            ColorTransform::IDENTITY.write(w);
            Ok(())
        })
        .unwrap();
    writer.write_empty_block(Tag::Eof);

    writer.into_bytes()
}

/// Container with a shape, an exported movie clip and one texture
fn sample_container() -> ScContainer {
    let mut container = ScContainer::new();
    container.add_shape(triangle_shape(1));
    container.add_texture(tiny_texture());
    container
        .matrix_bank_mut(0)
        .unwrap()
        .push_matrix(Matrix2x3::new(1.0, 0.0, 0.0, 1.0, 5.0, 5.0))
        .unwrap();

    let movie_clip = MovieClip::builder(2)
        .fps(24)
        .child(MovieClipChild::new(1, 0, None))
        .frame(MovieClipFrame::new(
            Some("idle".to_string()),
            vec![FrameElement::new(0, 0, FrameElement::NONE)],
        ))
        .build()
        .unwrap();
    container.add_movie_clip(movie_clip).unwrap();
    container.add_export(2, "hero").unwrap();
    container
}

fn write_packed(path: &Path, version: u32, payload: &[u8]) {
    fs::write(path, PlainEnvelope.pack(version, payload).unwrap()).unwrap();
}

// =============================================================================
// Cross-reference enforcement
// =============================================================================

#[test]
fn test_export_of_missing_movie_clip_fails() {
    init_tracing();
    let collaborators = Collaborators::new(&PlainEnvelope);
    let bytes = minimal_legacy_file(7, &[(42, "ghost")], &[]);

    let err = ScContainer::from_payload(
        LEGACY_FORMAT_VERSION,
        &bytes,
        &collaborators,
        &LoadOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ScError::UnresolvedExport { id: 42, .. }));
    assert_eq!(err.kind(), ErrorKind::StructuralCorruption);
    assert!(err.to_string().contains("42"));
}

#[test]
fn test_minimal_file_without_exports_loads() {
    init_tracing();
    let collaborators = Collaborators::new(&PlainEnvelope);
    let bytes = minimal_legacy_file(7, &[], &[]);

    let container = ScContainer::from_payload(
        LEGACY_FORMAT_VERSION,
        &bytes,
        &collaborators,
        &LoadOptions::default(),
    )
    .unwrap();

    assert_eq!(container.shape_ids(), vec![7]);
    assert!(container.movie_clip_ids().is_empty());
    assert_eq!(container.textures().len(), 1);
    assert_eq!(container.texture(0).unwrap().index(), Some(0));
    assert_eq!(container.matrix_bank(0).unwrap().matrix_count(), 1);
    assert_eq!(container.shape(7).unwrap().commands()[0].triangle_count(), 1);
}

#[test]
fn test_record_length_disagreement_is_rejected() {
    let mut bytes = minimal_legacy_file(7, &[], &[]);
    // The matrix record follows the texture and shape; grow its declared length
    let texture_len = 5 + 5 + 16;
    let shape = triangle_shape(7);
    let mut shape_writer = ByteWriter::new();
    shape.write(&mut shape_writer).unwrap();
    let matrix_header = 12 + 5 + 2 + texture_len + 5 + shape_writer.len();
    assert_eq!(bytes[matrix_header], Tag::Matrix as u8);
    bytes[matrix_header + 1] += 1;
    bytes.insert(matrix_header + 5 + 24, 0);

    let collaborators = Collaborators::new(&PlainEnvelope);
    let err = ScContainer::from_payload(
        LEGACY_FORMAT_VERSION,
        &bytes,
        &collaborators,
        &LoadOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ScError::LengthMismatch {
            declared: 25,
            consumed: 24,
            ..
        }
    ));
}

#[test]
fn test_flat_payload_needs_table_reader() {
    let collaborators = Collaborators::new(&PlainEnvelope);
    let err = ScContainer::from_payload(
        FLAT_FORMAT_VERSION,
        &[0; 8],
        &collaborators,
        &LoadOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ScError::MissingTableReader));
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}

// =============================================================================
// Files
// =============================================================================

#[test]
fn test_save_and_load_round_trip() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("ui.sc");
    let container = sample_container();

    container
        .save(&path, &PlainEnvelope, &SaveOptions::default())
        .unwrap();
    assert!(!texture_sidecar_path(&path).exists());

    let collaborators = Collaborators::new(&PlainEnvelope);
    let loaded = ScContainer::load(&path, &collaborators, &LoadOptions::default()).unwrap();

    assert_eq!(loaded.shape_ids(), vec![1]);
    assert_eq!(loaded.movie_clip_ids(), vec![2]);
    assert_eq!(loaded.export_names(), vec!["hero"]);
    assert_eq!(loaded.movie_clip(2).unwrap().export_name(), Some("hero"));
    assert_eq!(loaded.textures(), container.textures());
    assert_eq!(loaded.matrix_banks(), container.matrix_banks());
}

#[test]
fn test_external_textures_use_sidecar() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("level.sc");
    let container = sample_container();

    let options = SaveOptions {
        external_textures: Some(true),
    };
    container.save(&path, &PlainEnvelope, &options).unwrap();
    let sidecar = dir.path().join("level_tex.sc");
    assert!(sidecar.exists());

    let collaborators = Collaborators::new(&PlainEnvelope);
    let loaded = ScContainer::load(&path, &collaborators, &LoadOptions::default()).unwrap();
    assert!(loaded.flags().use_external_texture);
    assert_eq!(loaded.textures(), container.textures());

    // Without following the sidecar only texture headers are known
    let headers_only = LoadOptions {
        load_external_textures: false,
        ..LoadOptions::default()
    };
    let loaded = ScContainer::load(&path, &collaborators, &headers_only).unwrap();
    assert!(!loaded.textures()[0].has_pixel_data());
    assert_eq!(loaded.textures()[0].width(), 2);
}

#[test]
fn test_missing_sidecar_is_resource_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("level.sc");
    let options = SaveOptions {
        external_textures: Some(true),
    };
    sample_container()
        .save(&path, &PlainEnvelope, &options)
        .unwrap();
    fs::remove_file(dir.path().join("level_tex.sc")).unwrap();

    let collaborators = Collaborators::new(&PlainEnvelope);
    let err = ScContainer::load(&path, &collaborators, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ScError::TextureFileNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_unreadable_sidecar_keeps_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("level.sc");
    let options = SaveOptions {
        external_textures: Some(true),
    };
    sample_container()
        .save(&path, &PlainEnvelope, &options)
        .unwrap();

    // A directory in place of the sidecar fails with something other than NotFound
    let sidecar = dir.path().join("level_tex.sc");
    fs::remove_file(&sidecar).unwrap();
    fs::create_dir(&sidecar).unwrap();

    let collaborators = Collaborators::new(&PlainEnvelope);
    let err = ScContainer::load(&path, &collaborators, &LoadOptions::default()).unwrap_err();
    match err {
        ScError::Io { path, source } => {
            assert_eq!(path, sidecar);
            assert_ne!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected an I/O error for the sidecar, got {other:?}"),
    }
}

#[test]
fn test_missing_primary_file_is_resource_error() {
    let dir = tempdir().unwrap();
    let collaborators = Collaborators::new(&PlainEnvelope);
    let err = ScContainer::load(
        dir.path().join("absent.sc"),
        &collaborators,
        &LoadOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ScError::Io { .. }));
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_uncommon_resolution_probes_lowres_sidecar() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("menu.sc");

    let main = minimal_legacy_file(
        7,
        &[],
        &[Tag::UseExternalTexture, Tag::UseUncommonResolution],
    );
    write_packed(&path, LEGACY_FORMAT_VERSION, &main);

    let mut sidecar = ByteWriter::new();
    let texture = tiny_texture();
    sidecar
        .write_block(texture.tag(), |w| texture.write(w, true))
        .unwrap();
    sidecar.write_empty_block(Tag::Eof);
    write_packed(
        &dir.path().join("menu_lowres_tex.sc"),
        LEGACY_FORMAT_VERSION,
        sidecar.as_bytes(),
    );

    let collaborators = Collaborators::new(&PlainEnvelope);
    let loaded = ScContainer::load(&path, &collaborators, &LoadOptions::default()).unwrap();
    assert!(loaded.flags().use_uncommon_resolution);
    assert!(loaded.flags().half_scale_possible);
    assert_eq!(loaded.texture(0).unwrap().data(), texture.data());
}

#[test]
fn test_uncommon_resolution_container_survives_save_and_reload() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("menu.sc");

    let mut container = sample_container();
    container.flags_mut().use_external_texture = true;
    container.flags_mut().use_uncommon_resolution = true;
    container.flags_mut().half_scale_possible = true;
    container
        .save(&path, &PlainEnvelope, &SaveOptions::default())
        .unwrap();

    let mut written: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["menu.sc", "menu_tex.sc"]);

    let collaborators = Collaborators::new(&PlainEnvelope);
    let loaded = ScContainer::load(&path, &collaborators, &LoadOptions::default())
        .expect("saved container should load back with its sidecar");
    assert!(!loaded.flags().use_uncommon_resolution);
    assert!(loaded.flags().half_scale_possible);
    assert_eq!(loaded.textures(), container.textures());
}
