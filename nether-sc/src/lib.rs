//! Nether-SC: SC animation container codec for Nethercore
//!
//! This crate reads and writes SC containers, the binary format that stores
//! bitmap-backed vector shapes, movie clip timelines, text fields and texture
//! atlases for 2D animation. Two on-disk variants are supported:
//!
//! - The legacy **tag stream**: a header with object counts and exports,
//!   followed by `[tag u8][length u32][payload]` records up to an EOF record
//! - The **flat** format (version 5): length-prefixed schema-table sections,
//!   optionally wrapped in a zstd frame, with delta-compressed matrix banks
//!   and frame element streams
//!
//! # Key Features
//!
//! - **Strict framing**: every record must consume exactly its declared length
//! - **Generation tables**: text fields and movie clips decode and encode
//!   through one field-presence table per record generation
//! - **Lossless matrix and timeline decoding**: integer delta codecs for
//!   16-matrix blocks and per-frame element runs
//! - **Pluggable collaborators**: the outer file envelope, schema-table parsing
//!   and decompression are traits, with a zstd decompressor behind the default
//!   `zstd` feature
//!
//! # Usage
//!
//! ```ignore
//! use nether_sc::{Collaborators, LoadOptions, SaveOptions, ScContainer};
//!
//! let collaborators = Collaborators::new(&my_envelope);
//! let container = ScContainer::load("ui.sc", &collaborators, &LoadOptions::default())?;
//!
//! for id in container.shape_ids() {
//!     let shape = container.shape(id).unwrap();
//!     println!("shape {id}: {} vertices", shape.vertex_count());
//! }
//!
//! container.save("ui_copy.sc", &my_envelope, &SaveOptions::default())?;
//! ```

pub mod compressed_matrix;
pub mod config;
pub mod container;
pub mod error;
pub mod flat;
pub mod math;
pub mod matrix_bank;
pub mod movie_clip;
pub mod record;
pub mod shape;
pub mod stream;
pub mod tag;
pub mod text_field;
pub mod texture;
pub mod timeline;

pub use config::{LoadOptions, SaveOptions};
pub use container::{
    Collaborators, ContainerFlags, Contents, DisplayObjectRef, EncodedContainer, Export,
    FileProbe, ScContainer, ScFileCodec, StdFileProbe, texture_sidecar_path,
    uncommon_texture_path,
};
pub use error::{ErrorKind, Result, ScError};
#[cfg(feature = "zstd")]
pub use flat::ZstdDecompressor;
pub use flat::{Decompressor, TableReader};
pub use math::{ColorTransform, Matrix2x3, Rect, ShortRect};
pub use matrix_bank::MatrixBank;
pub use movie_clip::{
    FrameElement, ModifierKind, MovieClip, MovieClipChild, MovieClipFrame, MovieClipModifier,
};
pub use shape::{DrawCommand, Shape, ShapePoint, Triangulator};
pub use tag::Tag;
pub use text_field::{TextField, TextFieldStyles};
pub use texture::{PixelBuffer, Texture, TextureData, TextureType};

// =============================================================================
// Constants
// =============================================================================

/// File name suffix of the external texture sidecar
pub const TEXTURE_EXTENSION: &str = "_tex.sc";

/// Format version of flat (table) containers
pub const FLAT_FORMAT_VERSION: u32 = 5;

/// Format version written when encoding tag-stream containers
pub const LEGACY_FORMAT_VERSION: u32 = 3;
