//! Top-level SC container
//!
//! [`ScContainer`] owns every decoded entity. Loading picks the engine from
//! the format version reported by the outer unpack step: version 5 is the flat
//! table format, anything else is the legacy tag stream. After the engine has
//! populated all collections a separate cross-link pass resolves exports and
//! movie clip children by id and validates every frame element.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::config::{LoadOptions, SaveOptions, default_highres_suffix, default_lowres_suffix};
use crate::error::{Result, ScError};
use crate::flat::{Decompressor, TableReader, decode_flat};
use crate::matrix_bank::MatrixBank;
use crate::movie_clip::{FrameElement, MovieClip, MovieClipModifier};
use crate::record::{decode_main, decode_texture_file, encode_main, encode_texture_file};
use crate::shape::{Shape, Triangulator};
use crate::text_field::TextField;
use crate::texture::Texture;
use crate::{FLAT_FORMAT_VERSION, LEGACY_FORMAT_VERSION, TEXTURE_EXTENSION};

// =============================================================================
// Decoded contents
// =============================================================================

/// Exported name of a movie clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub id: u16,
    pub name: String,
}

impl Export {
    pub fn new(id: u16, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// File-level switches carried by flag records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFlags {
    pub half_scale_possible: bool,
    /// Texture pixels live in a `_tex.sc` sidecar
    pub use_external_texture: bool,
    /// Sidecar is one of the suffixed resolution variants
    pub use_uncommon_resolution: bool,
    pub highres_suffix: String,
    pub lowres_suffix: String,
}

impl Default for ContainerFlags {
    fn default() -> Self {
        Self {
            half_scale_possible: false,
            use_external_texture: false,
            use_uncommon_resolution: false,
            highres_suffix: default_highres_suffix(),
            lowres_suffix: default_lowres_suffix(),
        }
    }
}

/// Entity collections produced by either engine, before cross-linking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contents {
    pub exports: Vec<Export>,
    pub textures: Vec<Texture>,
    pub shapes: Vec<Shape>,
    pub movie_clips: Vec<MovieClip>,
    pub text_fields: Vec<TextField>,
    pub modifiers: Vec<MovieClipModifier>,
    pub matrix_banks: Vec<MatrixBank>,
    /// Distinct font names in first-seen order
    pub font_names: Vec<String>,
    pub flags: ContainerFlags,
}

impl Contents {
    /// Empty contents whose sidecar suffixes come from `options`
    pub fn with_suffixes(options: &LoadOptions) -> Self {
        Self {
            flags: ContainerFlags {
                highres_suffix: options.highres_suffix.clone(),
                lowres_suffix: options.lowres_suffix.clone(),
                ..ContainerFlags::default()
            },
            ..Self::default()
        }
    }

    pub fn register_font_name(&mut self, name: Option<&str>) {
        if let Some(name) = name
            && !self.font_names.iter().any(|known| known == name)
        {
            self.font_names.push(name.to_string());
        }
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// Outer file envelope (signature, compression, version) around the payload
pub trait ScFileCodec {
    /// Split a file into its format version and unpacked payload
    fn unpack(&self, data: &[u8]) -> Result<(u32, Vec<u8>)>;
    /// Wrap a payload for writing
    fn pack(&self, version: u32, payload: &[u8]) -> Result<Vec<u8>>;
}

/// File existence check used when probing resolution variants
pub trait FileProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// [`FileProbe`] backed by the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileProbe;

impl FileProbe for StdFileProbe {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// External services a load needs
///
/// Only the codec is mandatory. Legacy files never touch the table reader or
/// decompressor; flat files fail with [`ScError::MissingTableReader`] without
/// one.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub codec: &'a dyn ScFileCodec,
    pub tables: Option<&'a dyn TableReader>,
    pub decompressor: Option<&'a dyn Decompressor>,
    pub probe: &'a dyn FileProbe,
}

impl<'a> Collaborators<'a> {
    pub fn new(codec: &'a dyn ScFileCodec) -> Self {
        Self {
            codec,
            tables: None,
            decompressor: None,
            probe: &StdFileProbe,
        }
    }

    pub fn with_tables(mut self, tables: &'a dyn TableReader) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_decompressor(mut self, decompressor: &'a dyn Decompressor) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    pub fn with_probe(mut self, probe: &'a dyn FileProbe) -> Self {
        self.probe = probe;
        self
    }

    fn flat(&self) -> Result<(&'a dyn TableReader, &'a dyn Decompressor)> {
        let tables = self.tables.ok_or(ScError::MissingTableReader)?;
        let decompressor: &'a dyn Decompressor = match self.decompressor {
            Some(decompressor) => decompressor,
            #[cfg(feature = "zstd")]
            None => &crate::flat::ZstdDecompressor,
            #[cfg(not(feature = "zstd"))]
            None => return Err(ScError::MissingDecompressor),
        };
        Ok((tables, decompressor))
    }
}

// =============================================================================
// Sidecar naming
// =============================================================================

/// Default external texture file: `name.sc` becomes `name_tex.sc`
pub fn texture_sidecar_path(path: &Path) -> PathBuf {
    suffixed_sidecar_path(path, "")
}

/// First existing of the high and low resolution sidecars, high resolution
/// naming when neither exists
pub fn uncommon_texture_path(
    path: &Path,
    highres_suffix: &str,
    lowres_suffix: &str,
    probe: &dyn FileProbe,
) -> PathBuf {
    let highres = suffixed_sidecar_path(path, highres_suffix);
    if probe.exists(&highres) {
        return highres;
    }
    let lowres = suffixed_sidecar_path(path, lowres_suffix);
    if probe.exists(&lowres) {
        return lowres;
    }
    highres
}

fn suffixed_sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".sc").unwrap_or(&name);
    path.with_file_name(format!("{stem}{suffix}{TEXTURE_EXTENSION}"))
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).map_err(|source| ScError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Container
// =============================================================================

/// Resolved position of a display object id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayObjectRef {
    Shape(usize),
    MovieClip(usize),
    TextField(usize),
    Modifier(usize),
}

/// Encoded main file plus the optional texture sidecar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContainer {
    pub version: u32,
    pub main: Vec<u8>,
    pub texture_file: Option<Vec<u8>>,
}

/// A loaded or constructed SC container
#[derive(Debug, Clone, PartialEq)]
pub struct ScContainer {
    format_version: u32,
    contents: Contents,
    index: HashMap<u16, DisplayObjectRef>,
}

impl Default for ScContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScContainer {
    /// Empty legacy container with one empty matrix bank
    pub fn new() -> Self {
        let mut contents = Contents::default();
        contents.matrix_banks.push(MatrixBank::default());
        Self {
            format_version: LEGACY_FORMAT_VERSION,
            contents,
            index: HashMap::new(),
        }
    }

    /// Decode an unpacked payload and cross-link it
    pub fn from_payload(
        version: u32,
        payload: &[u8],
        collaborators: &Collaborators<'_>,
        options: &LoadOptions,
    ) -> Result<Self> {
        let contents = if version == FLAT_FORMAT_VERSION {
            let (tables, decompressor) = collaborators.flat()?;
            decode_flat(payload, tables, decompressor, options)?
        } else {
            decode_main(payload, options)?
        };
        Self::from_contents(version, contents)
    }

    /// Wrap decoded contents, running the cross-link pass
    pub fn from_contents(format_version: u32, contents: Contents) -> Result<Self> {
        let mut container = Self {
            format_version,
            contents,
            index: HashMap::new(),
        };
        container.rebuild_index();
        container.link()?;
        Ok(container)
    }

    /// Load a container file and, when it asks for one, its texture sidecar
    pub fn load(
        path: impl AsRef<Path>,
        collaborators: &Collaborators<'_>,
        options: &LoadOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ScError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (version, payload) = collaborators.codec.unpack(&data)?;
        tracing::debug!(path = %path.display(), version, "loading container");

        let mut container = Self::from_payload(version, &payload, collaborators, options)?;

        let flags = &container.contents.flags;
        if version != FLAT_FORMAT_VERSION
            && flags.use_external_texture
            && options.load_external_textures
        {
            let texture_path = if flags.use_uncommon_resolution {
                uncommon_texture_path(
                    path,
                    &flags.highres_suffix,
                    &flags.lowres_suffix,
                    collaborators.probe,
                )
            } else {
                texture_sidecar_path(path)
            };
            container.load_texture_file(&texture_path, collaborators, options)?;
        }

        Ok(container)
    }

    fn load_texture_file(
        &mut self,
        path: &Path,
        collaborators: &Collaborators<'_>,
        options: &LoadOptions,
    ) -> Result<()> {
        tracing::debug!(path = %path.display(), "loading texture sidecar");
        let data = fs::read(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ScError::TextureFileNotFound {
                path: path.to_path_buf(),
            },
            _ => ScError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let (_, payload) = collaborators.codec.unpack(&data)?;
        let texture_count = self.contents.textures.len();
        self.contents.textures = decode_texture_file(&payload, texture_count, options)?;
        Ok(())
    }

    /// Encode as a legacy tag stream
    ///
    /// Flat containers are re-encoded in the legacy format.
    pub fn to_payload(&self, options: &SaveOptions) -> Result<EncodedContainer> {
        let external = options.external_textures_or(self.contents.flags.use_external_texture);
        let main = encode_main(&self.contents, external)?;
        let texture_file = if external {
            Some(encode_texture_file(&self.contents.textures)?)
        } else {
            None
        };
        Ok(EncodedContainer {
            version: LEGACY_FORMAT_VERSION,
            main,
            texture_file,
        })
    }

    /// Encode, pack and write the main file and, if needed, its sidecar
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        codec: &dyn ScFileCodec,
        options: &SaveOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let encoded = self.to_payload(options)?;

        write_file(path, &codec.pack(encoded.version, &encoded.main)?)?;
        if let Some(texture_file) = &encoded.texture_file {
            let texture_path = texture_sidecar_path(path);
            write_file(&texture_path, &codec.pack(encoded.version, texture_file)?)?;
        }
        tracing::debug!(path = %path.display(), "saved container");
        Ok(())
    }

    // =========================================================================
    // Cross-linking
    // =========================================================================

    /// Id index; the first match wins in shape, movie clip, text field, modifier order
    fn rebuild_index(&mut self) {
        let contents = &self.contents;
        let mut index = HashMap::with_capacity(
            contents.shapes.len()
                + contents.movie_clips.len()
                + contents.text_fields.len()
                + contents.modifiers.len(),
        );

        let ids = contents
            .shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| (shape.id, DisplayObjectRef::Shape(i)))
            .chain(
                contents
                    .movie_clips
                    .iter()
                    .enumerate()
                    .map(|(i, clip)| (clip.id, DisplayObjectRef::MovieClip(i))),
            )
            .chain(
                contents
                    .text_fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| (field.id, DisplayObjectRef::TextField(i))),
            )
            .chain(
                contents
                    .modifiers
                    .iter()
                    .enumerate()
                    .map(|(i, modifier)| (modifier.id, DisplayObjectRef::Modifier(i))),
            );
        for (id, reference) in ids {
            index.entry(id).or_insert(reference);
        }

        self.index = index;
    }

    fn link(&mut self) -> Result<()> {
        let exports = std::mem::take(&mut self.contents.exports);
        for export in &exports {
            self.attach_export_name(export)?;
        }
        self.contents.exports = exports;

        for clip in &self.contents.movie_clips {
            if let Some(child) = clip
                .children()
                .iter()
                .find(|child| !self.index.contains_key(&child.id))
            {
                return Err(ScError::UnresolvedChild {
                    clip_id: clip.id,
                    child_id: child.id,
                });
            }
            self.validate_frames(clip)?;
        }

        tracing::trace!(
            exports = self.contents.exports.len(),
            objects = self.index.len(),
            "cross-linked container"
        );
        Ok(())
    }

    fn attach_export_name(&mut self, export: &Export) -> Result<()> {
        let clip = self
            .contents
            .movie_clips
            .iter_mut()
            .find(|clip| clip.id == export.id)
            .ok_or_else(|| ScError::UnresolvedExport {
                id: export.id,
                name: export.name.clone(),
            })?;
        clip.set_export_name(Some(export.name.clone()));
        Ok(())
    }

    fn validate_frames(&self, clip: &MovieClip) -> Result<()> {
        let bank_index = clip.matrix_bank_index() as usize;
        let bank = self.contents.matrix_banks.get(bank_index);

        for (frame_index, frame) in clip.frames().iter().enumerate() {
            for element in &frame.elements {
                let reason = element_problem(element, clip.children().len(), bank, bank_index);
                if let Some(reason) = reason {
                    return Err(ScError::InvalidFrameElement {
                        clip_id: clip.id,
                        frame: frame_index,
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn flags(&self) -> &ContainerFlags {
        &self.contents.flags
    }

    pub fn flags_mut(&mut self) -> &mut ContainerFlags {
        &mut self.contents.flags
    }

    /// Triangle index strategy of this container's format
    pub fn triangulator(&self) -> Triangulator {
        Triangulator::for_format_version(self.format_version)
    }

    pub fn shape_ids(&self) -> Vec<u16> {
        self.contents.shapes.iter().map(|shape| shape.id).collect()
    }

    pub fn movie_clip_ids(&self) -> Vec<u16> {
        self.contents.movie_clips.iter().map(|clip| clip.id).collect()
    }

    pub fn text_field_ids(&self) -> Vec<u16> {
        self.contents.text_fields.iter().map(|field| field.id).collect()
    }

    pub fn export_names(&self) -> Vec<&str> {
        self.contents
            .exports
            .iter()
            .map(|export| export.name.as_str())
            .collect()
    }

    pub fn exports(&self) -> &[Export] {
        &self.contents.exports
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.contents.shapes
    }

    pub fn movie_clips(&self) -> &[MovieClip] {
        &self.contents.movie_clips
    }

    pub fn text_fields(&self) -> &[TextField] {
        &self.contents.text_fields
    }

    pub fn modifiers(&self) -> &[MovieClipModifier] {
        &self.contents.modifiers
    }

    pub fn textures(&self) -> &[Texture] {
        &self.contents.textures
    }

    pub fn matrix_banks(&self) -> &[MatrixBank] {
        &self.contents.matrix_banks
    }

    pub fn matrix_bank(&self, index: usize) -> Option<&MatrixBank> {
        self.contents.matrix_banks.get(index)
    }

    pub fn matrix_bank_mut(&mut self, index: usize) -> Option<&mut MatrixBank> {
        self.contents.matrix_banks.get_mut(index)
    }

    pub fn font_names(&self) -> &[String] {
        &self.contents.font_names
    }

    pub fn shape(&self, id: u16) -> Option<&Shape> {
        self.contents.shapes.iter().find(|shape| shape.id == id)
    }

    pub fn movie_clip(&self, id: u16) -> Option<&MovieClip> {
        self.contents.movie_clips.iter().find(|clip| clip.id == id)
    }

    pub fn movie_clip_by_export(&self, name: &str) -> Option<&MovieClip> {
        let export = self.contents.exports.iter().find(|export| export.name == name)?;
        self.movie_clip(export.id)
    }

    pub fn text_field(&self, id: u16) -> Option<&TextField> {
        self.contents.text_fields.iter().find(|field| field.id == id)
    }

    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.contents.textures.get(index)
    }

    pub fn display_object(&self, id: u16) -> Option<DisplayObjectRef> {
        self.index.get(&id).copied()
    }

    /// Resolve every child of a movie clip, in child order
    pub fn timeline_children(&self, clip_id: u16) -> Option<Vec<DisplayObjectRef>> {
        self.movie_clip(clip_id)?
            .children()
            .iter()
            .map(|child| self.display_object(child.id))
            .collect()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn add_shape(&mut self, shape: Shape) {
        self.contents.shapes.push(shape);
        self.rebuild_index();
    }

    /// Add a movie clip whose children and frame elements already resolve
    pub fn add_movie_clip(&mut self, clip: MovieClip) -> Result<()> {
        if let Some(child) = clip
            .children()
            .iter()
            .find(|child| !self.index.contains_key(&child.id))
        {
            return Err(ScError::UnresolvedChild {
                clip_id: clip.id,
                child_id: child.id,
            });
        }
        self.validate_frames(&clip)?;
        self.contents.movie_clips.push(clip);
        self.rebuild_index();
        Ok(())
    }

    pub fn add_text_field(&mut self, text_field: TextField) {
        self.contents
            .register_font_name(text_field.font_name.as_deref());
        self.contents.text_fields.push(text_field);
        self.rebuild_index();
    }

    pub fn add_modifier(&mut self, modifier: MovieClipModifier) {
        self.contents.modifiers.push(modifier);
        self.rebuild_index();
    }

    /// Attach a texture and return its slot index
    pub fn add_texture(&mut self, mut texture: Texture) -> usize {
        let index = self.contents.textures.len();
        texture.set_index(index);
        self.contents.textures.push(texture);
        index
    }

    /// Append a matrix bank and return its index
    pub fn add_matrix_bank(&mut self, bank: MatrixBank) -> usize {
        self.contents.matrix_banks.push(bank);
        self.contents.matrix_banks.len() - 1
    }

    /// Export an existing movie clip under `name`
    pub fn add_export(&mut self, id: u16, name: impl Into<String>) -> Result<()> {
        let export = Export::new(id, name);
        self.attach_export_name(&export)?;
        self.contents.exports.push(export);
        Ok(())
    }

    /// Remove an export by name, clearing the clip's export name
    pub fn remove_export(&mut self, name: &str) -> Option<Export> {
        let position = self
            .contents
            .exports
            .iter()
            .position(|export| export.name == name)?;
        let export = self.contents.exports.remove(position);
        if let Some(clip) = self
            .contents
            .movie_clips
            .iter_mut()
            .find(|clip| clip.id == export.id)
        {
            clip.set_export_name(None);
        }
        Some(export)
    }
}

/// Describe why an element doesn't resolve, if it doesn't
fn element_problem(
    element: &FrameElement,
    child_count: usize,
    bank: Option<&MatrixBank>,
    bank_index: usize,
) -> Option<String> {
    if element.child_index as usize >= child_count {
        return Some(format!(
            "child index {} out of {child_count} children",
            element.child_index
        ));
    }
    if element.matrix().is_none() && element.color_transform().is_none() {
        return None;
    }

    let Some(bank) = bank else {
        return Some(format!("matrix bank {bank_index} doesn't exist"));
    };
    if let Some(matrix) = element.matrix()
        && matrix as usize >= bank.matrix_count()
    {
        return Some(format!(
            "matrix index {matrix} out of {} in bank {bank_index}",
            bank.matrix_count()
        ));
    }
    if let Some(transform) = element.color_transform()
        && transform as usize >= bank.color_transform_count()
    {
        return Some(format!(
            "color transform index {transform} out of {} in bank {bank_index}",
            bank.color_transform_count()
        ));
    }
    None
}
