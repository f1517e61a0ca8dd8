//! Typed tables of the flat format
//!
//! The flat format stores every section as a nested schema-table blob. Parsing
//! those blobs belongs to a [`TableReader`]; the engine only sees the plain
//! records below. String fields are references into
//! [`ResourcesTable::strings`] where 0 means "absent".

use crate::error::Result;
use crate::math::{ColorTransform, Matrix2x3, Rect};
use crate::movie_clip::FrameElement;
use crate::shape::ShapePoint;

/// Shared pools referenced by every other table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcesTable {
    pub strings: Vec<String>,
    pub matrix_banks: Vec<MatrixBankRecord>,
    pub shape_points: Vec<ShapePoint>,
    pub frame_elements: Vec<FrameElement>,
    pub scaling_grids: Vec<Rect>,
}

/// One inline matrix bank; `matrices` wins over `short_matrices` when non-empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixBankRecord {
    pub matrices: Vec<Matrix2x3>,
    pub short_matrices: Vec<[i16; 6]>,
    pub color_transforms: Vec<ColorTransform>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportsTable {
    pub export_ids: Vec<u16>,
    pub export_name_ids: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFieldsTable {
    pub text_fields: Vec<TextFieldRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFieldRecord {
    pub id: u16,
    pub font_name_ref_id: u32,
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
    pub color: u32,
    pub outline_color: u32,
    pub default_text_ref_id: u32,
    pub another_text_ref_id: u32,
    pub align: u8,
    pub font_size: u8,
    /// Packed [`TextFieldStyles`](crate::text_field::TextFieldStyles)
    pub styles: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapesTable {
    pub shapes: Vec<ShapeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeRecord {
    pub id: u16,
    pub commands: Vec<DrawCommandRecord>,
}

/// Draw command pointing at a run of [`ResourcesTable::shape_points`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCommandRecord {
    pub texture_index: u8,
    pub point_count: u32,
    pub starting_point_index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieClipsTable {
    pub clips: Vec<MovieClipRecord>,
    /// Delta-compressed frame element streams addressed by
    /// [`MovieClipRecord::frame_data_offset`]
    pub frame_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieClipRecord {
    pub id: u16,
    pub export_name_ref_id: u32,
    pub fps: u8,
    /// Custom boolean property; non-zero is true
    pub property: u8,
    pub child_ids: Vec<u16>,
    pub child_blends: Vec<u8>,
    pub child_name_ref_ids: Vec<u32>,
    pub frames: Vec<FrameRecord>,
    /// Start of the clip's elements in [`ResourcesTable::frame_elements`], in u16 units
    pub frame_element_offset: u32,
    /// Offset into [`MovieClipsTable::frame_data`], or -1 when elements are inline
    pub frame_data_offset: i32,
    pub matrix_bank_index: u8,
    /// Index into [`ResourcesTable::scaling_grids`], or -1
    pub scaling_grid_index: i32,
}

impl Default for MovieClipRecord {
    fn default() -> Self {
        Self {
            id: 0,
            export_name_ref_id: 0,
            fps: 0,
            property: 1,
            child_ids: Vec::new(),
            child_blends: Vec::new(),
            child_name_ref_ids: Vec::new(),
            frames: Vec::new(),
            frame_element_offset: 0,
            frame_data_offset: -1,
            matrix_bank_index: 0,
            scaling_grid_index: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameRecord {
    pub frame_element_count: u32,
    pub label_ref_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiersTable {
    pub modifiers: Vec<ModifierRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierRecord {
    pub id: u16,
    /// Wire ordinal of MODIFIER_STATE_2/3/4
    pub tag: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureSetsTable {
    pub sets: Vec<TextureSetRecord>,
}

/// Resolution variants of one texture slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureSetRecord {
    pub highres: Option<TextureRecord>,
    pub lowres: Option<TextureRecord>,
}

/// Embedded KTX bytes when `data` is non-empty, else a file reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureRecord {
    pub texture_type: u8,
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
    pub texture_file_ref_id: u32,
}

/// Header of the compressed sub-variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataTable {
    /// Size of the zstd frame holding the section chunks
    pub compressed_size: u64,
    /// Non-zero when external matrix banks follow the compressed frame
    pub external_matrix_banks_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalMatrixBanksTable {
    pub banks: Vec<ExternalMatrixBankRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalMatrixBankRecord {
    pub float_matrix_count: u32,
    pub short_matrix_count: u32,
    pub matrix_block_count: u32,
    pub color_transform_count: u32,
    /// Start of the bank's zstd frame, relative to the bank data region
    pub offset: u64,
}

/// Schema-table parser for each section kind
///
/// Every method receives exactly one section blob.
pub trait TableReader {
    fn resources(&self, data: &[u8]) -> Result<ResourcesTable>;
    fn exports(&self, data: &[u8]) -> Result<ExportsTable>;
    fn text_fields(&self, data: &[u8]) -> Result<TextFieldsTable>;
    fn shapes(&self, data: &[u8]) -> Result<ShapesTable>;
    fn movie_clips(&self, data: &[u8]) -> Result<MovieClipsTable>;
    fn modifiers(&self, data: &[u8]) -> Result<ModifiersTable>;
    fn texture_sets(&self, data: &[u8]) -> Result<TextureSetsTable>;
    fn metadata(&self, data: &[u8]) -> Result<MetadataTable>;
    fn external_matrix_banks(&self, data: &[u8]) -> Result<ExternalMatrixBanksTable>;
}
