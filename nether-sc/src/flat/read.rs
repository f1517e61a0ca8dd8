//! Flat section decoding

use super::tables::{
    ExternalMatrixBanksTable, MovieClipRecord, ResourcesTable, TableReader, TextureRecord,
};
use super::{Decompressor, ZSTD_MAGIC};
use crate::compressed_matrix::{ExternalBankLayout, decode_external_bank};
use crate::config::LoadOptions;
use crate::container::{Contents, Export};
use crate::error::{Result, ScError};
use crate::math::Matrix2x3;
use crate::matrix_bank::MatrixBank;
use crate::movie_clip::{
    ModifierKind, MovieClip, MovieClipChild, MovieClipFrame, MovieClipModifier,
};
use crate::shape::{DrawCommand, Shape};
use crate::stream::ByteReader;
use crate::tag::Tag;
use crate::text_field::{TextField, TextFieldStyles};
use crate::texture::{Texture, TextureType};
use crate::timeline::FrameElementDecoder;

/// Decode a flat container payload
///
/// # Arguments
/// * `payload` - Unpacked file body
/// * `tables` - Parser for the schema-table blobs
/// * `decompressor` - Used for the compressed sub-variant and external matrix banks
/// * `options` - Texture variant preference
///
/// Cross references are resolved later by the container.
pub fn decode_flat(
    payload: &[u8],
    tables: &dyn TableReader,
    decompressor: &dyn Decompressor,
    options: &LoadOptions,
) -> Result<Contents> {
    let mut outer = ByteReader::new(payload);
    let first = read_chunk(&mut outer)?;

    if !starts_with_zstd_frame(&outer) {
        tracing::debug!("flat container without compression");
        let resources = tables.resources(first)?;
        let banks = inline_matrix_banks(&resources)?;
        return SectionDecoder::new(resources, tables, options).decode(&mut outer, banks);
    }

    let metadata = tables.metadata(first)?;
    let decompressed = decompressor.decompress(payload, outer.position())?;
    tracing::debug!(
        compressed = metadata.compressed_size,
        decompressed = decompressed.len(),
        "flat container with compression"
    );

    let mut inner = ByteReader::new(&decompressed);
    let resources = tables.resources(read_chunk(&mut inner)?)?;

    let banks = if metadata.external_matrix_banks_size != 0 {
        if metadata.compressed_size == 0 {
            return Err(ScError::InvalidTable(
                "external matrix banks need a known compressed size".to_string(),
            ));
        }
        let compressed_size = usize::try_from(metadata.compressed_size).map_err(|_| {
            ScError::InvalidTable(format!("compressed size {}", metadata.compressed_size))
        })?;
        outer.skip(compressed_size)?;
        let table = tables.external_matrix_banks(read_chunk(&mut outer)?)?;
        external_matrix_banks(payload, outer.position(), &table, decompressor)?
    } else {
        inline_matrix_banks(&resources)?
    };

    SectionDecoder::new(resources, tables, options).decode(&mut inner, banks)
}

/// Read one `[len u32][blob]` chunk
fn read_chunk<'a>(reader: &mut ByteReader<'a>) -> Result<&'a [u8]> {
    let length = reader.read_u32()? as usize;
    reader.read_bytes(length)
}

fn starts_with_zstd_frame(reader: &ByteReader<'_>) -> bool {
    let mut peek = reader.clone();
    matches!(peek.read_u32(), Ok(ZSTD_MAGIC))
}

fn inline_matrix_banks(resources: &ResourcesTable) -> Result<Vec<MatrixBank>> {
    let mut banks = Vec::with_capacity(resources.matrix_banks.len());
    for record in &resources.matrix_banks {
        let matrices: Vec<Matrix2x3> = if record.matrices.is_empty() {
            record
                .short_matrices
                .iter()
                .copied()
                .map(Matrix2x3::from_quantized)
                .collect()
        } else {
            record.matrices.clone()
        };

        let mut bank = MatrixBank::new(matrices.len(), record.color_transforms.len())?;
        for (index, matrix) in matrices.into_iter().enumerate() {
            bank.set_matrix(index, matrix)?;
        }
        for (index, transform) in record.color_transforms.iter().enumerate() {
            bank.set_color_transform(index, *transform)?;
        }
        banks.push(bank);
    }
    Ok(banks)
}

fn external_matrix_banks(
    payload: &[u8],
    data_position: usize,
    table: &ExternalMatrixBanksTable,
    decompressor: &dyn Decompressor,
) -> Result<Vec<MatrixBank>> {
    let mut banks = Vec::with_capacity(table.banks.len());
    for record in &table.banks {
        let offset = usize::try_from(record.offset)
            .ok()
            .and_then(|offset| offset.checked_add(data_position))
            .ok_or_else(|| ScError::InvalidTable(format!("bank offset {}", record.offset)))?;
        let data = decompressor.decompress(payload, offset)?;

        let layout = ExternalBankLayout {
            float_matrix_count: record.float_matrix_count as usize,
            short_matrix_count: record.short_matrix_count as usize,
            block_count: record.matrix_block_count as usize,
            color_transform_count: record.color_transform_count as usize,
        };
        banks.push(decode_external_bank(&data, &layout)?);
    }
    tracing::debug!(banks = banks.len(), "decoded external matrix banks");
    Ok(banks)
}

struct SectionDecoder<'a> {
    resources: ResourcesTable,
    tables: &'a dyn TableReader,
    options: &'a LoadOptions,
}

impl<'a> SectionDecoder<'a> {
    fn new(
        resources: ResourcesTable,
        tables: &'a dyn TableReader,
        options: &'a LoadOptions,
    ) -> Self {
        Self {
            resources,
            tables,
            options,
        }
    }

    /// Decode the six sections that follow the resources chunk
    fn decode(
        &self,
        reader: &mut ByteReader<'_>,
        matrix_banks: Vec<MatrixBank>,
    ) -> Result<Contents> {
        let mut contents = Contents::with_suffixes(self.options);
        contents.matrix_banks = matrix_banks;

        contents.exports = self.exports(read_chunk(reader)?)?;

        for text_field in self.text_fields(read_chunk(reader)?)? {
            contents.register_font_name(text_field.font_name.as_deref());
            contents.text_fields.push(text_field);
        }

        contents.shapes = self.shapes(read_chunk(reader)?)?;
        contents.movie_clips = self.movie_clips(read_chunk(reader)?)?;
        contents.modifiers = self.modifiers(read_chunk(reader)?)?;
        contents.textures = self.textures(read_chunk(reader)?)?;

        tracing::debug!(
            shapes = contents.shapes.len(),
            movie_clips = contents.movie_clips.len(),
            textures = contents.textures.len(),
            text_fields = contents.text_fields.len(),
            matrix_banks = contents.matrix_banks.len(),
            "decoded flat container"
        );
        Ok(contents)
    }

    /// Resolve a string reference; 0 is absent
    fn string(&self, id: u32) -> Result<Option<String>> {
        if id == 0 {
            return Ok(None);
        }
        self.resources
            .strings
            .get(id as usize)
            .cloned()
            .map(Some)
            .ok_or(ScError::InvalidStringRef(id))
    }

    fn exports(&self, data: &[u8]) -> Result<Vec<Export>> {
        let table = self.tables.exports(data)?;
        if table.export_ids.len() != table.export_name_ids.len() {
            return Err(ScError::ExportCountMismatch {
                ids: table.export_ids.len(),
                names: table.export_name_ids.len(),
            });
        }

        let mut exports = Vec::with_capacity(table.export_ids.len());
        for (&id, &name_id) in table.export_ids.iter().zip(&table.export_name_ids) {
            let name = self
                .string(name_id)?
                .ok_or(ScError::MissingExportName { id })?;
            exports.push(Export::new(id, name));
        }
        Ok(exports)
    }

    fn text_fields(&self, data: &[u8]) -> Result<Vec<TextField>> {
        let table = self.tables.text_fields(data)?;
        let mut text_fields = Vec::with_capacity(table.text_fields.len());
        for record in &table.text_fields {
            let mut field = TextField::empty(record.id);
            field.font_name = self.string(record.font_name_ref_id)?;
            field.bounds.left = record.left;
            field.bounds.top = record.top;
            field.bounds.right = record.right;
            field.bounds.bottom = record.bottom;
            field.color = record.color;
            field.outline_color = record.outline_color;
            field.default_text = self.string(record.default_text_ref_id)?;
            field.another_text = self.string(record.another_text_ref_id)?;
            field.align = record.align;
            field.font_size = record.font_size;
            field.styles = TextFieldStyles::from_bits_truncate(record.styles);
            field.refresh_tag();
            text_fields.push(field);
        }
        Ok(text_fields)
    }

    fn shapes(&self, data: &[u8]) -> Result<Vec<Shape>> {
        let table = self.tables.shapes(data)?;
        let mut shapes = Vec::with_capacity(table.shapes.len());
        for record in &table.shapes {
            let mut commands = Vec::with_capacity(record.commands.len());
            for command in &record.commands {
                let start = command.starting_point_index as usize;
                let count = command.point_count as usize;
                if !(DrawCommand::MIN_POINTS..=DrawCommand::MAX_POINTS).contains(&count) {
                    return Err(ScError::InvalidTable(format!(
                        "shape {} draw command has {count} points",
                        record.id
                    )));
                }
                let points = self
                    .resources
                    .shape_points
                    .get(start..start + count)
                    .ok_or_else(|| {
                        ScError::InvalidTable(format!(
                            "shape {} points {start}..{} out of range",
                            record.id,
                            start + count
                        ))
                    })?;
                commands.push(DrawCommand::from_parts(command.texture_index, points.to_vec()));
            }
            shapes.push(Shape::new(record.id, commands));
        }
        Ok(shapes)
    }

    fn movie_clips(&self, data: &[u8]) -> Result<Vec<MovieClip>> {
        let table = self.tables.movie_clips(data)?;
        let mut decoder = FrameElementDecoder::new();
        let mut movie_clips = Vec::with_capacity(table.clips.len());
        for record in &table.clips {
            let mut movie_clip = self.movie_clip(record)?;

            if record.frame_data_offset != -1 {
                let offset = usize::try_from(record.frame_data_offset).map_err(|_| {
                    ScError::InvalidTable(format!(
                        "movie clip {} frame data offset {}",
                        record.id, record.frame_data_offset
                    ))
                })?;
                let frames = decoder.decode_movie_clip_frames(&table.frame_data, offset)?;
                if frames.len() < movie_clip.frame_count() {
                    return Err(ScError::FrameCountMismatch {
                        clip_id: record.id,
                        declared: movie_clip.frame_count(),
                        loaded: frames.len(),
                    });
                }
                for (index, elements) in frames.into_iter().enumerate() {
                    movie_clip.set_frame_elements(index, elements);
                }
            }

            movie_clips.push(movie_clip);
        }
        Ok(movie_clips)
    }

    fn movie_clip(&self, record: &MovieClipRecord) -> Result<MovieClip> {
        if record.frames.is_empty() {
            return Err(ScError::MissingFrames { clip_id: record.id });
        }

        let mut children = Vec::with_capacity(record.child_ids.len());
        for (index, &id) in record.child_ids.iter().enumerate() {
            let blend = record.child_blends.get(index).copied().unwrap_or(0);
            let name = match record.child_name_ref_ids.get(index) {
                Some(&name_id) => self.string(name_id)?,
                None => None,
            };
            children.push(MovieClipChild::new(id, blend, name));
        }

        // Element offsets are stored in u16 units, three per element
        let inline = record.frame_data_offset == -1;
        let mut offset = record.frame_element_offset as usize / 3;
        let mut frames = Vec::with_capacity(record.frames.len());
        for frame in &record.frames {
            let elements = if inline {
                let end = offset + frame.frame_element_count as usize;
                let elements = self
                    .resources
                    .frame_elements
                    .get(offset..end)
                    .ok_or(ScError::FrameElementOverflow { clip_id: record.id })?;
                offset = end;
                elements.to_vec()
            } else {
                Vec::new()
            };
            frames.push(MovieClipFrame::new(self.string(frame.label_ref_id)?, elements));
        }

        let mut builder = MovieClip::builder(record.id)
            .fps(record.fps)
            .custom_property(record.property != 0)
            .children(children)
            .frames(frames)
            .matrix_bank_index(record.matrix_bank_index);

        if let Some(name) = self.string(record.export_name_ref_id)? {
            builder = builder.export_name(name);
        }
        if record.scaling_grid_index != -1 {
            let grid = usize::try_from(record.scaling_grid_index)
                .ok()
                .and_then(|index| self.resources.scaling_grids.get(index))
                .ok_or_else(|| {
                    ScError::InvalidTable(format!(
                        "movie clip {} scaling grid {} out of range",
                        record.id, record.scaling_grid_index
                    ))
                })?;
            builder = builder.scaling_grid(*grid);
        }

        Ok(builder.build_unchecked())
    }

    fn modifiers(&self, data: &[u8]) -> Result<Vec<MovieClipModifier>> {
        let table = self.tables.modifiers(data)?;
        table
            .modifiers
            .iter()
            .map(|record| {
                let kind = Tag::from_u8(record.tag)
                    .and_then(ModifierKind::from_tag)
                    .ok_or(ScError::UnexpectedTag {
                        tag: record.tag,
                        context: "movie clip modifier table",
                    })?;
                Ok(MovieClipModifier::new(record.id, kind))
            })
            .collect()
    }

    fn textures(&self, data: &[u8]) -> Result<Vec<Texture>> {
        let table = self.tables.texture_sets(data)?;
        let mut textures = Vec::with_capacity(table.sets.len());
        for (index, set) in table.sets.iter().enumerate() {
            let record = match (&set.highres, &set.lowres) {
                (None, Some(lowres)) => lowres,
                (Some(_), Some(lowres)) if self.options.prefer_lowres => lowres,
                (Some(highres), _) => highres,
                (None, None) => return Err(ScError::NoTexturesInSet { index }),
            };
            let mut texture = self.texture(record)?;
            texture.set_index(index);
            textures.push(texture);
        }
        Ok(textures)
    }

    fn texture(&self, record: &TextureRecord) -> Result<Texture> {
        let texture_type = TextureType::from_u8(record.texture_type)?;
        let builder = Texture::builder(texture_type, record.width, record.height);

        if !record.data.is_empty() {
            return builder.ktx(record.data.clone()).build();
        }
        match self.string(record.texture_file_ref_id)? {
            Some(name) => builder.file_reference(name).build(),
            None => Err(ScError::MissingTextureFilename),
        }
    }
}
