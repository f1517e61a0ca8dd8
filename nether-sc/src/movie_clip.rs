//! Movie clips, their frames and modifiers
//!
//! A movie clip owns a list of children (display object ids) and a list of
//! frames. Every frame places children through [`FrameElement`] triples that
//! index into the children list and into the movie clip's matrix bank.
//!
//! # Generations
//!
//! | Tag            | Element table | Blend bytes | Custom properties |
//! |----------------|---------------|-------------|-------------------|
//! | MOVIE_CLIP     | no            | no          | no                |
//! | MOVIE_CLIP_2   | yes           | no          | no                |
//! | MOVIE_CLIP_3   | yes           | yes         | no                |
//! | MOVIE_CLIP_4   | no            | no          | no                |
//! | MOVIE_CLIP_5   | yes           | yes         | no                |
//! | MOVIE_CLIP_6   | yes           | yes         | yes               |

use crate::config::LoadOptions;
use crate::error::{Result, ScError};
use crate::math::{Rect, round_to};
use crate::stream::{ByteReader, ByteWriter};
use crate::tag::Tag;

// =============================================================================
// Frame elements and frames
// =============================================================================

/// Placement of one child in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameElement {
    pub child_index: u16,
    pub matrix_index: u16,
    pub color_transform_index: u16,
}

impl FrameElement {
    /// Sentinel for "no matrix" / "no color transform"
    pub const NONE: u16 = 0xFFFF;

    pub fn new(child_index: u16, matrix_index: u16, color_transform_index: u16) -> Self {
        Self {
            child_index,
            matrix_index,
            color_transform_index,
        }
    }

    pub fn matrix(&self) -> Option<u16> {
        (self.matrix_index != Self::NONE).then_some(self.matrix_index)
    }

    pub fn color_transform(&self) -> Option<u16> {
        (self.color_transform_index != Self::NONE).then_some(self.color_transform_index)
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self::new(
            reader.read_u16()?,
            reader.read_u16()?,
            reader.read_u16()?,
        ))
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_u16(self.child_index);
        writer.write_u16(self.matrix_index);
        writer.write_u16(self.color_transform_index);
    }
}

/// One frame of a movie clip timeline
#[derive(Debug, Clone, PartialEq)]
pub struct MovieClipFrame {
    tag: Tag,
    pub label: Option<String>,
    pub elements: Vec<FrameElement>,
}

impl MovieClipFrame {
    /// Frame whose elements live in the movie clip's element table
    pub fn new(label: Option<String>, elements: Vec<FrameElement>) -> Self {
        Self {
            tag: Tag::MovieClipFrame2,
            label,
            elements,
        }
    }

    /// Frame carrying its elements inline (MOVIE_CLIP_FRAME)
    pub fn with_inline_elements(label: Option<String>, elements: Vec<FrameElement>) -> Self {
        Self {
            tag: Tag::MovieClipFrame,
            label,
            elements,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    fn has_inline_elements(&self) -> bool {
        self.tag == Tag::MovieClipFrame
    }

    fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        let count = u16::try_from(self.elements.len())
            .map_err(|_| ScError::invalid("movie clip frame", "more than 65535 elements"))?;
        writer.write_u16(count);
        writer.write_ascii(self.label.as_deref())?;
        if self.has_inline_elements() {
            for element in &self.elements {
                element.write(writer);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Children
// =============================================================================

/// Reference from a movie clip to another display object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MovieClipChild {
    pub id: u16,
    pub blend: u8,
    pub name: Option<String>,
}

impl MovieClipChild {
    pub fn new(id: u16, blend: u8, name: Option<String>) -> Self {
        Self { id, blend, name }
    }
}

// =============================================================================
// Generation table
// =============================================================================

/// Fields present in one movie clip generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieClipLayout {
    pub element_table: bool,
    pub blend_data: bool,
    pub custom_properties: bool,
    pub deprecated: bool,
}

impl MovieClipLayout {
    const fn new(element_table: bool, blend_data: bool, custom_properties: bool) -> Self {
        Self {
            element_table,
            blend_data,
            custom_properties,
            deprecated: false,
        }
    }

    const fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn for_tag(tag: Tag) -> Option<Self> {
        LAYOUTS
            .iter()
            .find(|(layout_tag, _)| *layout_tag == tag)
            .map(|(_, layout)| *layout)
    }
}

const LAYOUTS: [(Tag, MovieClipLayout); 6] = [
    (Tag::MovieClip, MovieClipLayout::new(false, false, false)),
    (Tag::MovieClip2, MovieClipLayout::new(true, false, false)),
    (Tag::MovieClip3, MovieClipLayout::new(true, true, false)),
    (
        Tag::MovieClip4,
        MovieClipLayout::new(false, false, false).deprecated(),
    ),
    (Tag::MovieClip5, MovieClipLayout::new(true, true, false)),
    (Tag::MovieClip6, MovieClipLayout::new(true, true, true)),
];

/// The only custom property type the format defines
const CUSTOM_PROPERTY_BOOL: u8 = 0;

// =============================================================================
// Movie clip
// =============================================================================

/// Animated display object
#[derive(Debug, Clone, PartialEq)]
pub struct MovieClip {
    pub id: u16,
    tag: Tag,
    export_name: Option<String>,
    fps: u8,
    custom_property: bool,
    children: Vec<MovieClipChild>,
    frames: Vec<MovieClipFrame>,
    matrix_bank_index: u8,
    scaling_grid: Option<Rect>,
}

impl MovieClip {
    pub fn builder(id: u16) -> MovieClipBuilder {
        MovieClipBuilder::new(id)
    }

    /// MOVIE_CLIP_6 when the custom property is off, MOVIE_CLIP_5 when any
    /// child blends, MOVIE_CLIP_2 otherwise
    fn determine_tag(custom_property: bool, children: &[MovieClipChild]) -> Tag {
        if !custom_property {
            Tag::MovieClip6
        } else if children.iter().any(|child| child.blend != 0) {
            Tag::MovieClip5
        } else {
            Tag::MovieClip2
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn export_name(&self) -> Option<&str> {
        self.export_name.as_deref()
    }

    pub fn set_export_name(&mut self, name: Option<String>) {
        self.export_name = name;
    }

    pub fn fps(&self) -> u8 {
        self.fps
    }

    pub fn custom_property(&self) -> bool {
        self.custom_property
    }

    pub fn children(&self) -> &[MovieClipChild] {
        &self.children
    }

    pub fn frames(&self) -> &[MovieClipFrame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn matrix_bank_index(&self) -> u8 {
        self.matrix_bank_index
    }

    pub fn set_matrix_bank_index(&mut self, index: u8) {
        self.matrix_bank_index = index;
    }

    pub fn scaling_grid(&self) -> Option<&Rect> {
        self.scaling_grid.as_ref()
    }

    pub fn set_scaling_grid(&mut self, grid: Option<Rect>) {
        self.scaling_grid = grid;
    }

    pub(crate) fn set_frame_elements(&mut self, index: usize, elements: Vec<FrameElement>) {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.elements = elements;
        }
    }

    fn layout(&self) -> MovieClipLayout {
        MovieClipLayout::for_tag(self.tag).unwrap_or(MovieClipLayout::new(true, true, true))
    }

    /// Decode a MOVIE_CLIP* payload including its nested frame records
    pub fn read(reader: &mut ByteReader<'_>, tag: Tag, options: &LoadOptions) -> Result<Self> {
        let layout = MovieClipLayout::for_tag(tag).ok_or(ScError::UnexpectedTag {
            tag: tag as u8,
            context: "movie clip dispatch",
        })?;

        let id = reader.read_u16()?;
        let fps = reader.read_u8()?;
        let frame_count = reader.read_u16()? as usize;

        let mut custom_property = true;
        if layout.custom_properties {
            let property_count = reader.read_u8()?;
            for _ in 0..property_count {
                match reader.read_u8()? {
                    CUSTOM_PROPERTY_BOOL => custom_property = reader.read_bool()?,
                    other => return Err(ScError::UnsupportedCustomProperty(other)),
                }
            }
        }

        if layout.deprecated {
            tracing::warn!(movie_clip = id, ?tag, "deprecated movie clip tag");
            options.tolerate(ScError::UnsupportedTag {
                tag: tag as u8,
                length: reader.data_len(),
            })?;
        }

        let element_table = if layout.element_table {
            let count = reader.read_i32()?;
            let count = usize::try_from(count).map_err(|_| ScError::NegativeLength {
                tag: tag as u8,
                length: count,
            })?;
            let mut elements = Vec::with_capacity(count.min(reader.remaining() / 6));
            for _ in 0..count {
                elements.push(FrameElement::read(reader)?);
            }
            Some(elements)
        } else {
            None
        };

        // Children: ids, then optional blend bytes, then names
        let child_count = reader.read_u16()? as usize;
        let child_ids = reader.read_u16_array(child_count)?;
        let blends = if layout.blend_data {
            reader.read_bytes(child_count)?.to_vec()
        } else {
            vec![0; child_count]
        };
        let mut children = Vec::with_capacity(child_count);
        for (id, blend) in child_ids.into_iter().zip(blends) {
            children.push(MovieClipChild::new(id, blend, reader.read_ascii()?));
        }

        let mut frames = Vec::with_capacity(frame_count);
        let mut used_elements = 0;
        let mut scaling_grid = None;
        let mut matrix_bank_index = 0;

        loop {
            let (raw_tag, length) = reader.read_record_header()?;
            let mut body = reader.window(length)?;

            match Tag::from_u8(raw_tag) {
                Some(Tag::Eof) => {
                    body.expect_consumed(raw_tag)?;
                    break;
                }
                Some(frame_tag @ (Tag::MovieClipFrame | Tag::MovieClipFrame2)) => {
                    if frames.len() >= frame_count {
                        return Err(ScError::TooManyObjects {
                            kind: "movie clip frames",
                        });
                    }

                    let element_count = body.read_u16()? as usize;
                    let label = body.read_ascii()?;

                    let elements = if frame_tag == Tag::MovieClipFrame {
                        let mut elements = Vec::with_capacity(element_count);
                        for _ in 0..element_count {
                            elements.push(FrameElement::read(&mut body)?);
                        }
                        elements
                    } else {
                        let table = element_table.as_ref().ok_or(ScError::UnexpectedTag {
                            tag: raw_tag,
                            context: "movie clip without a frame element table",
                        })?;
                        let end = used_elements + element_count;
                        let slice = table
                            .get(used_elements..end)
                            .ok_or(ScError::FrameElementOverflow { clip_id: id })?;
                        used_elements = end;
                        slice.to_vec()
                    };

                    frames.push(MovieClipFrame {
                        tag: frame_tag,
                        label,
                        elements,
                    });
                }
                Some(Tag::ScalingGrid) => {
                    if scaling_grid.is_some() {
                        return Err(ScError::MultipleScalingGrids { clip_id: id });
                    }
                    let left = body.read_twip()?;
                    let top = body.read_twip()?;
                    let width = body.read_twip()?;
                    let height = body.read_twip()?;
                    scaling_grid = Some(Rect::new(
                        left,
                        top,
                        round_to(left + width, 2),
                        round_to(top + height, 2),
                    ));
                }
                Some(Tag::MatrixBankIndex) => {
                    matrix_bank_index = body.read_u8()?;
                }
                Some(_) => options.skip_unsupported(raw_tag, &mut body)?,
                None => options.skip_unknown(raw_tag, &mut body)?,
            }

            body.expect_consumed(raw_tag)?;
        }

        if frames.len() != frame_count {
            return Err(ScError::FrameCountMismatch {
                clip_id: id,
                declared: frame_count,
                loaded: frames.len(),
            });
        }

        let declared_elements = element_table.as_ref().map_or(0, Vec::len);
        if used_elements != declared_elements && element_table.is_some() {
            tracing::warn!(
                movie_clip = id,
                used = used_elements,
                declared = declared_elements,
                "frame element table not fully used"
            );
        }

        Ok(Self {
            id,
            tag,
            export_name: None,
            fps,
            custom_property,
            children,
            frames,
            matrix_bank_index,
            scaling_grid,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        let layout = self.layout();

        writer.write_u16(self.id);
        writer.write_u8(self.fps);
        writer.write_u16(count_u16(self.frames.len(), "frames")?);

        if layout.custom_properties {
            writer.write_u8(1);
            writer.write_u8(CUSTOM_PROPERTY_BOOL);
            writer.write_bool(self.custom_property);
        }

        if layout.element_table {
            let table: Vec<&FrameElement> = self
                .frames
                .iter()
                .filter(|frame| !frame.has_inline_elements())
                .flat_map(|frame| frame.elements.iter())
                .collect();
            let count = i32::try_from(table.len())
                .map_err(|_| ScError::invalid("movie clip", "frame element table too large"))?;
            writer.write_i32(count);
            for element in table {
                element.write(writer);
            }
        } else if let Some(frame) = self.frames.iter().find(|f| !f.has_inline_elements()) {
            return Err(ScError::invalid(
                "movie clip",
                format!(
                    "{:?} has no element table for a {:?} frame",
                    self.tag,
                    frame.tag()
                ),
            ));
        }

        writer.write_u16(count_u16(self.children.len(), "children")?);
        for child in &self.children {
            writer.write_u16(child.id);
        }
        if layout.blend_data {
            for child in &self.children {
                writer.write_u8(child.blend);
            }
        }
        for child in &self.children {
            writer.write_ascii(child.name.as_deref())?;
        }

        for frame in &self.frames {
            writer.write_block(frame.tag(), |w| frame.write(w))?;
        }

        if let Some(grid) = &self.scaling_grid {
            writer.write_block(Tag::ScalingGrid, |w| {
                w.write_twip(grid.left);
                w.write_twip(grid.top);
                w.write_twip(grid.width());
                w.write_twip(grid.height());
                Ok(())
            })?;
        }

        if self.matrix_bank_index != 0 {
            writer.write_block(Tag::MatrixBankIndex, |w| {
                w.write_u8(self.matrix_bank_index);
                Ok(())
            })?;
        }

        writer.write_empty_block(Tag::Eof);
        Ok(())
    }
}

fn count_u16(count: usize, what: &str) -> Result<u16> {
    u16::try_from(count)
        .map_err(|_| ScError::invalid("movie clip", format!("too many {what}: {count}")))
}

/// Incremental [`MovieClip`] construction
#[derive(Debug)]
pub struct MovieClipBuilder {
    id: u16,
    export_name: Option<String>,
    fps: u8,
    custom_property: bool,
    children: Vec<MovieClipChild>,
    frames: Vec<MovieClipFrame>,
    matrix_bank_index: u8,
    scaling_grid: Option<Rect>,
}

impl MovieClipBuilder {
    fn new(id: u16) -> Self {
        Self {
            id,
            export_name: None,
            fps: 0,
            custom_property: true,
            children: Vec::new(),
            frames: Vec::new(),
            matrix_bank_index: 0,
            scaling_grid: None,
        }
    }

    pub fn export_name(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }

    pub fn fps(mut self, fps: u8) -> Self {
        self.fps = fps;
        self
    }

    pub fn custom_property(mut self, value: bool) -> Self {
        self.custom_property = value;
        self
    }

    pub fn child(mut self, child: MovieClipChild) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = MovieClipChild>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn frame(mut self, frame: MovieClipFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn frames(mut self, frames: impl IntoIterator<Item = MovieClipFrame>) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn matrix_bank_index(mut self, index: u8) -> Self {
        self.matrix_bank_index = index;
        self
    }

    pub fn scaling_grid(mut self, grid: Rect) -> Self {
        self.scaling_grid = Some(grid);
        self
    }

    /// Build, rejecting frame elements that point past the children list
    pub fn build(self) -> Result<MovieClip> {
        for (frame_index, frame) in self.frames.iter().enumerate() {
            if let Some(element) = frame
                .elements
                .iter()
                .find(|element| element.child_index as usize >= self.children.len())
            {
                return Err(ScError::invalid(
                    "movie clip",
                    format!(
                        "frame {frame_index} references child {} of {}",
                        element.child_index,
                        self.children.len()
                    ),
                ));
            }
        }
        Ok(self.build_unchecked())
    }

    pub(crate) fn build_unchecked(self) -> MovieClip {
        MovieClip {
            id: self.id,
            tag: MovieClip::determine_tag(self.custom_property, &self.children),
            export_name: self.export_name,
            fps: self.fps,
            custom_property: self.custom_property,
            children: self.children,
            frames: self.frames,
            matrix_bank_index: self.matrix_bank_index,
            scaling_grid: self.scaling_grid,
        }
    }
}

// =============================================================================
// Modifiers
// =============================================================================

/// Masking role of a modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Mask,
    Masked,
    Unmasked,
}

impl ModifierKind {
    pub fn tag(self) -> Tag {
        match self {
            Self::Mask => Tag::ModifierState2,
            Self::Masked => Tag::ModifierState3,
            Self::Unmasked => Tag::ModifierState4,
        }
    }

    pub fn from_tag(tag: Tag) -> Option<Self> {
        match tag {
            Tag::ModifierState2 => Some(Self::Mask),
            Tag::ModifierState3 => Some(Self::Masked),
            Tag::ModifierState4 => Some(Self::Unmasked),
            _ => None,
        }
    }
}

/// Display object switching the stencil state of its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieClipModifier {
    pub id: u16,
    pub kind: ModifierKind,
}

impl MovieClipModifier {
    pub fn new(id: u16, kind: ModifierKind) -> Self {
        Self { id, kind }
    }

    pub fn tag(&self) -> Tag {
        self.kind.tag()
    }

    pub fn read(reader: &mut ByteReader<'_>, tag: Tag) -> Result<Self> {
        let kind = ModifierKind::from_tag(tag).ok_or(ScError::UnexpectedTag {
            tag: tag as u8,
            context: "movie clip modifier dispatch",
        })?;
        Ok(Self::new(reader.read_u16()?, kind))
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_u16(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample_clip(custom_property: bool, blend: u8) -> MovieClip {
        MovieClip::builder(12)
            .fps(24)
            .custom_property(custom_property)
            .child(MovieClipChild::new(3, blend, Some("body".to_string())))
            .child(MovieClipChild::new(4, 0, None))
            .frame(MovieClipFrame::new(
                Some("idle".to_string()),
                vec![FrameElement::new(0, 1, FrameElement::NONE)],
            ))
            .frame(MovieClipFrame::new(
                None,
                vec![
                    FrameElement::new(0, 2, 0),
                    FrameElement::new(1, FrameElement::NONE, FrameElement::NONE),
                ],
            ))
            .build()
            .unwrap()
    }

    fn round_trip(clip: &MovieClip) -> MovieClip {
        let mut writer = ByteWriter::new();
        clip.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        let decoded = MovieClip::read(&mut reader, clip.tag(), &LoadOptions::default()).unwrap();
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn test_layout_table() {
        assert!(!MovieClipLayout::for_tag(Tag::MovieClip).unwrap().element_table);
        assert!(MovieClipLayout::for_tag(Tag::MovieClip2).unwrap().element_table);
        assert!(!MovieClipLayout::for_tag(Tag::MovieClip2).unwrap().blend_data);
        assert!(MovieClipLayout::for_tag(Tag::MovieClip3).unwrap().blend_data);
        assert!(MovieClipLayout::for_tag(Tag::MovieClip4).unwrap().deprecated);
        assert!(MovieClipLayout::for_tag(Tag::MovieClip6).unwrap().custom_properties);
        assert!(MovieClipLayout::for_tag(Tag::Shape).is_none());
        for (tag, layout) in LAYOUTS {
            assert_eq!(layout.blend_data, tag.has_blend_data());
            assert_eq!(layout.custom_properties, tag.has_custom_properties());
        }
    }

    #[test]
    fn test_determine_tag() {
        assert_eq!(sample_clip(true, 0).tag(), Tag::MovieClip2);
        assert_eq!(sample_clip(true, 3).tag(), Tag::MovieClip5);
        assert_eq!(sample_clip(false, 3).tag(), Tag::MovieClip6);
    }

    #[test]
    fn test_round_trip_every_built_generation() {
        for clip in [
            sample_clip(true, 0),
            sample_clip(true, 3),
            sample_clip(false, 0),
        ] {
            assert_eq!(round_trip(&clip), clip);
        }
    }

    #[test]
    fn test_scaling_grid_and_bank_index() {
        let mut clip = sample_clip(true, 0);
        clip.set_scaling_grid(Some(Rect::from_sizes(1.5, 2.25, 10.1, 4.0)));
        clip.set_matrix_bank_index(2);

        let decoded = round_trip(&clip);
        let grid = decoded.scaling_grid().unwrap();
        assert_eq!(grid.left, 1.5);
        assert_eq!(grid.top, 2.25);
        assert_eq!(grid.right, 11.6);
        assert_eq!(grid.bottom, 6.25);
        assert_eq!(decoded.matrix_bank_index(), 2);
    }

    #[test]
    fn test_inline_frames() {
        let mut writer = ByteWriter::new();
        writer.write_u16(5);
        writer.write_u8(30);
        writer.write_u16(1);
        writer.write_u16(1);
        writer.write_u16(77);
        writer.write_ascii(None).unwrap();
        writer
            .write_block(Tag::MovieClipFrame, |w| {
                w.write_u16(1);
                w.write_ascii(Some("a"))?;
                FrameElement::new(0, 9, 8).write(w);
                Ok(())
            })
            .unwrap();
        writer.write_empty_block(Tag::Eof);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let clip = MovieClip::read(&mut reader, Tag::MovieClip, &LoadOptions::default()).unwrap();
        assert_eq!(clip.frames()[0].tag(), Tag::MovieClipFrame);
        assert_eq!(clip.frames()[0].elements, vec![FrameElement::new(0, 9, 8)]);
        assert_eq!(clip.children()[0].id, 77);

        let mut writer = ByteWriter::new();
        clip.write(&mut writer).unwrap();
        assert_eq!(writer.into_bytes(), bytes);
    }

    #[test]
    fn test_table_frame_without_table_fails() {
        let mut writer = ByteWriter::new();
        writer.write_u16(5);
        writer.write_u8(30);
        writer.write_u16(1);
        writer.write_u16(0);
        writer
            .write_block(Tag::MovieClipFrame2, |w| {
                w.write_u16(0);
                w.write_ascii(None)
            })
            .unwrap();
        writer.write_empty_block(Tag::Eof);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let err =
            MovieClip::read(&mut reader, Tag::MovieClip, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ScError::UnexpectedTag { tag: 11, .. }));
    }

    #[test]
    fn test_frame_element_overflow() {
        let clip = sample_clip(true, 0);
        let mut writer = ByteWriter::new();
        clip.write(&mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        // id(2) fps(1) frames(2), then the element table count
        bytes[5..9].copy_from_slice(&2i32.to_le_bytes());
        bytes.drain(9 + 12..9 + 18);

        let mut reader = ByteReader::new(&bytes);
        let err =
            MovieClip::read(&mut reader, Tag::MovieClip2, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ScError::FrameElementOverflow { clip_id: 12 }));
    }

    #[test]
    fn test_multiple_scaling_grids() {
        let clip = sample_clip(true, 0);
        let mut writer = ByteWriter::new();
        clip.write(&mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        bytes.truncate(bytes.len() - 5);
        let mut tail = ByteWriter::new();
        for _ in 0..2 {
            tail.write_block(Tag::ScalingGrid, |w| {
                w.write_bytes(&[0; 16]);
                Ok(())
            })
            .unwrap();
        }
        tail.write_empty_block(Tag::Eof);
        bytes.extend(tail.into_bytes());

        let mut reader = ByteReader::new(&bytes);
        let err =
            MovieClip::read(&mut reader, Tag::MovieClip2, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ScError::MultipleScalingGrids { clip_id: 12 }));
    }

    /// Replace the trailing EOF record with `record` followed by EOF
    fn with_nested_record(clip: &MovieClip, record: &[u8]) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        clip.write(&mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        bytes.truncate(bytes.len() - 5);
        bytes.extend_from_slice(record);
        bytes.extend_from_slice(&[Tag::Eof as u8, 0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_unknown_nested_tag() {
        let clip = sample_clip(true, 0);

        // Ordinal past the catalog with a payload is skipped
        let bytes = with_nested_record(&clip, &[200, 2, 0, 0, 0, 0xAB, 0xCD]);
        let mut reader = ByteReader::new(&bytes);
        let decoded = MovieClip::read(&mut reader, clip.tag(), &LoadOptions::default()).unwrap();
        assert_eq!(decoded.frames(), clip.frames());
        assert!(reader.is_empty());

        // Without a payload it is structural corruption even in lenient mode
        let bytes = with_nested_record(&clip, &[200, 0, 0, 0, 0]);
        let mut reader = ByteReader::new(&bytes);
        let err = MovieClip::read(&mut reader, clip.tag(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ScError::UnknownTag { tag: 200 }));
        assert_eq!(err.kind(), ErrorKind::StructuralCorruption);
    }

    #[test]
    fn test_frame_count_mismatch() {
        let clip = sample_clip(true, 0);
        let mut writer = ByteWriter::new();
        clip.write(&mut writer).unwrap();
        let mut bytes = writer.into_bytes();
        bytes[3..5].copy_from_slice(&3u16.to_le_bytes());

        let mut reader = ByteReader::new(&bytes);
        let err =
            MovieClip::read(&mut reader, Tag::MovieClip2, &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ScError::FrameCountMismatch {
                declared: 3,
                loaded: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_custom_property() {
        let mut writer = ByteWriter::new();
        writer.write_u16(1);
        writer.write_u8(0);
        writer.write_u16(0);
        writer.write_u8(1);
        writer.write_u8(7);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        let err =
            MovieClip::read(&mut reader, Tag::MovieClip6, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, ScError::UnsupportedCustomProperty(7)));
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn test_builder_rejects_bad_child_index() {
        let err = MovieClip::builder(1)
            .frame(MovieClipFrame::new(None, vec![FrameElement::new(0, 0, 0)]))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingMisuse);
    }

    #[test]
    fn test_frame_element_sentinels() {
        let element = FrameElement::new(0, FrameElement::NONE, 3);
        assert_eq!(element.matrix(), None);
        assert_eq!(element.color_transform(), Some(3));
    }

    #[test]
    fn test_modifier_round_trip() {
        let modifier = MovieClipModifier::new(300, ModifierKind::Masked);
        assert_eq!(modifier.tag(), Tag::ModifierState3);

        let mut writer = ByteWriter::new();
        modifier.write(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            MovieClipModifier::read(&mut reader, Tag::ModifierState3).unwrap(),
            modifier
        );
        assert!(MovieClipModifier::read(&mut ByteReader::new(&bytes), Tag::Shape).is_err());
    }
}
