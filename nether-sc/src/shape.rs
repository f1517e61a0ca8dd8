//! Bitmap-backed shapes
//!
//! A shape is a list of draw commands. Each command is a convex polygon with
//! twip positions and 16-bit normalized texture coordinates into one texture.

use crate::config::LoadOptions;
use crate::error::{Result, ScError};
use crate::stream::{ByteReader, ByteWriter};
use crate::tag::Tag;

/// Polygon vertex: position in pixels, texture coordinate in 1/65535 units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapePoint {
    pub x: f32,
    pub y: f32,
    pub u: u16,
    pub v: u16,
}

impl ShapePoint {
    pub fn new(x: f32, y: f32, u: u16, v: u16) -> Self {
        Self { x, y, u, v }
    }

    /// Texture coordinate in 0.0..=1.0
    pub fn uv(&self) -> (f32, f32) {
        (self.u as f32 / 65535.0, self.v as f32 / 65535.0)
    }

    /// Set the texture coordinate from 0.0..=1.0 values (truncating)
    pub fn set_uv(&mut self, u: f32, v: f32) {
        self.u = (u.clamp(0.0, 1.0) * 65535.0) as u16;
        self.v = (v.clamp(0.0, 1.0) * 65535.0) as u16;
    }
}

/// Index generation strategy for turning a polygon into triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Triangulator {
    /// Triangles `(0, i+1, i+2)`, used by tag-stream files
    #[default]
    FanFromVertex0,
    /// Triangles `(i, i+1, i+2)`, used by flat files
    SequentialFan,
}

impl Triangulator {
    /// Strategy matching a container format version
    pub fn for_format_version(version: u32) -> Self {
        if version == crate::FLAT_FORMAT_VERSION {
            Self::SequentialFan
        } else {
            Self::FanFromVertex0
        }
    }

    pub fn indices(self, triangle_count: usize) -> Vec<u32> {
        let mut indices = Vec::with_capacity(triangle_count * 3);
        for i in 0..triangle_count as u32 {
            let first = match self {
                Self::FanFromVertex0 => 0,
                Self::SequentialFan => i,
            };
            indices.extend_from_slice(&[first, i + 1, i + 2]);
        }
        indices
    }
}

/// One textured polygon of a shape
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    tag: Tag,
    texture_index: u8,
    points: Vec<ShapePoint>,
}

impl DrawCommand {
    pub const MIN_POINTS: usize = 3;
    pub const MAX_POINTS: usize = 255;

    /// Quad commands always carry exactly this many points
    pub const QUAD_POINTS: usize = 4;

    /// Build a command, validating the point count
    pub fn new(texture_index: u8, points: Vec<ShapePoint>) -> Result<Self> {
        if points.len() < Self::MIN_POINTS {
            return Err(ScError::invalid(
                "draw command",
                format!("needs at least 3 points, got {}", points.len()),
            ));
        }
        if points.len() > Self::MAX_POINTS {
            return Err(ScError::invalid(
                "draw command",
                format!("too many points: {}", points.len()),
            ));
        }
        Ok(Self::from_parts(texture_index, points))
    }

    /// Build a command from already decoded data
    pub(crate) fn from_parts(texture_index: u8, points: Vec<ShapePoint>) -> Self {
        Self {
            tag: Tag::ShapeDrawBitmapCommand3,
            texture_index,
            points,
        }
    }

    pub fn builder() -> DrawCommandBuilder {
        DrawCommandBuilder::default()
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn texture_index(&self) -> u8 {
        self.texture_index
    }

    pub fn set_texture_index(&mut self, texture_index: u8) {
        self.texture_index = texture_index;
    }

    pub fn points(&self) -> &[ShapePoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [ShapePoint] {
        &mut self.points
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.points.len().saturating_sub(2)
    }

    pub fn triangle_indices(&self, triangulator: Triangulator) -> Vec<u32> {
        triangulator.indices(self.triangle_count())
    }

    /// Decode a SHAPE_DRAW_BITMAP_COMMAND(_2/_3) payload
    pub fn read(reader: &mut ByteReader<'_>, tag: Tag) -> Result<Self> {
        let texture_index = reader.read_u8()?;

        let vertex_count = if tag == Tag::ShapeDrawBitmapCommand {
            Self::QUAD_POINTS
        } else {
            reader.read_u8()? as usize
        };
        if tag == Tag::ShapeDrawBitmapCommand2 {
            tracing::warn!("only SHAPE_DRAW_BITMAP_COMMAND_3 is supported, decoding deprecated command 2");
        }

        let mut points = vec![ShapePoint::default(); vertex_count];
        for point in points.iter_mut() {
            point.x = reader.read_twip()?;
            point.y = reader.read_twip()?;
        }
        for point in points.iter_mut() {
            point.u = reader.read_u16()?;
            point.v = reader.read_u16()?;
        }

        Ok(Self {
            tag,
            texture_index,
            points,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u8(self.texture_index);

        if self.tag == Tag::ShapeDrawBitmapCommand {
            if self.points.len() != Self::QUAD_POINTS {
                return Err(ScError::invalid(
                    "draw command",
                    format!("quad command has {} points", self.points.len()),
                ));
            }
        } else {
            let count = u8::try_from(self.points.len()).map_err(|_| {
                ScError::invalid("draw command", format!("too many points: {}", self.points.len()))
            })?;
            writer.write_u8(count);
        }

        for point in &self.points {
            writer.write_twip(point.x);
            writer.write_twip(point.y);
        }
        for point in &self.points {
            writer.write_u16(point.u);
            writer.write_u16(point.v);
        }
        Ok(())
    }
}

/// Incremental [`DrawCommand`] construction
#[derive(Debug, Default)]
pub struct DrawCommandBuilder {
    texture_index: Option<u8>,
    points: Vec<ShapePoint>,
}

impl DrawCommandBuilder {
    pub fn texture_index(mut self, texture_index: u8) -> Self {
        self.texture_index = Some(texture_index);
        self
    }

    pub fn point(mut self, point: ShapePoint) -> Self {
        self.points.push(point);
        self
    }

    pub fn points(mut self, points: impl IntoIterator<Item = ShapePoint>) -> Self {
        self.points.extend(points);
        self
    }

    pub fn build(self) -> Result<DrawCommand> {
        let texture_index = self
            .texture_index
            .ok_or_else(|| ScError::invalid("draw command", "texture index must be set"))?;
        DrawCommand::new(texture_index, self.points)
    }
}

/// Display object made of textured polygons
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: u16,
    tag: Tag,
    commands: Vec<DrawCommand>,
}

impl Shape {
    pub fn new(id: u16, commands: Vec<DrawCommand>) -> Self {
        let tag = Self::determine_tag(&commands);
        Self { id, tag, commands }
    }

    /// SHAPE when every command is a plain quad, SHAPE_2 otherwise
    fn determine_tag(commands: &[DrawCommand]) -> Tag {
        if commands
            .iter()
            .all(|command| command.tag() == Tag::ShapeDrawBitmapCommand)
        {
            Tag::Shape
        } else {
            Tag::Shape2
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut [DrawCommand] {
        &mut self.commands
    }

    pub fn push_command(&mut self, command: DrawCommand) {
        self.commands.push(command);
        self.tag = Self::determine_tag(&self.commands);
    }

    /// Total vertices across all commands
    pub fn vertex_count(&self) -> usize {
        self.commands.iter().map(DrawCommand::vertex_count).sum()
    }

    /// Decode a SHAPE / SHAPE_2 payload including its nested command records
    pub fn read(reader: &mut ByteReader<'_>, tag: Tag, options: &LoadOptions) -> Result<Self> {
        let id = reader.read_u16()?;
        let command_count = reader.read_u16()? as usize;

        // Point total is only an allocation hint
        let point_count = if tag == Tag::Shape2 {
            reader.read_u16()? as usize
        } else {
            command_count * DrawCommand::QUAD_POINTS
        };

        let mut commands = Vec::with_capacity(command_count);
        let mut skipped = 0;
        loop {
            let (raw_tag, length) = reader.read_record_header()?;
            let mut body = reader.window(length)?;

            match Tag::from_u8(raw_tag) {
                Some(Tag::Eof) => {
                    body.expect_consumed(raw_tag)?;
                    break;
                }
                Some(
                    command_tag @ (Tag::ShapeDrawBitmapCommand
                    | Tag::ShapeDrawBitmapCommand2
                    | Tag::ShapeDrawBitmapCommand3),
                ) => {
                    if commands.len() + skipped >= command_count {
                        return Err(ScError::TooManyObjects {
                            kind: "shape draw commands",
                        });
                    }
                    commands.push(DrawCommand::read(&mut body, command_tag)?);
                }
                Some(Tag::ShapeDrawColorFillCommand) => {
                    options.skip_unsupported(raw_tag, &mut body)?;
                    skipped += 1;
                }
                Some(_) => options.skip_unsupported(raw_tag, &mut body)?,
                None => options.skip_unknown(raw_tag, &mut body)?,
            }

            body.expect_consumed(raw_tag)?;
        }

        if commands.len() + skipped != command_count {
            return Err(ScError::IncompleteStream {
                kind: "shape draw commands",
                loaded: commands.len() + skipped,
                expected: command_count,
            });
        }

        tracing::trace!(shape = id, commands = commands.len(), point_count, "decoded shape");
        Ok(Self { id, tag, commands })
    }

    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_u16(self.id);
        writer.write_u16(count_u16(self.commands.len(), "draw commands")?);

        if self.tag != Tag::Shape {
            writer.write_u16(count_u16(self.vertex_count(), "shape points")?);
        }

        for command in &self.commands {
            writer.write_block(command.tag(), |w| command.write(w))?;
        }
        writer.write_empty_block(Tag::Eof);
        Ok(())
    }
}

fn count_u16(count: usize, what: &str) -> Result<u16> {
    u16::try_from(count).map_err(|_| ScError::invalid("shape", format!("too many {what}: {count}")))
}
