//! Text fields and their nine record generations
//!
//! Every generation appends fields to the previous one. Decoding and encoding
//! both walk [`TextFieldLayout`], which says which trailing fields a tag carries.

use bitflags::bitflags;

use crate::error::{Result, ScError};
use crate::math::ShortRect;
use crate::stream::{ByteReader, ByteWriter, MAX_STRING_LEN};
use crate::tag::Tag;

bitflags! {
    /// Packed style byte of a text field
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextFieldStyles: u8 {
        const DEVICE_FONT = 0x01;
        const OUTLINE = 0x02;
        const BOLD = 0x04;
        const ITALIC = 0x08;
        const MULTILINE = 0x10;
        const UNKNOWN = 0x20;
        const AUTO_ADJUST = 0x40;
    }
}

/// Trailing fields present in one text field generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextFieldLayout {
    pub device_font: bool,
    /// The generation implies the UNKNOWN style without storing it
    pub implies_unknown: bool,
    pub outline_color: bool,
    /// Unknown short followed by a reserved short
    pub unknown_short: bool,
    pub bend_angle: bool,
    pub auto_adjust: bool,
    pub another_text: bool,
}

impl TextFieldLayout {
    const BASE: Self = Self {
        device_font: false,
        implies_unknown: false,
        outline_color: false,
        unknown_short: false,
        bend_angle: false,
        auto_adjust: false,
        another_text: false,
    };

    pub fn for_tag(tag: Tag) -> Option<Self> {
        LAYOUTS
            .iter()
            .find(|(layout_tag, _)| *layout_tag == tag)
            .map(|(_, layout)| *layout)
    }
}

const LAYOUTS: [(Tag, TextFieldLayout); 9] = {
    let tf1 = TextFieldLayout::BASE;
    let tf2 = TextFieldLayout {
        device_font: true,
        ..tf1
    };
    let tf3 = TextFieldLayout {
        implies_unknown: true,
        ..tf2
    };
    let tf4 = TextFieldLayout {
        outline_color: true,
        ..tf3
    };
    let tf5 = TextFieldLayout {
        outline_color: true,
        ..tf2
    };
    let tf6 = TextFieldLayout {
        unknown_short: true,
        ..tf4
    };
    let tf7 = TextFieldLayout {
        bend_angle: true,
        ..tf6
    };
    let tf8 = TextFieldLayout {
        auto_adjust: true,
        ..tf7
    };
    let tf9 = TextFieldLayout {
        another_text: true,
        ..tf8
    };
    [
        (Tag::TextField, tf1),
        (Tag::TextField2, tf2),
        (Tag::TextField3, tf3),
        (Tag::TextField4, tf4),
        (Tag::TextField5, tf5),
        (Tag::TextField6, tf6),
        (Tag::TextField7, tf7),
        (Tag::TextField8, tf8),
        (Tag::TextField9, tf9),
    ]
};

/// Dynamic or static text display object
#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub id: u16,
    tag: Tag,
    pub font_name: Option<String>,
    pub bounds: ShortRect,
    /// ARGB fill color
    pub color: u32,
    /// ARGB outline color
    pub outline_color: u32,
    pub default_text: Option<String>,
    pub another_text: Option<String>,
    pub styles: TextFieldStyles,
    pub align: u8,
    pub font_size: u8,
    pub unknown_short: i16,
    /// Bend in 1/32767 of a full turn
    pub bend_angle: i16,
}

impl TextField {
    pub(crate) fn empty(id: u16) -> Self {
        Self {
            id,
            tag: Tag::TextField,
            font_name: None,
            bounds: ShortRect::default(),
            color: 0,
            outline_color: 0,
            default_text: None,
            another_text: None,
            styles: TextFieldStyles::empty(),
            align: 0,
            font_size: 0,
            unknown_short: 0,
            bend_angle: 0,
        }
    }

    pub fn builder(id: u16) -> TextFieldBuilder {
        TextFieldBuilder {
            field: Self::empty(id),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Re-select the record generation after editing fields
    pub fn refresh_tag(&mut self) {
        self.tag = self.determine_tag();
    }

    /// Simplest generation able to hold the current field values
    pub fn determine_tag(&self) -> Tag {
        let base = if self.styles.contains(TextFieldStyles::DEVICE_FONT) {
            Tag::TextField2
        } else {
            Tag::TextField
        };

        if !self.styles.contains(TextFieldStyles::UNKNOWN) {
            return if self.outline_color != 0 {
                Tag::TextField5
            } else {
                base
            };
        }

        if self.another_text.is_some() {
            Tag::TextField9
        } else if self.styles.contains(TextFieldStyles::AUTO_ADJUST) {
            Tag::TextField8
        } else if self.bend_angle != 0 {
            Tag::TextField7
        } else if self.unknown_short != 0 {
            Tag::TextField6
        } else if self.outline_color != 0 {
            Tag::TextField4
        } else {
            Tag::TextField3
        }
    }

    pub fn bend_angle_degrees(&self) -> f32 {
        self.bend_angle as f32 / i16::MAX as f32 * 360.0
    }

    pub fn set_bend_angle_degrees(&mut self, degrees: f32) {
        self.bend_angle = (degrees * i16::MAX as f32 / 360.0) as i16;
    }

    /// Decode a TEXT_FIELD* payload; the font name is returned inside the field
    pub fn read(reader: &mut ByteReader<'_>, tag: Tag) -> Result<Self> {
        let layout = TextFieldLayout::for_tag(tag).ok_or(ScError::UnexpectedTag {
            tag: tag as u8,
            context: "text field dispatch",
        })?;

        let id = reader.read_u16()?;
        let font_name = reader.read_ascii()?;
        let color = reader.read_u32()?;

        let mut styles = TextFieldStyles::empty();
        styles.set(TextFieldStyles::BOLD, reader.read_bool()?);
        styles.set(TextFieldStyles::ITALIC, reader.read_bool()?);
        styles.set(TextFieldStyles::MULTILINE, reader.read_bool()?);
        let _reserved = reader.read_bool()?;

        let align = reader.read_u8()?;
        let font_size = reader.read_u8()?;
        let bounds = ShortRect::new(
            reader.read_i16()?,
            reader.read_i16()?,
            reader.read_i16()?,
            reader.read_i16()?,
        );
        styles.set(TextFieldStyles::OUTLINE, reader.read_bool()?);
        let default_text = reader.read_ascii()?;

        let mut field = TextField {
            id,
            tag,
            font_name,
            bounds,
            color,
            outline_color: 0,
            default_text,
            another_text: None,
            styles,
            align,
            font_size,
            unknown_short: 0,
            bend_angle: 0,
        };

        if layout.device_font {
            let device_font = reader.read_bool()?;
            field.styles.set(TextFieldStyles::DEVICE_FONT, device_font);
        }
        if layout.implies_unknown {
            field.styles.insert(TextFieldStyles::UNKNOWN);
        }
        if layout.outline_color {
            field.outline_color = reader.read_u32()?;
        }
        if layout.unknown_short {
            field.unknown_short = reader.read_i16()?;
            let _reserved = reader.read_i16()?;
        }
        if layout.bend_angle {
            field.bend_angle = reader.read_i16()?;
        }
        if layout.auto_adjust {
            let auto_adjust = reader.read_bool()?;
            field.styles.set(TextFieldStyles::AUTO_ADJUST, auto_adjust);
        }
        if layout.another_text {
            field.another_text = reader.read_ascii()?;
        }

        Ok(field)
    }

    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        let layout = TextFieldLayout::for_tag(self.tag).unwrap_or(TextFieldLayout::BASE);

        writer.write_u16(self.id);
        writer.write_ascii(self.font_name.as_deref())?;
        writer.write_u32(self.color);

        writer.write_bool(self.styles.contains(TextFieldStyles::BOLD));
        writer.write_bool(self.styles.contains(TextFieldStyles::ITALIC));
        writer.write_bool(self.styles.contains(TextFieldStyles::MULTILINE));
        writer.write_bool(false);

        writer.write_u8(self.align);
        writer.write_u8(self.font_size);
        writer.write_i16(self.bounds.left);
        writer.write_i16(self.bounds.top);
        writer.write_i16(self.bounds.right);
        writer.write_i16(self.bounds.bottom);

        writer.write_bool(self.styles.contains(TextFieldStyles::OUTLINE));
        writer.write_ascii(self.default_text.as_deref())?;

        if layout.device_font {
            writer.write_bool(self.styles.contains(TextFieldStyles::DEVICE_FONT));
        }
        if layout.outline_color {
            writer.write_u32(self.outline_color);
        }
        if layout.unknown_short {
            writer.write_i16(self.unknown_short);
            writer.write_i16(0);
        }
        if layout.bend_angle {
            writer.write_i16(self.bend_angle);
        }
        if layout.auto_adjust {
            writer.write_bool(self.styles.contains(TextFieldStyles::AUTO_ADJUST));
        }
        if layout.another_text {
            writer.write_ascii(self.another_text.as_deref())?;
        }
        Ok(())
    }
}

/// Incremental [`TextField`] construction
#[derive(Debug)]
pub struct TextFieldBuilder {
    field: TextField,
}

impl TextFieldBuilder {
    pub fn font_name(mut self, name: impl Into<String>) -> Self {
        self.field.font_name = Some(name.into());
        self
    }

    pub fn bounds(mut self, bounds: ShortRect) -> Self {
        self.field.bounds = bounds;
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.field.color = color;
        self
    }

    pub fn outline_color(mut self, color: u32) -> Self {
        self.field.outline_color = color;
        self
    }

    pub fn default_text(mut self, text: impl Into<String>) -> Self {
        self.field.default_text = Some(text.into());
        self
    }

    pub fn another_text(mut self, text: impl Into<String>) -> Self {
        self.field.another_text = Some(text.into());
        self
    }

    pub fn styles(mut self, styles: TextFieldStyles) -> Self {
        self.field.styles = styles;
        self
    }

    pub fn align(mut self, align: u8) -> Self {
        self.field.align = align;
        self
    }

    pub fn font_size(mut self, size: u8) -> Self {
        self.field.font_size = size;
        self
    }

    pub fn unknown_short(mut self, value: i16) -> Self {
        self.field.unknown_short = value;
        self
    }

    pub fn bend_angle(mut self, value: i16) -> Self {
        self.field.bend_angle = value;
        self
    }

    /// Build, rejecting strings that don't fit a length byte
    pub fn build(mut self) -> Result<TextField> {
        for text in [
            &self.field.font_name,
            &self.field.default_text,
            &self.field.another_text,
        ]
        .into_iter()
        .flatten()
        {
            if text.len() > MAX_STRING_LEN {
                return Err(ScError::StringTooLong { len: text.len() });
            }
        }
        self.field.refresh_tag();
        Ok(self.field)
    }
}
