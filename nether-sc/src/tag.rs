//! Record kinds of the SC tag stream
//!
//! Ordinals are the wire encoding. New kinds are only ever appended.

/// Record kind ("tag") with its wire ordinal
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Eof = 0,
    Texture = 1,
    Shape = 2,
    MovieClip = 3,
    ShapeDrawBitmapCommand = 4,
    MovieClipFrame = 5,
    ShapeDrawColorFillCommand = 6,
    TextField = 7,
    Matrix = 8,
    ColorTransform = 9,
    MovieClip2 = 10,
    MovieClipFrame2 = 11,
    MovieClip3 = 12,
    TimelineIndexes = 13,
    MovieClip4 = 14,
    TextField2 = 15,
    Texture2 = 16,
    ShapeDrawBitmapCommand2 = 17,
    Shape2 = 18,
    Texture3 = 19,
    TextField3 = 20,
    TextField4 = 21,
    ShapeDrawBitmapCommand3 = 22,
    HalfScalePossible = 23,
    Texture4 = 24,
    TextField5 = 25,
    UseExternalTexture = 26,
    Texture5 = 27,
    Texture6 = 28,
    Texture7 = 29,
    UseUncommonResolution = 30,
    ScalingGrid = 31,
    ExternalFilesSuffixes = 32,
    TextField6 = 33,
    Texture8 = 34,
    MovieClip5 = 35,
    MatrixPrecise = 36,
    MovieClipModifiers = 37,
    ModifierState2 = 38,
    ModifierState3 = 39,
    ModifierState4 = 40,
    MatrixBankIndex = 41,
    ExtraMatrixBank = 42,
    TextField7 = 43,
    TextField8 = 44,
    KhronosTexture = 45,
    TextField9 = 46,
    TextureFileReference = 47,
    Unknown48 = 48,
    MovieClip6 = 49,
}

impl Tag {
    /// Every tag in ordinal order
    pub const ALL: [Tag; 50] = [
        Tag::Eof,
        Tag::Texture,
        Tag::Shape,
        Tag::MovieClip,
        Tag::ShapeDrawBitmapCommand,
        Tag::MovieClipFrame,
        Tag::ShapeDrawColorFillCommand,
        Tag::TextField,
        Tag::Matrix,
        Tag::ColorTransform,
        Tag::MovieClip2,
        Tag::MovieClipFrame2,
        Tag::MovieClip3,
        Tag::TimelineIndexes,
        Tag::MovieClip4,
        Tag::TextField2,
        Tag::Texture2,
        Tag::ShapeDrawBitmapCommand2,
        Tag::Shape2,
        Tag::Texture3,
        Tag::TextField3,
        Tag::TextField4,
        Tag::ShapeDrawBitmapCommand3,
        Tag::HalfScalePossible,
        Tag::Texture4,
        Tag::TextField5,
        Tag::UseExternalTexture,
        Tag::Texture5,
        Tag::Texture6,
        Tag::Texture7,
        Tag::UseUncommonResolution,
        Tag::ScalingGrid,
        Tag::ExternalFilesSuffixes,
        Tag::TextField6,
        Tag::Texture8,
        Tag::MovieClip5,
        Tag::MatrixPrecise,
        Tag::MovieClipModifiers,
        Tag::ModifierState2,
        Tag::ModifierState3,
        Tag::ModifierState4,
        Tag::MatrixBankIndex,
        Tag::ExtraMatrixBank,
        Tag::TextField7,
        Tag::TextField8,
        Tag::KhronosTexture,
        Tag::TextField9,
        Tag::TextureFileReference,
        Tag::Unknown48,
        Tag::MovieClip6,
    ];

    /// Number of known ordinals
    pub const COUNT: usize = Self::ALL.len();

    /// Look up a wire ordinal; `None` for ordinals past the known range
    pub fn from_u8(value: u8) -> Option<Tag> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Tag::Texture
                | Tag::Texture2
                | Tag::Texture3
                | Tag::Texture4
                | Tag::Texture5
                | Tag::Texture6
                | Tag::Texture7
                | Tag::Texture8
                | Tag::KhronosTexture
                | Tag::TextureFileReference
        )
    }

    pub fn is_shape(self) -> bool {
        matches!(self, Tag::Shape | Tag::Shape2)
    }

    pub fn is_shape_draw_bitmap_command(self) -> bool {
        matches!(
            self,
            Tag::ShapeDrawBitmapCommand
                | Tag::ShapeDrawBitmapCommand2
                | Tag::ShapeDrawBitmapCommand3
        )
    }

    pub fn is_movie_clip(self) -> bool {
        matches!(
            self,
            Tag::MovieClip
                | Tag::MovieClip2
                | Tag::MovieClip3
                | Tag::MovieClip4
                | Tag::MovieClip5
                | Tag::MovieClip6
        )
    }

    pub fn is_movie_clip_frame(self) -> bool {
        matches!(self, Tag::MovieClipFrame | Tag::MovieClipFrame2)
    }

    pub fn is_movie_clip_modifier(self) -> bool {
        matches!(
            self,
            Tag::ModifierState2 | Tag::ModifierState3 | Tag::ModifierState4
        )
    }

    pub fn is_text_field(self) -> bool {
        matches!(
            self,
            Tag::TextField
                | Tag::TextField2
                | Tag::TextField3
                | Tag::TextField4
                | Tag::TextField5
                | Tag::TextField6
                | Tag::TextField7
                | Tag::TextField8
                | Tag::TextField9
        )
    }

    pub fn is_matrix(self) -> bool {
        matches!(self, Tag::Matrix | Tag::MatrixPrecise)
    }

    pub fn is_color_transform(self) -> bool {
        self == Tag::ColorTransform
    }

    /// Movie clip generations that carry one blend byte per child
    pub fn has_blend_data(self) -> bool {
        matches!(self, Tag::MovieClip3 | Tag::MovieClip5 | Tag::MovieClip6)
    }

    pub fn has_custom_properties(self) -> bool {
        self == Tag::MovieClip6
    }

    /// Texture generations whose pixels are stored in 32x32 tiles
    pub fn has_interlacing(self) -> bool {
        matches!(self, Tag::Texture5 | Tag::Texture6 | Tag::Texture7)
    }

    /// Filter quality hint the runtime attaches to a texture tag (0, 1 or 2)
    pub fn texture_filter(self) -> Option<u8> {
        match self {
            Tag::Texture | Tag::Texture4 | Tag::Texture5 | Tag::Texture6 => Some(1),
            Tag::Texture2 | Tag::Texture3 | Tag::Texture7 => Some(2),
            Tag::Texture8 | Tag::KhronosTexture | Tag::TextureFileReference => Some(0),
            _ => None,
        }
    }
}
