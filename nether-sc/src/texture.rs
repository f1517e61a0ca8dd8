//! Textures: pixel formats, payload kinds and tile interlacing
//!
//! A texture record stores a small header (type, width, height) followed by one
//! of three payloads: raw pixels, an embedded KTX container, or the name of an
//! external compressed file. Main files that move textures into a sidecar keep
//! only the header.

use bytemuck::Pod;

use crate::error::{Result, ScError};
use crate::stream::{ByteReader, ByteWriter, MAX_STRING_LEN};
use crate::tag::Tag;

/// Edge length of one interlacing tile in pixels
pub const TILE_SIZE: usize = 32;

// =============================================================================
// GL enums
// =============================================================================

pub const GL_RGB: u32 = 6407;
pub const GL_RGBA: u32 = 6408;
pub const GL_LUMINANCE: u32 = 6409;
pub const GL_LUMINANCE_ALPHA: u32 = 6410;
pub const GL_UNSIGNED_BYTE: u32 = 5121;
pub const GL_UNSIGNED_SHORT_4_4_4_4: u32 = 32819;
pub const GL_UNSIGNED_SHORT_5_5_5_1: u32 = 32820;
pub const GL_UNSIGNED_SHORT_5_6_5: u32 = 33635;

/// Pixel format code stored in every texture header
///
/// Codes 1, 5, 7 and 9 share the layout of code 0 but are kept distinct so
/// that the byte written back is the byte that was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureType {
    Rgba8 = 0,
    Rgba8Reserved1 = 1,
    Rgba4 = 2,
    Rgb5A1 = 3,
    Rgb565 = 4,
    Rgba8Reserved5 = 5,
    LuminanceAlpha = 6,
    Rgba8Reserved7 = 7,
    Rgba4Alt = 8,
    Rgba8Reserved9 = 9,
    Luminance = 10,
}

impl TextureType {
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Rgba8,
            1 => Self::Rgba8Reserved1,
            2 => Self::Rgba4,
            3 => Self::Rgb5A1,
            4 => Self::Rgb565,
            5 => Self::Rgba8Reserved5,
            6 => Self::LuminanceAlpha,
            7 => Self::Rgba8Reserved7,
            8 => Self::Rgba4Alt,
            9 => Self::Rgba8Reserved9,
            10 => Self::Luminance,
            other => return Err(ScError::UnknownTextureType(other)),
        })
    }

    pub fn gl_format(self) -> u32 {
        match self {
            Self::Rgb565 => GL_RGB,
            Self::LuminanceAlpha => GL_LUMINANCE_ALPHA,
            Self::Luminance => GL_LUMINANCE,
            _ => GL_RGBA,
        }
    }

    pub fn gl_type(self) -> u32 {
        match self {
            Self::Rgba4 | Self::Rgba4Alt => GL_UNSIGNED_SHORT_4_4_4_4,
            Self::Rgb5A1 => GL_UNSIGNED_SHORT_5_5_5_1,
            Self::Rgb565 => GL_UNSIGNED_SHORT_5_6_5,
            _ => GL_UNSIGNED_BYTE,
        }
    }

    /// Bytes per pixel: 1, 2 or 4
    pub fn pixel_bytes(self) -> usize {
        match self {
            Self::Luminance => 1,
            Self::Rgba4 | Self::Rgb5A1 | Self::Rgb565 | Self::LuminanceAlpha | Self::Rgba4Alt => 2,
            _ => 4,
        }
    }
}

// =============================================================================
// Pixel storage
// =============================================================================

/// Row-major pixel data, one element per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl PixelBuffer {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(pixels) => pixels.len(),
            Self::U16(pixels) => pixels.len(),
            Self::U32(pixels) => pixels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_bytes(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    fn read(
        reader: &mut ByteReader<'_>,
        pixel_bytes: usize,
        width: usize,
        height: usize,
        interlaced: bool,
    ) -> Result<Self> {
        let count = width * height;
        let buffer = match pixel_bytes {
            1 => Self::U8(reader.read_bytes(count)?.to_vec()),
            2 => Self::U16(reader.read_u16_array(count)?),
            _ => Self::U32(reader.read_u32_array(count)?),
        };
        if !interlaced {
            return Ok(buffer);
        }
        Ok(match buffer {
            Self::U8(tiled) => Self::U8(deinterlace(&tiled, width, height)),
            Self::U16(tiled) => Self::U16(deinterlace(&tiled, width, height)),
            Self::U32(tiled) => Self::U32(deinterlace(&tiled, width, height)),
        })
    }

    fn write(&self, writer: &mut ByteWriter, width: usize, height: usize, interlaced: bool) {
        match self {
            Self::U8(pixels) if interlaced => writer.write_bytes(&interlace(pixels, width, height)),
            Self::U8(pixels) => writer.write_bytes(pixels),
            Self::U16(pixels) if interlaced => {
                writer.write_u16_array(&interlace(pixels, width, height))
            }
            Self::U16(pixels) => writer.write_u16_array(pixels),
            Self::U32(pixels) if interlaced => {
                writer.write_u32_array(&interlace(pixels, width, height))
            }
            Self::U32(pixels) => writer.write_u32_array(pixels),
        }
    }
}

/// Row-major index of every pixel, in tile storage order.
///
/// Tiles run left to right, top to bottom; edge tiles are clipped to the image
/// and may be empty.
fn tiled_indices(width: usize, height: usize) -> impl Iterator<Item = usize> {
    let tiles_x = width / TILE_SIZE + 1;
    let tiles_y = height / TILE_SIZE + 1;

    (0..tiles_y).flat_map(move |tile_y| {
        (0..tiles_x).flat_map(move |tile_x| {
            let tile_width = (width - tile_x * TILE_SIZE).min(TILE_SIZE);
            let tile_height = (height - tile_y * TILE_SIZE).min(TILE_SIZE);
            (0..tile_height).flat_map(move |y| {
                let row = (tile_y * TILE_SIZE + y) * width + tile_x * TILE_SIZE;
                (0..tile_width).map(move |x| row + x)
            })
        })
    })
}

/// Reorder row-major pixels into 32x32 tile order
pub fn interlace<T: Pod>(pixels: &[T], width: usize, height: usize) -> Vec<T> {
    tiled_indices(width, height).map(|index| pixels[index]).collect()
}

/// Reorder tile-ordered pixels back into rows
pub fn deinterlace<T: Pod>(tiled: &[T], width: usize, height: usize) -> Vec<T> {
    let mut pixels = vec![T::zeroed(); width * height];
    for (&pixel, index) in tiled.iter().zip(tiled_indices(width, height)) {
        pixels[index] = pixel;
    }
    pixels
}

// =============================================================================
// Texture
// =============================================================================

/// Payload carried after the texture header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureData {
    /// Header only; the pixels live in the sidecar file.
    /// `ktx_length` is the declared KTX size for KHRONOS_TEXTURE records, else 0.
    Header { ktx_length: u32 },
    Pixels(PixelBuffer),
    Ktx(Vec<u8>),
    FileReference(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    tag: Tag,
    texture_type: TextureType,
    width: u16,
    height: u16,
    data: TextureData,
    mipmap_tail: Vec<u8>,
    index: Option<usize>,
}

impl Texture {
    pub fn builder(texture_type: TextureType, width: u16, height: u16) -> TextureBuilder {
        TextureBuilder {
            tag: None,
            texture_type,
            width,
            height,
            data: None,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn data(&self) -> &TextureData {
        &self.data
    }

    /// Bytes stored after the base level (mip levels of TEXTURE_3 and friends)
    pub fn mipmap_tail(&self) -> &[u8] {
        &self.mipmap_tail
    }

    /// Position in the owning container's texture list, once attached
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    pub fn has_pixel_data(&self) -> bool {
        !matches!(self.data, TextureData::Header { .. })
    }

    /// Decode a texture record window.
    ///
    /// With `has_data` false only the header is read. Whatever follows the
    /// payload inside the window is kept as the mip tail.
    pub fn read(reader: &mut ByteReader<'_>, tag: Tag, has_data: bool) -> Result<Self> {
        if !tag.is_texture() {
            return Err(ScError::UnexpectedTag {
                tag: tag as u8,
                context: "texture dispatch",
            });
        }

        let mut ktx_length = 0u32;
        if tag == Tag::KhronosTexture {
            let length = reader.read_i32()?;
            ktx_length = u32::try_from(length).map_err(|_| ScError::NegativeLength {
                tag: tag as u8,
                length,
            })?;
        }

        let filename = if tag == Tag::TextureFileReference {
            let name = reader.read_ascii()?.filter(|name| !name.is_empty());
            Some(name.ok_or(ScError::MissingTextureFilename)?)
        } else {
            None
        };

        let texture_type = TextureType::from_u8(reader.read_u8()?)?;
        let width = reader.read_u16()?;
        let height = reader.read_u16()?;

        let data = match filename {
            Some(name) => TextureData::FileReference(name),
            None if !has_data => TextureData::Header { ktx_length },
            None if tag == Tag::KhronosTexture => {
                TextureData::Ktx(reader.read_bytes(ktx_length as usize)?.to_vec())
            }
            None => TextureData::Pixels(PixelBuffer::read(
                reader,
                texture_type.pixel_bytes(),
                width as usize,
                height as usize,
                tag.has_interlacing(),
            )?),
        };

        let mipmap_tail = reader.read_bytes(reader.remaining())?.to_vec();
        if !mipmap_tail.is_empty() {
            tracing::trace!(?tag, bytes = mipmap_tail.len(), "keeping texture tail");
        }

        Ok(Texture {
            tag,
            texture_type,
            width,
            height,
            data,
            mipmap_tail,
            index: None,
        })
    }

    /// Encode the record payload; `with_data` false writes only the header
    pub fn write(&self, writer: &mut ByteWriter, with_data: bool) -> Result<()> {
        if self.tag == Tag::KhronosTexture {
            let length = match &self.data {
                TextureData::Ktx(bytes) => bytes.len(),
                TextureData::Header { ktx_length } => *ktx_length as usize,
                _ => 0,
            };
            let length = i32::try_from(length)
                .map_err(|_| ScError::invalid("texture", "KTX payload exceeds 2 GiB"))?;
            writer.write_i32(length);
        }
        if let TextureData::FileReference(name) = &self.data {
            writer.write_ascii(Some(name))?;
        }

        writer.write_u8(self.texture_type as u8);
        writer.write_u16(self.width);
        writer.write_u16(self.height);

        if !with_data {
            return Ok(());
        }

        match &self.data {
            TextureData::Header { .. } => {
                return Err(ScError::invalid(
                    "texture",
                    "pixel data was not loaded and cannot be written inline",
                ));
            }
            TextureData::Pixels(pixels) => pixels.write(
                writer,
                self.width as usize,
                self.height as usize,
                self.tag.has_interlacing(),
            ),
            TextureData::Ktx(bytes) => writer.write_bytes(bytes),
            TextureData::FileReference(_) => {}
        }
        writer.write_bytes(&self.mipmap_tail);
        Ok(())
    }
}

/// Incremental [`Texture`] construction
#[derive(Debug)]
pub struct TextureBuilder {
    tag: Option<Tag>,
    texture_type: TextureType,
    width: u16,
    height: u16,
    data: Option<TextureData>,
}

impl TextureBuilder {
    /// Record generation for pixel textures (defaults to TEXTURE)
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn pixels(mut self, pixels: PixelBuffer) -> Self {
        self.data = Some(TextureData::Pixels(pixels));
        self
    }

    pub fn ktx(mut self, data: Vec<u8>) -> Self {
        self.data = Some(TextureData::Ktx(data));
        self
    }

    pub fn file_reference(mut self, name: impl Into<String>) -> Self {
        self.data = Some(TextureData::FileReference(name.into()));
        self
    }

    pub fn build(self) -> Result<Texture> {
        let data = self
            .data
            .ok_or_else(|| ScError::invalid("texture", "no pixels, KTX data or file reference"))?;

        let payload_tag = match &data {
            TextureData::Ktx(_) => Some(Tag::KhronosTexture),
            TextureData::FileReference(_) => Some(Tag::TextureFileReference),
            _ => None,
        };
        let tag = match (payload_tag, self.tag) {
            (Some(required), Some(given)) if required != given => {
                return Err(ScError::invalid(
                    "texture",
                    format!("{given:?} cannot carry a {required:?} payload"),
                ));
            }
            (Some(required), _) => required,
            (None, Some(given)) => given,
            (None, None) => Tag::Texture,
        };
        if !tag.is_texture() {
            return Err(ScError::invalid("texture", format!("{tag:?} is not a texture tag")));
        }

        match &data {
            TextureData::Pixels(pixels) => {
                if matches!(tag, Tag::KhronosTexture | Tag::TextureFileReference) {
                    return Err(ScError::invalid(
                        "texture",
                        format!("{tag:?} cannot carry raw pixels"),
                    ));
                }
                if pixels.element_bytes() != self.texture_type.pixel_bytes() {
                    return Err(ScError::invalid(
                        "texture",
                        format!(
                            "{:?} needs {} bytes per pixel, got {}",
                            self.texture_type,
                            self.texture_type.pixel_bytes(),
                            pixels.element_bytes()
                        ),
                    ));
                }
                let expected = self.width as usize * self.height as usize;
                if pixels.len() != expected {
                    return Err(ScError::invalid(
                        "texture",
                        format!("expected {expected} pixels, got {}", pixels.len()),
                    ));
                }
            }
            TextureData::FileReference(name) => {
                if name.is_empty() {
                    return Err(ScError::MissingTextureFilename);
                }
                if name.len() > MAX_STRING_LEN {
                    return Err(ScError::StringTooLong { len: name.len() });
                }
            }
            _ => {}
        }

        Ok(Texture {
            tag,
            texture_type: self.texture_type,
            width: self.width,
            height: self.height,
            data,
            mipmap_tail: Vec::new(),
            index: None,
        })
    }
}
