//! Transform and geometry primitives shared by the codecs

use glam::{Affine2, Vec2};

use crate::error::Result;
use crate::stream::{ByteReader, ByteWriter, TWIPS_PER_UNIT};
use crate::tag::Tag;

// ============================================================================
// Matrix quantization
// ============================================================================

/// Scale of the a/b/c/d components in MATRIX records and quantized matrices
pub const DEFAULT_MULTIPLIER: f32 = 1024.0;

/// Scale of the a/b/c/d components in MATRIX_PRECISE records
pub const PRECISE_MULTIPLIER: f32 = 65535.0;

/// Non-zero components below this magnitude need the precise encoding
pub const PRECISE_THRESHOLD: f32 = 0.0009765;

/// 2D affine transform
///
/// ```text
/// a c x
/// b d y
/// ```
///
/// A point maps to `(x*a + y*c + tx, x*b + y*d + ty)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2x3 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub x: f32,
    pub y: f32,
}

impl Default for Matrix2x3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Result of [`Matrix2x3::decompose`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecomposedMatrix {
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub x: f64,
    pub y: f64,
}

impl DecomposedMatrix {
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees()
    }
}

impl Matrix2x3 {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        x: 0.0,
        y: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, x: f32, y: f32) -> Self {
        Self { a, b, c, d, x, y }
    }

    /// Build from quantized 16-bit components (a-d in 1/1024, x/y in twips)
    pub fn from_quantized(values: [i16; 6]) -> Self {
        let [a, b, c, d, x, y] = values;
        Self {
            a: a as f32 / DEFAULT_MULTIPLIER,
            b: b as f32 / DEFAULT_MULTIPLIER,
            c: c as f32 / DEFAULT_MULTIPLIER,
            d: d as f32 / DEFAULT_MULTIPLIER,
            x: x as f32 / TWIPS_PER_UNIT,
            y: y as f32 / TWIPS_PER_UNIT,
        }
    }

    /// Decode a MATRIX or MATRIX_PRECISE payload
    pub fn read(reader: &mut ByteReader<'_>, precise: bool) -> Result<Self> {
        let divider = if precise {
            PRECISE_MULTIPLIER
        } else {
            DEFAULT_MULTIPLIER
        };
        Ok(Self {
            a: reader.read_i32()? as f32 / divider,
            b: reader.read_i32()? as f32 / divider,
            c: reader.read_i32()? as f32 / divider,
            d: reader.read_i32()? as f32 / divider,
            x: reader.read_twip()?,
            y: reader.read_twip()?,
        })
    }

    /// Encode the payload matching [`Matrix2x3::tag`]
    pub fn write(&self, writer: &mut ByteWriter) {
        let multiplier = if self.is_precise() {
            PRECISE_MULTIPLIER
        } else {
            DEFAULT_MULTIPLIER
        };
        for value in [self.a, self.b, self.c, self.d] {
            writer.write_i32((value * multiplier).round() as i32);
        }
        writer.write_twip(self.x);
        writer.write_twip(self.y);
    }

    /// Whether the linear part needs the 1/65535 encoding
    ///
    /// True when a non-zero component is below [`PRECISE_THRESHOLD`] or is not a
    /// whole number of 1/1024 steps.
    pub fn is_precise(&self) -> bool {
        [self.a, self.b, self.c, self.d].iter().any(|&value| {
            let scaled = value * DEFAULT_MULTIPLIER;
            (value != 0.0 && value.abs() < PRECISE_THRESHOLD) || scaled.fract() != 0.0
        })
    }

    pub fn tag(&self) -> Tag {
        if self.is_precise() {
            Tag::MatrixPrecise
        } else {
            Tag::Matrix
        }
    }

    pub fn determinant(&self) -> f32 {
        self.d * self.a - self.c * self.b
    }

    /// Concatenate: apply `self` first, then `other`
    pub fn multiply(&mut self, other: &Matrix2x3) {
        let a = self.a * other.a + self.b * other.c;
        let b = self.a * other.b + self.b * other.d;
        let c = self.d * other.c + self.c * other.a;
        let d = self.d * other.d + self.c * other.b;
        let x = other.apply_x(self.x, self.y);
        let y = other.apply_y(self.x, self.y);
        *self = Self { a, b, c, d, x, y };
    }

    pub fn apply_x(&self, x: f32, y: f32) -> f32 {
        x * self.a + y * self.c + self.x
    }

    pub fn apply_y(&self, x: f32, y: f32) -> f32 {
        y * self.d + x * self.b + self.y
    }

    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.to_affine2().transform_point2(point)
    }

    pub fn to_affine2(&self) -> Affine2 {
        Affine2::from_cols_array(&[self.a, self.b, self.c, self.d, self.x, self.y])
    }

    /// Invert in place; singular matrices are left untouched
    pub fn inverse(&mut self) {
        let determinant = self.determinant();
        if determinant == 0.0 {
            return;
        }
        let Self { a, b, c, d, x, y } = *self;
        self.x = (y * c - x * d) / determinant;
        self.y = (x * b - y * a) / determinant;
        self.a = d / determinant;
        self.b = -b / determinant;
        self.c = -c / determinant;
        self.d = a / determinant;
    }

    pub fn rotate(&mut self, degrees: f32) {
        self.rotate_radians(degrees.to_radians());
    }

    pub fn rotate_radians(&mut self, angle: f32) {
        let (sin, cos) = angle.sin_cos();
        let a = self.a * cos + self.b * sin;
        let b = self.a * -sin + self.b * cos;
        let c = self.c * cos + self.d * sin;
        let d = self.c * -sin + self.d * cos;
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
    }

    /// Replace the linear part with a rotation plus scale
    pub fn set_rotation(&mut self, degrees: f32, scale_x: f32, scale_y: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        self.a = cos * scale_x;
        self.b = -(sin * scale_y);
        self.c = sin * scale_x;
        self.d = cos * scale_y;
    }

    pub fn scale(&mut self, scale_x: f32, scale_y: f32) {
        self.a *= scale_x;
        self.b *= scale_y;
        self.c *= scale_x;
        self.d *= scale_y;
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.x += x;
        self.y += y;
    }

    pub fn decompose(&self) -> DecomposedMatrix {
        let (a, b, c, d) = (self.a as f64, self.b as f64, self.c as f64, self.d as f64);
        let scale_x = a.hypot(b);
        let rotation = b.atan2(a);
        let (sin, cos) = rotation.sin_cos();
        // sin is rarely exactly zero in double precision
        let scale_y = if sin.abs() > 0.01 { c / sin } else { d / cos };
        DecomposedMatrix {
            scale_x,
            scale_y,
            rotation,
            x: self.x as f64,
            y: self.y as f64,
        }
    }
}

/// Per-channel color multiply/add
///
/// Defaults to the no-op transform: multipliers and alpha 255, additions 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTransform {
    pub red_add: u8,
    pub green_add: u8,
    pub blue_add: u8,
    pub alpha: u8,
    pub red_mul: u8,
    pub green_mul: u8,
    pub blue_mul: u8,
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorTransform {
    pub const IDENTITY: Self = Self {
        red_add: 0,
        green_add: 0,
        blue_add: 0,
        alpha: 0xFF,
        red_mul: 0xFF,
        green_mul: 0xFF,
        blue_mul: 0xFF,
    };

    /// Build from multipliers first, as the table formats store them
    pub fn from_multipliers(
        red_mul: u8,
        green_mul: u8,
        blue_mul: u8,
        alpha: u8,
        red_add: u8,
        green_add: u8,
        blue_add: u8,
    ) -> Self {
        Self {
            red_add,
            green_add,
            blue_add,
            alpha,
            red_mul,
            green_mul,
            blue_mul,
        }
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            red_add: reader.read_u8()?,
            green_add: reader.read_u8()?,
            blue_add: reader.read_u8()?,
            alpha: reader.read_u8()?,
            red_mul: reader.read_u8()?,
            green_mul: reader.read_u8()?,
            blue_mul: reader.read_u8()?,
        })
    }

    pub fn write(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&[
            self.red_add,
            self.green_add,
            self.blue_add,
            self.alpha,
            self.red_mul,
            self.green_mul,
            self.blue_mul,
        ]);
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Combine with a parent transform, clamping every channel to 0..=255
    pub fn multiply(&mut self, other: &ColorTransform) {
        fn scale(lhs: u8, rhs: u8) -> u8 {
            (lhs as f32 * rhs as f32 / 255.0).clamp(0.0, 255.0) as u8
        }
        self.red_mul = scale(self.red_mul, other.red_mul);
        self.green_mul = scale(self.green_mul, other.green_mul);
        self.blue_mul = scale(self.blue_mul, other.blue_mul);
        self.alpha = scale(self.alpha, other.alpha);
        self.red_add = self.red_add.saturating_add(other.red_add);
        self.green_add = self.green_add.saturating_add(other.green_add);
        self.blue_add = self.blue_add.saturating_add(other.blue_add);
    }
}

/// Float rectangle given by its edges
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_sizes(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn add_point(&mut self, x: f32, y: f32) {
        self.left = self.left.min(x);
        self.right = self.right.max(x);
        self.top = self.top.min(y);
        self.bottom = self.bottom.max(y);
    }

    pub fn merge(&mut self, other: &Rect) {
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }
}

/// Integer rectangle used for text field bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortRect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

impl ShortRect {
    pub fn new(left: i16, top: i16, right: i16, bottom: i16) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Round to a fixed number of decimal places
pub(crate) fn round_to(value: f32, places: i32) -> f32 {
    let factor = 10f32.powi(places);
    (value * factor).round() / factor
}
