//! Error types for SC container decoding and encoding

use std::io;
use std::path::PathBuf;

/// Broad failure category, used by callers to pick a remedy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes violate the format; the file is corrupt
    StructuralCorruption,
    /// The bytes use a record or option this codec does not handle
    UnsupportedFeature,
    /// A primary or sidecar file could not be read
    ResourceUnavailable,
    /// The caller built an entity that cannot be encoded
    EncodingMisuse,
}

/// Errors that can occur when reading or writing SC containers
#[derive(Debug, thiserror::Error)]
pub enum ScError {
    #[error("unexpected end of data at offset {offset}: need {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("negative record length {length} for tag {tag}")]
    NegativeLength { tag: u8, length: i32 },

    #[error("record {tag} declared {declared} bytes but {consumed} were consumed")]
    LengthMismatch {
        tag: u8,
        declared: usize,
        consumed: usize,
    },

    #[error("unknown tag {tag} with empty payload, stream position cannot be trusted")]
    UnknownTag { tag: u8 },

    #[error("unsupported tag {tag} ({length} bytes)")]
    UnsupportedTag { tag: u8, length: usize },

    #[error("unexpected tag {tag} inside {context}")]
    UnexpectedTag { tag: u8, context: &'static str },

    #[error("trying to load too many {kind}")]
    TooManyObjects { kind: &'static str },

    #[error("didn't load the whole stream: {kind} loaded {loaded} of {expected}")]
    IncompleteStream {
        kind: &'static str,
        loaded: usize,
        expected: usize,
    },

    #[error("unable to find MovieClip id {id} needed by export name {name}")]
    UnresolvedExport { id: u16, name: String },

    #[error("unable to find display object id {child_id} needed by MovieClip {clip_id}")]
    UnresolvedChild { clip_id: u16, child_id: u16 },

    #[error("MovieClip {clip_id} frame {frame}: {reason}")]
    InvalidFrameElement {
        clip_id: u16,
        frame: usize,
        reason: String,
    },

    #[error("multiple scaling grids in MovieClip {clip_id}")]
    MultipleScalingGrids { clip_id: u16 },

    #[error("MovieClip {clip_id} must have at least one frame")]
    MissingFrames { clip_id: u16 },

    #[error("MovieClip {clip_id} declares {declared} frames but {loaded} were loaded")]
    FrameCountMismatch {
        clip_id: u16,
        declared: usize,
        loaded: usize,
    },

    #[error("MovieClip {clip_id} references more frame elements than it declares")]
    FrameElementOverflow { clip_id: u16 },

    #[error("unsupported custom property type {0}")]
    UnsupportedCustomProperty(u8),

    #[error("invalid matrix delta flag {flag:#06x} in block {block}")]
    InvalidDeltaFlag { block: usize, flag: u16 },

    #[error("matrix index {index} out of range for a bank of {count} matrices")]
    MatrixIndexOutOfRange { index: usize, count: usize },

    #[error("unknown texture type {0}")]
    UnknownTextureType(u8),

    #[error("texture file reference cannot be empty")]
    MissingTextureFilename,

    #[error("texture set {index} doesn't contain any textures")]
    NoTexturesInSet { index: usize },

    #[error("string reference {0} out of range")]
    InvalidStringRef(u32),

    /// An export whose name is absent (the 255 string sentinel, or string
    /// ref 0 in flat tables). Rejected rather than kept as a nameless export,
    /// since an export is only reachable by name.
    #[error("export name not found for MovieClip id {id}")]
    MissingExportName { id: u16 },

    #[error("export ids ({ids}) and name ids ({names}) count must be equal")]
    ExportCountMismatch { ids: usize, names: usize },

    #[error("invalid table data: {0}")]
    InvalidTable(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("flat containers need a table reader")]
    MissingTableReader,

    #[error("flat containers need a decompressor")]
    MissingDecompressor,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("texture file not found: {path}")]
    TextureFileNotFound { path: PathBuf },

    #[error("string of {len} bytes doesn't fit a length byte (max 254)")]
    StringTooLong { len: usize },

    #[error("invalid {entity}: {reason}")]
    InvalidEntity {
        entity: &'static str,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedTag { .. }
            | Self::UnsupportedCustomProperty(_)
            | Self::MissingTableReader
            | Self::MissingDecompressor => ErrorKind::UnsupportedFeature,
            Self::Io { .. } | Self::TextureFileNotFound { .. } => ErrorKind::ResourceUnavailable,
            Self::StringTooLong { .. } | Self::InvalidEntity { .. } | Self::Config(_) => {
                ErrorKind::EncodingMisuse
            }
            _ => ErrorKind::StructuralCorruption,
        }
    }

    pub(crate) fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ScError>;
