//! Load and save options
//!
//! Options are plain serde structs so tools can keep them in a TOML file next
//! to their other settings. Every field has a default, so an empty document is
//! a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScError};
use crate::stream::ByteReader;

/// Options controlling how a container is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Pick the low resolution texture of a flat texture set when both exist (default: true)
    #[serde(default = "default_true")]
    pub prefer_lowres: bool,
    /// Treat skippable unsupported records as errors (default: false)
    #[serde(default)]
    pub strict: bool,
    /// Follow the external texture sidecar when the container asks for it (default: true)
    #[serde(default = "default_true")]
    pub load_external_textures: bool,
    /// Suffix probed for the high resolution texture file (default: "_highres")
    #[serde(default = "default_highres_suffix")]
    pub highres_suffix: String,
    /// Suffix probed for the low resolution texture file (default: "_lowres")
    #[serde(default = "default_lowres_suffix")]
    pub lowres_suffix: String,
}

/// Options controlling how a container is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Force textures into (true) or out of (false) the sidecar file.
    /// `None` follows the container's own flag.
    #[serde(default)]
    pub external_textures: Option<bool>,
}

pub(crate) fn default_highres_suffix() -> String {
    "_highres".to_string()
}
pub(crate) fn default_lowres_suffix() -> String {
    "_lowres".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            prefer_lowres: default_true(),
            strict: false,
            load_external_textures: default_true(),
            highres_suffix: default_highres_suffix(),
            lowres_suffix: default_lowres_suffix(),
        }
    }
}

impl LoadOptions {
    /// Parse options from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ScError::Config(e.to_string()))
    }

    /// Serialize options to a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ScError::Config(e.to_string()))
    }

    /// Report an unsupported but skippable condition.
    ///
    /// Logs a warning and returns `Ok` in lenient mode; returns `error` in strict mode.
    pub(crate) fn tolerate(&self, error: ScError) -> Result<()> {
        if self.strict {
            return Err(error);
        }
        tracing::warn!(%error, "skipping unsupported data");
        Ok(())
    }

    /// Skip a record whose ordinal is past the tag catalog
    ///
    /// An empty one is rejected at any nesting level: the stream position
    /// cannot be trusted after it.
    pub(crate) fn skip_unknown(&self, tag: u8, body: &mut ByteReader<'_>) -> Result<()> {
        let length = body.remaining();
        if length == 0 {
            return Err(ScError::UnknownTag { tag });
        }
        self.tolerate(ScError::UnsupportedTag { tag, length })?;
        body.skip(length)
    }

    /// Skip a known record that has no meaning at this level
    pub(crate) fn skip_unsupported(&self, tag: u8, body: &mut ByteReader<'_>) -> Result<()> {
        let length = body.remaining();
        self.tolerate(ScError::UnsupportedTag { tag, length })?;
        body.skip(length)
    }
}

impl SaveOptions {
    pub(crate) fn external_textures_or(&self, container_flag: bool) -> bool {
        self.external_textures.unwrap_or(container_flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_options_default() {
        let options = LoadOptions::default();
        assert!(options.prefer_lowres);
        assert!(!options.strict);
        assert!(options.load_external_textures);
        assert_eq!(options.highres_suffix, "_highres");
        assert_eq!(options.lowres_suffix, "_lowres");
    }

    #[test]
    fn test_load_options_empty_toml() {
        let options = LoadOptions::from_toml_str("").unwrap();
        assert_eq!(options, LoadOptions::default());
    }

    #[test]
    fn test_load_options_partial_toml() {
        let toml_str = r#"
strict = true
lowres_suffix = "_lo"
"#;
        let options = LoadOptions::from_toml_str(toml_str).unwrap();
        assert!(options.strict);
        assert!(options.prefer_lowres); // default
        assert_eq!(options.lowres_suffix, "_lo");
        assert_eq!(options.highres_suffix, "_highres"); // default
    }

    #[test]
    fn test_load_options_roundtrip() {
        let options = LoadOptions {
            prefer_lowres: false,
            strict: true,
            load_external_textures: false,
            highres_suffix: "_hd".to_string(),
            lowres_suffix: "_sd".to_string(),
        };
        let toml_str = options.to_toml_string().unwrap();
        assert_eq!(LoadOptions::from_toml_str(&toml_str).unwrap(), options);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LoadOptions::from_toml_str("strict = \"yes\"").unwrap_err();
        assert!(matches!(err, ScError::Config(_)));
    }

    #[test]
    fn test_tolerate_respects_strict() {
        let lenient = LoadOptions::default();
        assert!(lenient.tolerate(ScError::UnknownTag { tag: 99 }).is_ok());

        let strict = LoadOptions {
            strict: true,
            ..LoadOptions::default()
        };
        assert!(strict.tolerate(ScError::UnknownTag { tag: 99 }).is_err());
    }

    #[test]
    fn test_save_options_follow_container() {
        assert!(SaveOptions::default().external_textures_or(true));
        let forced = SaveOptions {
            external_textures: Some(false),
        };
        assert!(!forced.external_textures_or(true));
    }
}
