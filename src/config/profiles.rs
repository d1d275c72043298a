//! Conversion profiles for common use cases

use serde::{Deserialize, Serialize};

use crate::config::{validate_quality, DEFAULT_QUALITY};
use crate::error::{ConvertError, Result};
use crate::processing::formats::normalize_format;
use crate::processing::{ConversionSettings, ResizeRequest};

/// A named preset: how to resize, which format to write, at what quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProfile {
    /// How to resize the image
    #[serde(default)]
    pub resize: ResizeRequest,

    /// Output format (None = keep the source format)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Output quality (1-100, JPEG only)
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl ConversionProfile {
    /// Create a profile with the given resize request, source format and default quality
    pub fn new(resize: ResizeRequest) -> Self {
        Self {
            resize,
            format: None,
            quality: DEFAULT_QUALITY,
        }
    }

    /// Set the output quality
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set the output format
    pub fn format<S: Into<String>>(mut self, format: S) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Validate the profile configuration
    pub fn validate(&self) -> Result<()> {
        validate_quality(self.quality)?;
        self.resize.validate()?;

        if let Some(format) = &self.format {
            normalize_format(format).map_err(|_| {
                ConvertError::config(format!("Unsupported output format: {}", format))
            })?;
        }

        Ok(())
    }

    /// Settings for the single-file converter
    pub fn to_settings(&self) -> ConversionSettings {
        ConversionSettings {
            resize: self.resize,
            format: self.format.clone(),
            quality: self.quality,
        }
    }
}

/// Predefined profiles shipped in the default configuration
pub struct Profiles;

impl Profiles {
    /// Web delivery: 1920px wide JPEG
    pub fn web() -> ConversionProfile {
        ConversionProfile::new(ResizeRequest::width(1920))
            .format("jpeg")
            .quality(85)
    }

    /// Thumbnails that fit a 300x300 box
    pub fn thumbnail() -> ConversionProfile {
        ConversionProfile::new(ResizeRequest::fit(300, 300))
            .format("webp")
            .quality(80)
    }

    /// Email attachments (small file size)
    pub fn email() -> ConversionProfile {
        ConversionProfile::new(ResizeRequest::width(800))
            .format("jpeg")
            .quality(70)
    }

    /// Lossless copy at half size
    pub fn half() -> ConversionProfile {
        ConversionProfile::new(ResizeRequest::scale(0.5)).format("png")
    }

    /// Get all predefined profiles
    pub fn all() -> std::collections::HashMap<String, ConversionProfile> {
        let mut profiles = std::collections::HashMap::new();
        profiles.insert("web".to_string(), Self::web());
        profiles.insert("thumbnail".to_string(), Self::thumbnail());
        profiles.insert("email".to_string(), Self::email());
        profiles.insert("half".to_string(), Self::half());
        profiles
    }
}
