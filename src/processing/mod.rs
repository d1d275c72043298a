//! Single-file conversion: decode, resize, re-encode, write

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::DEFAULT_QUALITY;
use crate::error::{ConvertError, Result};

pub mod codec;
pub mod formats;
pub mod resize;

pub use codec::*;
pub use formats::*;
pub use resize::*;

/// What to do with every file in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSettings {
    pub resize: ResizeRequest,
    /// Explicit output format name (None = keep the source format)
    pub format: Option<String>,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            resize: ResizeRequest::none(),
            format: None,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Result of converting one file. Produced exactly once per processable file.
#[derive(Debug)]
pub enum ConversionOutcome {
    Success {
        source_path: PathBuf,
        output_path: PathBuf,
    },
    Failure {
        source_path: PathBuf,
        cause: ConvertError,
    },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn source_path(&self) -> &Path {
        match self {
            Self::Success { source_path, .. } | Self::Failure { source_path, .. } => source_path,
        }
    }
}

/// Per-file conversion step invoked by the batch coordinator
pub trait FileConverter: Send + Sync {
    /// Convert `source` into `output_dir`. Never panics on bad input; every
    /// failure is reported through the returned outcome.
    fn convert(&self, source: &Path, output_dir: &Path) -> ConversionOutcome;
}

/// Converter for a single file using a shared [`Codec`]
pub struct Converter {
    codec: Arc<dyn Codec>,
    settings: ConversionSettings,
}

impl Converter {
    /// Create a converter backed by the `image` crate codec
    pub fn new(settings: ConversionSettings) -> Self {
        Self::with_codec(Arc::new(ImageCodec::new()), settings)
    }

    /// Create a converter with a custom codec
    pub fn with_codec(codec: Arc<dyn Codec>, settings: ConversionSettings) -> Self {
        Self { codec, settings }
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    fn try_convert(&self, source: &Path, output_dir: &Path) -> Result<PathBuf> {
        let start_time = Instant::now();

        let image = self.codec.decode(source)?;
        let (src_width, src_height) = (image.width(), image.height());

        let target = compute_output_size(src_width, src_height, &self.settings.resize);
        if target.is_degenerate() || target.is_oversized() {
            return Err(ConvertError::DegenerateSize {
                width: target.width,
                height: target.height,
            });
        }

        let image = if target == Dimensions::new(src_width, src_height) {
            debug!("No resize needed for {:?}", source);
            image
        } else {
            debug!(
                "Resizing {:?}: {}x{} -> {}",
                source, src_width, src_height, target
            );
            self.codec.resample(image, target)
        };

        let format = resolve_output_format(source, self.settings.format.as_deref())
            .map_err(|e| match e {
                ConvertError::Format { format, .. } => {
                    ConvertError::format(format, Some(source.to_path_buf()))
                }
                other => other,
            })?;
        let output_path = build_output_path(source, output_dir, format);

        let bytes = self
            .codec
            .encode(&image, format, self.settings.quality)
            .map_err(|e| match e {
                ConvertError::Encode { message, .. } => {
                    ConvertError::encode(message, Some(output_path.clone()))
                }
                other => other,
            })?;

        std::fs::write(&output_path, &bytes).map_err(|e| {
            ConvertError::encode(
                format!("failed to write {}: {}", output_path.display(), e),
                Some(output_path.clone()),
            )
        })?;

        debug!(
            "Wrote {:?} ({} bytes, {}) in {:.2}s",
            output_path,
            bytes.len(),
            format,
            start_time.elapsed().as_secs_f64()
        );

        Ok(output_path)
    }
}

impl FileConverter for Converter {
    fn convert(&self, source: &Path, output_dir: &Path) -> ConversionOutcome {
        match self.try_convert(source, output_dir) {
            Ok(output_path) => ConversionOutcome::Success {
                source_path: source.to_path_buf(),
                output_path,
            },
            Err(cause) => ConversionOutcome::Failure {
                source_path: source.to_path_buf(),
                cause,
            },
        }
    }
}
