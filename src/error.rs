//! Error types and handling for imgbatch

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for imgbatch operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Main error type for imgbatch operations
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Invalid or contradictory options, detected before any file is touched
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The file could not be read or is not a decodable image
    #[error("failed to decode image: {message}")]
    Decode { message: String, file: PathBuf },

    /// Output format is unsupported or could not be derived from the extension
    #[error("unsupported image format: {format}")]
    Format {
        format: String,
        file: Option<PathBuf>,
    },

    /// Encoding or writing the output file failed
    #[error("failed to encode image: {message}")]
    Encode {
        message: String,
        file: Option<PathBuf>,
    },

    /// Requested geometry collapses an axis to zero pixels or exceeds the output limits
    #[error("resize would produce an unusable {width}x{height} image")]
    DegenerateSize { width: u32, height: u32 },

    /// A worker stopped before producing an outcome (panic or cancelled task)
    #[error("worker failed: {message}")]
    Worker {
        message: String,
        file: Option<PathBuf>,
    },

    /// The input directory could not be listed
    #[error("failed to scan directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(String),
}

impl ConvertError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new decode error for `file`
    pub fn decode<S: Into<String>>(message: S, file: &Path) -> Self {
        Self::Decode {
            message: message.into(),
            file: file.to_path_buf(),
        }
    }

    /// Create a new unsupported format error
    pub fn format<S: Into<String>>(format: S, file: Option<PathBuf>) -> Self {
        Self::Format {
            format: format.into(),
            file,
        }
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::Encode {
            message: message.into(),
            file,
        }
    }

    /// Check if this error is recoverable (the batch can continue with the next file)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Decode { .. }
            | Self::Format { .. }
            | Self::Encode { .. }
            | Self::DegenerateSize { .. }
            | Self::Worker { .. }
            | Self::Io(_) => true,

            Self::Config { .. } | Self::Scan { .. } | Self::Serde(_) => false,
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::Decode { file, .. } => Some(file),
            Self::Format { file, .. } | Self::Encode { file, .. } | Self::Worker { file, .. } => {
                file.as_deref()
            }
            Self::Scan { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ConvertError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serde(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for ConvertError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serde(format!("YAML parsing error: {}", err))
    }
}
