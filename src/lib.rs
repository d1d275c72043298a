//! imgbatch - Concurrent Batch Image Converter
//!
//! Converts every image in a directory: decode, optionally resize (by scale
//! factor or bounding pixel dimensions, aspect ratio preserved), optionally
//! re-encode to another format, and write the result to an output directory.
//! Individual file failures are recorded and the batch carries on.
//!
//! # Features
//!
//! - **Bounded Parallelism**: Fixed-size admission gate, defaults to the CPU count
//! - **Failure Isolation**: Per-file errors become outcomes, never aborts
//! - **Deterministic Geometry**: Round-half-away-from-zero resize arithmetic
//! - **Format Support**: JPEG, PNG, WebP, GIF, BMP
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//! use imgbatch::{BatchCoordinator, ConversionSettings, Converter, ResizeRequest};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let settings = ConversionSettings {
//!     resize: ResizeRequest::scale(0.5),
//!     format: Some("jpeg".to_string()),
//!     ..Default::default()
//! };
//!
//! let coordinator = BatchCoordinator::new(4);
//! let stats = coordinator
//!     .run(
//!         vec![PathBuf::from("photos/a.png")],
//!         Path::new("out"),
//!         Arc::new(Converter::new(settings)),
//!     )
//!     .await;
//!
//! println!("{} converted, {} failed", stats.success, stats.failed);
//! # });
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filesystem;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{Config, ConversionProfile, ImageFormat};
pub use error::{ConvertError, Result};
pub use filesystem::{DirectoryLister, FileClassifier, FsScanner};
pub use parallel::{BatchCoordinator, BatchPhase, BatchStats, CancellationFlag, ExecutionStrategy};
pub use processing::{
    compute_output_size, ConversionOutcome, ConversionSettings, Converter, Dimensions,
    FileConverter, ResizeRequest,
};

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this more than
/// once is harmless; only the first call installs a subscriber.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        debug!("imgbatch v{} logging initialized", VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging("debug", false);
        init_logging("info", true);
        init_logging("not a level !!", false);
    }
}
