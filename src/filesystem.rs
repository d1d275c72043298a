//! Directory scanning, file classification and directory checks

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};
use crate::processing::formats::is_supported_input_format;

const WRITE_PROBE: &str = ".imgbatch_write_test";

/// Decides whether a path should be handed to the converter
pub trait FileClassifier: Send + Sync {
    fn is_image_file(&self, path: &Path) -> bool;
}

/// Lists the files of an input directory
pub trait DirectoryLister: Send + Sync {
    /// Regular files directly inside `dir`, in a stable order. Subdirectories are not entered.
    fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Filesystem-backed classifier and lister
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScanner;

impl FileClassifier for FsScanner {
    fn is_image_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, is_supported_input_format)
    }
}

impl DirectoryLister for FsScanner {
    fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // An unreadable entry (e.g. a dangling symlink) is listed and
                // fails on its own in the converter; only the root is fatal.
                Err(e) if e.depth() > 0 && e.path().is_some() => {
                    if let Some(path) = e.path() {
                        warn!("Cannot stat {:?}: {}", path, e);
                        files.push(path.to_path_buf());
                    }
                    continue;
                }
                Err(e) => {
                    return Err(ConvertError::Scan {
                        path: dir.to_path_buf(),
                        source: e.into(),
                    })
                }
            };

            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        debug!("Scanned {:?}: {} files", dir, files.len());
        Ok(files)
    }
}

/// Check that the input directory exists and can be listed
pub fn validate_input_dir(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|_| {
        ConvertError::config(format!("input directory does not exist: {}", path.display()))
    })?;

    if !metadata.is_dir() {
        return Err(ConvertError::config(format!(
            "input path is not a directory: {}",
            path.display()
        )));
    }

    fs::read_dir(path).map_err(|e| {
        ConvertError::config(format!(
            "cannot read input directory {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Create the output directory (with parents) and check it is writable
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        ConvertError::config(format!(
            "cannot create output directory {}: {}",
            path.display(),
            e
        ))
    })?;

    let probe = path.join(WRITE_PROBE);
    fs::write(&probe, b"").map_err(|e| {
        ConvertError::config(format!(
            "output directory is not writable {}: {}",
            path.display(),
            e
        ))
    })?;
    remove_probe(&probe)
}

fn remove_probe(probe: &Path) -> Result<()> {
    fs::remove_file(probe).map_err(|e| {
        ConvertError::config(format!(
            "cannot remove write probe {}: {}",
            probe.display(),
            e
        ))
    })
}
