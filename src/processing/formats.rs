//! Output format resolution and output path naming

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ImageFormat;
use crate::error::{ConvertError, Result};

/// Detect image format from file extension
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<ImageFormat> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| ConvertError::format("(no extension)", Some(path.to_path_buf())))?;

    normalize_format(extension).map_err(|_| {
        ConvertError::format(format!(".{}", extension), Some(path.to_path_buf()))
    })
}

/// Normalize a user supplied format name to its canonical form.
/// Case-insensitive; `jpg` and `jpeg` are the same format.
pub fn normalize_format(name: &str) -> Result<ImageFormat> {
    match name.trim().to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "webp" => Ok(ImageFormat::WebP),
        "gif" => Ok(ImageFormat::Gif),
        "bmp" => Ok(ImageFormat::Bmp),
        _ => Err(ConvertError::format(name.to_string(), None)),
    }
}

/// Pick the output format: the explicit one when given, otherwise the
/// format implied by the source file's extension.
pub fn resolve_output_format(source: &Path, explicit: Option<&str>) -> Result<ImageFormat> {
    match explicit {
        Some(name) => normalize_format(name),
        None => detect_format_from_path(source),
    }
}

/// Output file name: the source base name with the canonical extension of `format`
pub fn output_file_name(source: &Path, format: ImageFormat) -> PathBuf {
    // file_stem only strips the last extension; set_extension on it would strip another
    let stem = source.file_stem().unwrap_or_else(|| source.as_os_str());
    let mut name = OsString::from(stem);
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Full output path inside `output_dir`. Pure path arithmetic, no filesystem access.
pub fn build_output_path(source: &Path, output_dir: &Path, format: ImageFormat) -> PathBuf {
    output_dir.join(output_file_name(source, format))
}

/// Convert our ImageFormat to image crate format
impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::WebP => image::ImageFormat::WebP,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

/// Extensions treated as images when scanning a directory
pub fn supported_input_formats() -> &'static [&'static str] {
    &["jpg", "jpeg", "png", "gif", "bmp", "webp"]
}

/// Format names accepted for `--format`
pub fn supported_output_formats() -> &'static [&'static str] {
    &["jpeg", "jpg", "png", "webp", "gif", "bmp"]
}

/// Check if a file extension is supported for input
pub fn is_supported_input_format(extension: &str) -> bool {
    supported_input_formats()
        .iter()
        .any(|&fmt| fmt.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection_from_path() {
        assert_eq!(detect_format_from_path("test.jpg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(detect_format_from_path("test.JPEG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(detect_format_from_path("test.PNG").unwrap(), ImageFormat::Png);
        assert_eq!(detect_format_from_path("dir/test.webp").unwrap(), ImageFormat::WebP);
        assert_eq!(detect_format_from_path("a.Gif").unwrap(), ImageFormat::Gif);
        assert_eq!(detect_format_from_path("a.bmp").unwrap(), ImageFormat::Bmp);
    }

    #[test]
    fn test_unsupported_extension_is_format_error() {
        let err = detect_format_from_path("scan.tiff").unwrap_err();
        assert!(matches!(err, ConvertError::Format { .. }));
        assert!(err.to_string().contains(".tiff"));

        assert!(matches!(
            detect_format_from_path("README"),
            Err(ConvertError::Format { .. })
        ));
    }

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format("jpg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(normalize_format("JPEG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(normalize_format("WebP").unwrap(), ImageFormat::WebP);
        assert!(normalize_format("tiff").is_err());
        assert!(normalize_format("").is_err());
    }

    #[test]
    fn test_resolve_output_format() {
        let src = Path::new("in/photo.png");
        assert_eq!(resolve_output_format(src, None).unwrap(), ImageFormat::Png);
        assert_eq!(resolve_output_format(src, Some("jpg")).unwrap(), ImageFormat::Jpeg);
        assert!(resolve_output_format(src, Some("heic")).is_err());
        assert!(resolve_output_format(Path::new("in/photo.xyz"), None).is_err());
    }

    #[test]
    fn test_build_output_path() {
        let out = build_output_path(Path::new("in/photo.jpg"), Path::new("/out"), ImageFormat::Png);
        assert_eq!(out, PathBuf::from("/out/photo.png"));

        let out = build_output_path(Path::new("in/photo.png"), Path::new("/out"), ImageFormat::Jpeg);
        assert_eq!(out, PathBuf::from("/out/photo.jpg"));

        // Only the last extension is replaced
        let out = build_output_path(Path::new("a.b.c.webp"), Path::new("o"), ImageFormat::Gif);
        assert_eq!(out, PathBuf::from("o/a.b.c.gif"));
    }

    #[test]
    fn test_multi_dot_names_keep_their_full_base() {
        let v1 = build_output_path(Path::new("in/photo.v1.jpg"), Path::new("out"), ImageFormat::Png);
        let v2 = build_output_path(Path::new("in/photo.v2.jpg"), Path::new("out"), ImageFormat::Png);
        assert_eq!(v1, PathBuf::from("out/photo.v1.png"));
        assert_eq!(v2, PathBuf::from("out/photo.v2.png"));
        assert_ne!(v1, v2);

        let same = build_output_path(Path::new("archive.tar.gif"), Path::new("out"), ImageFormat::Gif);
        assert_eq!(same, PathBuf::from("out/archive.tar.gif"));
    }

    #[test]
    fn test_base_name_is_invariant_under_format_change() {
        let src = Path::new("shots/IMG_0042.jpeg");
        for format in ImageFormat::ALL {
            let out = build_output_path(src, Path::new("out"), format);
            assert_eq!(out.file_stem().unwrap(), "IMG_0042");
            assert_eq!(out.extension().unwrap(), format.extension());
        }
    }

    #[test]
    fn test_supported_formats() {
        assert!(is_supported_input_format("jpg"));
        assert!(is_supported_input_format("PNG"));
        assert!(is_supported_input_format("WebP"));
        assert!(!is_supported_input_format("txt"));
        assert!(!is_supported_input_format("tiff"));
        assert!(supported_output_formats().iter().all(|f| normalize_format(f).is_ok()));
    }
}
