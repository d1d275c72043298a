//! Pixel decode/resample/encode capability

use std::io::{Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

use crate::config::ImageFormat;
use crate::error::{ConvertError, Result};
use crate::processing::resize::{Dimensions, FilterType};

/// Decoded pixels
pub type PixelBuffer = DynamicImage;

/// Everything the converter needs from an image library.
///
/// Implementations must be shareable across worker threads; each call owns
/// its own buffers.
pub trait Codec: Send + Sync {
    /// Read and decode the file at `path`
    fn decode(&self, path: &Path) -> Result<PixelBuffer>;

    /// Resample `image` to exactly `size`
    fn resample(&self, image: PixelBuffer, size: Dimensions) -> PixelBuffer;

    /// Encode `image` as `format`. `quality` (1-100) is used by lossy encoders only.
    fn encode(&self, image: &PixelBuffer, format: ImageFormat, quality: u8) -> Result<Vec<u8>>;
}

/// Codec backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec {
    filter: FilterType,
}

impl ImageCodec {
    /// Codec with the default Catmull-Rom resampling filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with a custom resampling filter
    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }
}

impl Codec for ImageCodec {
    fn decode(&self, path: &Path) -> Result<PixelBuffer> {
        let data = std::fs::read(path)
            .map_err(|e| ConvertError::decode(format!("failed to open file: {}", e), path))?;

        let image = image::load_from_memory(&data)
            .map_err(|e| ConvertError::decode(e.to_string(), path))?;

        debug!(
            "Decoded {:?}: {}x{} ({} bytes)",
            path,
            image.width(),
            image.height(),
            data.len()
        );

        Ok(image)
    }

    fn resample(&self, image: PixelBuffer, size: Dimensions) -> PixelBuffer {
        image.resize_exact(size.width, size.height, self.filter.into())
    }

    fn encode(&self, image: &PixelBuffer, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
        let mut output = Cursor::new(Vec::new());

        let encoded = match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
                rgb.write_with_encoder(encoder)
            }
            ImageFormat::WebP => {
                // libwebp takes 8-bit RGB or RGBA only
                let eight_bit = if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                };
                let encoder = webp::Encoder::from_image(&eight_bit).map_err(|e| {
                    ConvertError::encode(format!("{} encoder: {}", format, e), None)
                })?;
                let lossy = encoder.encode(f32::from(quality.clamp(1, 100)));
                output.write_all(&lossy).map_err(image::ImageError::IoError)
            }
            ImageFormat::Gif => {
                DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut output, format.into())
            }
            ImageFormat::Bmp => {
                // BMP only takes 8-bit channels
                let eight_bit = if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                };
                eight_bit.write_to(&mut output, format.into())
            }
            ImageFormat::Png => image.write_to(&mut output, format.into()),
        };

        encoded.map_err(|e| ConvertError::encode(format!("{} encoder: {}", format, e), None))?;

        Ok(output.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let noise = ((x * 7919 + y * 104_729) % 61) as u8;
            Rgb([(x % 256) as u8, (y % 256) as u8, noise.wrapping_mul(4)])
        }))
    }

    #[test]
    fn test_encode_then_decode_every_format() {
        let dir = TempDir::new().unwrap();
        let codec = ImageCodec::new();
        let image = gradient(32, 24);

        for format in ImageFormat::ALL {
            let bytes = codec.encode(&image, format, 90).unwrap();
            let path = dir.path().join(format!("out.{}", format.extension()));
            std::fs::write(&path, bytes).unwrap();

            let decoded = codec.decode(&path).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (32, 24), "{}", format);
        }
    }

    #[test]
    fn test_jpeg_accepts_alpha_input() {
        let codec = ImageCodec::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 128])));
        let bytes = codec.encode(&image, ImageFormat::Jpeg, 80).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn test_decode_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = ImageCodec::new().decode(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = ImageCodec::new()
            .decode(Path::new("/nonexistent/missing.png"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
        assert!(err.to_string().contains("failed to open file"));
    }

    #[test]
    fn test_resample_exact_size() {
        let codec = ImageCodec::new();
        let out = codec.resample(gradient(100, 60), Dimensions::new(33, 20));
        assert_eq!((out.width(), out.height()), (33, 20));
    }

    #[test]
    fn test_webp_is_lossy_and_follows_quality() {
        let codec = ImageCodec::new();
        let image = gradient(128, 96);

        let low = codec.encode(&image, ImageFormat::WebP, 10).unwrap();
        let high = codec.encode(&image, ImageFormat::WebP, 95).unwrap();
        assert!(low.starts_with(b"RIFF"));
        assert!(low.len() < high.len(), "q10 {} bytes, q95 {} bytes", low.len(), high.len());

        // Lossy bitstreams use the VP8 chunk, lossless ones VP8L
        assert_eq!(&high[12..16], b"VP8 ");
    }

    #[test]
    fn test_webp_keeps_alpha() {
        let dir = TempDir::new().unwrap();
        let codec = ImageCodec::new();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([200, 10, 10, 64])));

        let path = dir.path().join("alpha.webp");
        std::fs::write(&path, codec.encode(&image, ImageFormat::WebP, 80).unwrap()).unwrap();
        assert!(codec.decode(&path).unwrap().color().has_alpha());
    }

    #[test]
    fn test_jpeg_size_is_monotonic_in_quality() {
        let codec = ImageCodec::new();
        let image = gradient(128, 96);

        let sizes: Vec<usize> = [10u8, 30, 50, 75, 95]
            .iter()
            .map(|&q| codec.encode(&image, ImageFormat::Jpeg, q).unwrap().len())
            .collect();

        for pair in sizes.windows(2) {
            assert!(pair[1] >= pair[0], "sizes not monotonic: {:?}", sizes);
        }
    }
}
