//! Output geometry and resampling filter selection

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Requested resize. Zero means "unset" for every field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeRequest {
    /// Scale factor (0 = unset)
    pub scale: f64,
    /// Target or bounding width in pixels (0 = unset)
    pub width: u32,
    /// Target or bounding height in pixels (0 = unset)
    pub height: u32,
}

impl ResizeRequest {
    /// No resize at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Scale both axes by `factor`
    pub fn scale(factor: f64) -> Self {
        Self {
            scale: factor,
            ..Self::default()
        }
    }

    /// Fixed width, height follows the aspect ratio
    pub fn width(width: u32) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    /// Fixed height, width follows the aspect ratio
    pub fn height(height: u32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    /// Fit inside a `width` x `height` box
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            scale: 0.0,
            width,
            height,
        }
    }

    /// True when no field is set
    pub fn is_identity(&self) -> bool {
        self.scale == 0.0 && self.width == 0 && self.height == 0
    }

    /// Reject contradictory or out-of-domain requests
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale < 0.0 {
            return Err(ConvertError::config(format!(
                "Scale factor must be a finite value >= 0, got {}",
                self.scale
            )));
        }

        if self.scale > 0.0 && (self.width > 0 || self.height > 0) {
            return Err(ConvertError::config(
                "Scale and pixel dimensions (width/height) cannot be combined",
            ));
        }

        Ok(())
    }
}

/// Largest axis any output encoder accepts (JPEG's limit)
pub const MAX_DIMENSION: u32 = 65_535;

/// Largest output buffer in pixels (1 GiB as RGBA8)
pub const MAX_PIXELS: u64 = 1 << 28;

/// Pixel dimensions of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either axis is zero
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the image is too large to allocate or encode
    pub fn is_oversized(&self) -> bool {
        self.width > MAX_DIMENSION
            || self.height > MAX_DIMENSION
            || u64::from(self.width) * u64::from(self.height) > MAX_PIXELS
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Compute destination dimensions for a `src_width` x `src_height` source.
///
/// Rules apply in priority order: scale factor, bounding box (both width and
/// height), width only, height only, identity. Products are rounded half away
/// from zero. A tiny scale can yield a zero axis; callers decide whether that
/// is acceptable.
pub fn compute_output_size(src_width: u32, src_height: u32, request: &ResizeRequest) -> Dimensions {
    let (sw, sh) = (f64::from(src_width), f64::from(src_height));

    if request.scale > 0.0 {
        return scaled(sw, sh, request.scale);
    }

    if request.width > 0 && request.height > 0 {
        let factor = (f64::from(request.width) / sw).min(f64::from(request.height) / sh);
        return scaled(sw, sh, factor);
    }

    if request.width > 0 {
        let factor = f64::from(request.width) / sw;
        return Dimensions::new(request.width, round_px(sh * factor));
    }

    if request.height > 0 {
        let factor = f64::from(request.height) / sh;
        return Dimensions::new(round_px(sw * factor), request.height);
    }

    Dimensions::new(src_width, src_height)
}

fn scaled(sw: f64, sh: f64, factor: f64) -> Dimensions {
    Dimensions::new(round_px(sw * factor), round_px(sh * factor))
}

// f64::round is half-away-from-zero; the cast saturates.
fn round_px(value: f64) -> u32 {
    value.round() as u32
}

/// Available resize filters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterType {
    /// Nearest neighbor (fastest, lowest quality)
    Nearest,
    /// Triangle (linear interpolation)
    Triangle,
    /// Catmull-Rom cubic spline
    #[default]
    CatmullRom,
    /// Lanczos with radius 3
    Lanczos3,
}

impl From<FilterType> for image::imageops::FilterType {
    fn from(filter: FilterType) -> Self {
        match filter {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Triangle => image::imageops::FilterType::Triangle,
            FilterType::CatmullRom => image::imageops::FilterType::CatmullRom,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}
