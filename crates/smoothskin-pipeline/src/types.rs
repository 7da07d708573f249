//! Shared types for the skin smoothing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can pass rasters in and
/// out of the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Re-export `GrayImage` for mask visualization.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-pixel skin likelihood in `[0, 1]`, stored row-major.
///
/// A mask is derived once from a raster and has the same dimensions as
/// that raster. After smoothing it is only ever read.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinMask {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl SkinMask {
    /// An all-zero mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// Wrap an existing row-major value buffer.
    ///
    /// Returns `None` if `values.len() != width * height`.
    #[must_use]
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        (values.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            values,
        })
    }

    /// Mask width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Weight at `(x, y)`. Panics if out of bounds, like
    /// [`image::ImageBuffer::get_pixel`].
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[self.index(x, y)]
    }

    /// Row-major weights.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// One row of weights.
    #[must_use]
    pub fn row(&self, y: u32) -> &[f32] {
        let start = self.index(0, y);
        &self.values[start..start + self.width as usize]
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Number of pixels whose weight is at least `threshold`.
    #[must_use]
    pub fn count_at_least(&self, threshold: f32) -> u64 {
        self.values.iter().map(|&v| u64::from(v >= threshold)).sum()
    }

    /// Mean weight over all pixels (0.0 for an empty mask).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|&v| f64::from(v)).sum();
        (sum / self.values.len() as f64) as f32
    }

    /// Render the mask as an 8-bit grayscale image (0.0 → 0, 1.0 → 255).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// User-facing parameters of the skin smoothing filter.
///
/// Every field is a normalized strength in `[0, 1]`. Front ends that
/// expose 0–100 sliders should go through
/// [`from_percentages`](Self::from_percentages).
///
/// Values are not clamped: [`validate`](Self::validate) rejects anything
/// out of range so misuse surfaces as an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmoothingParams {
    /// Overall smoothing strength. Also widens the bilateral window.
    pub intensity: f32,

    /// How much fine texture survives. Higher values narrow the color
    /// similarity tolerance of the bilateral filter.
    pub texture_preserve: f32,

    /// Skin detection sensitivity. Higher values raise the acceptance
    /// threshold, so fewer pixels count as skin.
    pub skin_range: f32,

    /// Strength of the final edge restoration.
    pub sharpness: f32,
}

impl SmoothingParams {
    /// Default smoothing strength.
    pub const DEFAULT_INTENSITY: f32 = 0.5;
    /// Default texture preservation.
    pub const DEFAULT_TEXTURE_PRESERVE: f32 = 0.5;
    /// Default skin detection sensitivity.
    pub const DEFAULT_SKIN_RANGE: f32 = 0.5;
    /// Default sharpening strength.
    pub const DEFAULT_SHARPNESS: f32 = 0.3;

    /// Build parameters from 0–100 slider values.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if any value exceeds 100.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_percentages(
        intensity: u32,
        texture_preserve: u32,
        skin_range: u32,
        sharpness: u32,
    ) -> Result<Self, PipelineError> {
        let params = Self {
            intensity: intensity as f32 / 100.0,
            texture_preserve: texture_preserve as f32 / 100.0,
            skin_range: skin_range as f32 / 100.0,
            sharpness: sharpness as f32 / 100.0,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that every parameter is finite and within `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("intensity", self.intensity),
            ("texture_preserve", self.texture_preserve),
            ("skin_range", self.skin_range),
            ("sharpness", self.sharpness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            intensity: Self::DEFAULT_INTENSITY,
            texture_preserve: Self::DEFAULT_TEXTURE_PRESERVE,
            skin_range: Self::DEFAULT_SKIN_RANGE,
            sharpness: Self::DEFAULT_SHARPNESS,
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Does not implement serde: the raster fields are large and the
/// intended consumers (previews, diagnostics) live in-process.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The untouched input raster.
    pub original: RgbaImage,
    /// Thresholded skin likelihood, before spatial smoothing.
    pub raw_mask: SkinMask,
    /// Box-averaged mask used by the smoothing and sharpening stages.
    pub mask: SkinMask,
    /// Output of the bilateral smoothing stage.
    pub smoothed: RgbaImage,
    /// Output of the sharpening stage: the final image.
    pub sharpened: RgbaImage,
    /// Parameters the run used.
    pub params: SmoothingParams,
    /// Dimensions shared by every raster and mask above.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// The final filtered image.
    #[must_use]
    pub const fn final_image(&self) -> &RgbaImage {
        &self.sharpened
    }

    /// Consume the result, keeping only the final image.
    #[must_use]
    pub fn into_final_image(self) -> RgbaImage {
        self.sharpened
    }
}

/// Errors that can occur during pipeline processing.
///
/// Everything except the decode variants is a caller precondition
/// violation, reported before any pixel work begins.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A smoothing parameter is non-finite or outside `[0, 1]`.
    #[error("parameter `{name}` must be within [0, 1], got {value}")]
    InvalidParameter {
        /// Field name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f32,
    },

    /// A raw pixel buffer does not hold `width * height * 4` bytes.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize {
        /// Required byte count.
        expected: usize,
        /// Byte count supplied.
        actual: usize,
    },

    /// `width * height * 4` does not fit in memory.
    #[error("image dimensions {width}x{height} are too large to address")]
    ImageTooLarge {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// A mask and the raster it gates have different dimensions.
    #[error("mask is {actual} but image is {expected}")]
    DimensionMismatch {
        /// Raster dimensions.
        expected: Dimensions,
        /// Mask dimensions.
        actual: Dimensions,
    },
}

/// Quantize a filtered channel value back to `u8`.
///
/// Rounds half away from zero (`f32::round`), then clamps to `[0, 255]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Check that `mask` was derived from a raster shaped like `image`.
pub(crate) fn ensure_same_dimensions(
    image: &RgbaImage,
    mask: &SkinMask,
) -> Result<(), PipelineError> {
    let expected = Dimensions::of(image);
    let actual = mask.dimensions();
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch { expected, actual })
    }
}
