//! Mask-gated Laplacian sharpening.
//!
//! Restores contour definition after smoothing. The boost is applied
//! only where the mask marks processed skin, and it is scaled down
//! where the mask is strongest so that pore texture in the middle of a
//! cheek is not reintroduced while boundaries (eyes, lips, hairline),
//! where the mask tapers off, regain contrast.
//!
//! The 1-pixel image border has no full 4-neighborhood and is left as-is.
//!
//! This is stage 4 of the pipeline.

use crate::parallel;
use crate::types::{
    Dimensions, PipelineError, RgbaImage, SkinMask, ensure_same_dimensions, to_channel,
};

/// Pixels with a mask weight below this pass through unchanged.
pub const MIN_MASK_WEIGHT: f32 = 0.3;

/// Gain applied to the Laplacian for a pixel with mask weight `mask`.
#[must_use]
pub fn gain(sharpness: f32, mask: f32) -> f32 {
    sharpness * 0.5 * mask.mul_add(-0.5, 1.0)
}

/// Sharpen `image` inside the mask.
///
/// For every interior pixel with mask weight at least
/// [`MIN_MASK_WEIGHT`], each RGB channel becomes
/// `c + (4c - top - bottom - left - right) * gain`, clamped to
/// `[0, 255]`. Neighbors are always read from the unmodified input.
/// Alpha is copied unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `mask` and `image`
/// differ in size.
pub fn sharpen(
    image: &RgbaImage,
    mask: &SkinMask,
    sharpness: f32,
) -> Result<RgbaImage, PipelineError> {
    ensure_same_dimensions(image, mask)?;

    let dims = Dimensions::of(image);
    if sharpness <= 0.0 || dims.width < 3 || dims.height < 3 {
        tracing::trace!(sharpness, %dims, "nothing to sharpen");
        return Ok(image.clone());
    }

    let row_len = dims.width as usize * 4;
    #[allow(clippy::cast_possible_truncation)]
    let pixel_count = dims.pixel_count() as usize;

    let mut output = image.clone();
    parallel::for_each_row_mut(&mut *output, row_len, pixel_count, |y, row| {
        if y == 0 || y == dims.height - 1 {
            return;
        }
        let weights = mask.row(y);
        for x in 1..dims.width - 1 {
            let m = weights[x as usize];
            if m < MIN_MASK_WEIGHT {
                continue;
            }
            let g = gain(sharpness, m);
            let center = image.get_pixel(x, y).0;
            let top = image.get_pixel(x, y - 1).0;
            let bottom = image.get_pixel(x, y + 1).0;
            let left = image.get_pixel(x - 1, y).0;
            let right = image.get_pixel(x + 1, y).0;

            let px = &mut row[x as usize * 4..x as usize * 4 + 3];
            for (c, out) in px.iter_mut().enumerate() {
                let laplacian = 4 * i32::from(center[c])
                    - i32::from(top[c])
                    - i32::from(bottom[c])
                    - i32::from(left[c])
                    - i32::from(right[c]);
                #[allow(clippy::cast_precision_loss)]
                let boosted = (laplacian as f32).mul_add(g, f32::from(center[c]));
                *out = to_channel(boosted);
            }
        }
    });

    tracing::debug!(
        sharpness,
        processed_pixels = mask.count_at_least(MIN_MASK_WEIGHT),
        "mask-gated sharpening"
    );

    Ok(output)
}
