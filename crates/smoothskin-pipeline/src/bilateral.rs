//! Edge-aware smoothing of skin regions (bilateral approximation).
//!
//! Each pixel whose mask weight reaches [`MIN_MASK_WEIGHT`] is pulled
//! toward a weighted average of its neighborhood. Neighbor weights are
//! the product of a spatial Gaussian (distance from the center) and a
//! range Gaussian (RGB distance from the center color), so flat skin is
//! smoothed while strong color edges resist blending.
//!
//! The pull is `mask * intensity`: with either at zero the pixel is
//! returned exactly as it was.
//!
//! All neighbor reads come from the borrowed input raster and all
//! writes go to a fresh output buffer, so a pixel's new value can never
//! feed into a neighbor's computation within the same pass.
//!
//! This is stage 3 of the pipeline and dominates its runtime:
//! `O(skin_pixels * blur_radius²)`.

use crate::parallel;
use crate::types::{
    Dimensions, PipelineError, RgbaImage, SkinMask, ensure_same_dimensions, to_channel,
};

/// Pixels with a mask weight below this pass through unchanged.
pub const MIN_MASK_WEIGHT: f32 = 0.1;

/// Window half-width for a given intensity: `ceil(intensity * 8) + 1`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blur_radius(intensity: f32) -> u32 {
    (intensity * 8.0).ceil() as u32 + 1
}

/// Range-kernel sigma: `30 + (1 - texture_preserve) * 50`.
///
/// Less texture preservation means a wider color tolerance and more
/// aggressive blending.
#[must_use]
pub fn sigma_color(texture_preserve: f32) -> f32 {
    (1.0 - texture_preserve).mul_add(50.0, 30.0)
}

/// Precomputed spatial weights for a square window of half-width `radius`.
struct SpatialKernel {
    radius: u32,
    side: usize,
    weights: Vec<f32>,
}

impl SpatialKernel {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn new(radius: u32) -> Self {
        let side = 2 * radius as usize + 1;
        let r = radius as i32;
        let denom = 2.0 * (radius as f32).powi(2);
        let mut weights = Vec::with_capacity(side * side);
        for dy in -r..=r {
            for dx in -r..=r {
                let d2 = (dx * dx + dy * dy) as f32;
                weights.push((-d2 / denom).exp());
            }
        }
        Self {
            radius,
            side,
            weights,
        }
    }

    /// Weight for the neighbor at `(nx, ny)` relative to `(x, y)`.
    fn weight(&self, x: u32, y: u32, nx: u32, ny: u32) -> f32 {
        let col = (nx + self.radius - x) as usize;
        let row = (ny + self.radius - y) as usize;
        self.weights[row * self.side + col]
    }
}

/// Bilateral weighted average of the RGB neighborhood around `(x, y)`.
///
/// Out-of-bounds neighbors are skipped. The center always contributes
/// with weight 1, so the denominator is never zero.
fn weighted_average(
    image: &RgbaImage,
    kernel: &SpatialKernel,
    color_denom: f32,
    x: u32,
    y: u32,
) -> [f32; 3] {
    let (w, h) = image.dimensions();
    let center = rgb_f32(image.get_pixel(x, y).0);

    let x0 = x.saturating_sub(kernel.radius);
    let x1 = (x + kernel.radius).min(w - 1);
    let y0 = y.saturating_sub(kernel.radius);
    let y1 = (y + kernel.radius).min(h - 1);

    let mut sum = [0.0f32; 3];
    let mut weight_sum = 0.0f32;

    for ny in y0..=y1 {
        for nx in x0..=x1 {
            let neighbor = rgb_f32(image.get_pixel(nx, ny).0);
            let dr = neighbor[0] - center[0];
            let dg = neighbor[1] - center[1];
            let db = neighbor[2] - center[2];
            let color_d2 = db.mul_add(db, dr.mul_add(dr, dg * dg));

            let weight = kernel.weight(x, y, nx, ny) * (-color_d2 / color_denom).exp();
            for c in 0..3 {
                sum[c] = neighbor[c].mul_add(weight, sum[c]);
            }
            weight_sum += weight;
        }
    }

    sum.map(|s| s / weight_sum)
}

fn rgb_f32([r, g, b, _]: [u8; 4]) -> [f32; 3] {
    [f32::from(r), f32::from(g), f32::from(b)]
}

/// Smooth skin regions of `image`, gated by `mask`.
///
/// `intensity` controls both the window size ([`blur_radius`]) and the
/// blend strength; `texture_preserve` controls the range kernel
/// ([`sigma_color`]). Alpha is copied unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `mask` and `image`
/// differ in size.
pub fn smooth(
    image: &RgbaImage,
    mask: &SkinMask,
    intensity: f32,
    texture_preserve: f32,
) -> Result<RgbaImage, PipelineError> {
    ensure_same_dimensions(image, mask)?;

    if intensity <= 0.0 {
        tracing::trace!("intensity is zero, skipping bilateral smoothing");
        return Ok(image.clone());
    }

    let radius = blur_radius(intensity);
    let sigma = sigma_color(texture_preserve);
    let color_denom = 2.0 * sigma * sigma;
    let kernel = SpatialKernel::new(radius);

    let dims = Dimensions::of(image);
    let row_len = dims.width as usize * 4;
    #[allow(clippy::cast_possible_truncation)]
    let pixel_count = dims.pixel_count() as usize;

    let mut output = image.clone();
    parallel::for_each_row_mut(&mut *output, row_len, pixel_count, |y, row| {
        let weights = mask.row(y);
        for (x, (px, &m)) in (0..dims.width).zip(row.chunks_exact_mut(4).zip(weights)) {
            if m < MIN_MASK_WEIGHT {
                continue;
            }
            let blend = m * intensity;
            let avg = weighted_average(image, &kernel, color_denom, x, y);
            for c in 0..3 {
                let center = f32::from(px[c]);
                px[c] = to_channel((avg[c] - center).mul_add(blend, center));
            }
        }
    });

    tracing::debug!(
        blur_radius = radius,
        sigma_color = sigma,
        processed_pixels = mask.count_at_least(MIN_MASK_WEIGHT),
        "bilateral smoothing"
    );

    Ok(output)
}
