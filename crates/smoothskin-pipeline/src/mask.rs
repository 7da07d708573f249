//! Box-average smoothing of the skin mask.
//!
//! The raw likelihood field switches abruptly between skin and
//! non-skin. Feeding that directly to the bilateral stage leaves visible
//! seams, so the mask is averaged over a fixed 5×5 window first.
//!
//! Windows are clipped at the image border: edge pixels average only
//! the samples that exist, so a uniform mask stays uniform all the way
//! to the corners.
//!
//! This is stage 2 of the pipeline.

use crate::parallel;
use crate::types::SkinMask;

/// Half-width of the averaging window (5×5).
pub const MASK_RADIUS: u32 = 2;

/// Average every mask value over its clipped `(2r+1)²` neighborhood.
///
/// The window is separable, so this runs a horizontal pass into a
/// scratch buffer and a vertical pass into the output. Both passes
/// divide by the number of in-bounds samples, which makes the result
/// equal to the 2D average over the clipped rectangle.
#[must_use = "returns the smoothed mask"]
pub fn smooth_mask(mask: &SkinMask) -> SkinMask {
    smooth_mask_with_radius(mask, MASK_RADIUS)
}

#[allow(clippy::cast_precision_loss)]
fn smooth_mask_with_radius(mask: &SkinMask, radius: u32) -> SkinMask {
    let (w, h) = (mask.width(), mask.height());
    let pixel_count = w as usize * h as usize;

    let mut horizontal = SkinMask::new(w, h);
    parallel::for_each_row_mut(horizontal.values_mut(), w as usize, pixel_count, |y, row| {
        let src = mask.row(y);
        for (x, out) in (0..w).zip(row.iter_mut()) {
            let (lo, hi) = window(x, radius, w);
            let sum: f32 = src[lo as usize..=hi as usize].iter().sum();
            *out = sum / (hi - lo + 1) as f32;
        }
    });

    let mut smoothed = SkinMask::new(w, h);
    parallel::for_each_row_mut(smoothed.values_mut(), w as usize, pixel_count, |y, row| {
        let (lo, hi) = window(y, radius, h);
        let count = (hi - lo + 1) as f32;
        for (x, out) in (0..w).zip(row.iter_mut()) {
            let sum: f32 = (lo..=hi).map(|ny| horizontal.get(x, ny)).sum();
            *out = sum / count;
        }
    });

    tracing::debug!(
        radius,
        mean_before = mask.mean(),
        mean_after = smoothed.mean(),
        "smoothed skin mask"
    );

    smoothed
}

/// Inclusive bounds of the window around `center`, clipped to `[0, len)`.
const fn window(center: u32, radius: u32, len: u32) -> (u32, u32) {
    let lo = center.saturating_sub(radius);
    let hi = if center + radius < len {
        center + radius
    } else {
        len - 1
    };
    (lo, hi)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn window_clips_at_borders() {
        assert_eq!(window(0, 2, 10), (0, 2));
        assert_eq!(window(5, 2, 10), (3, 7));
        assert_eq!(window(9, 2, 10), (7, 9));
        assert_eq!(window(0, 2, 1), (0, 0));
    }

    #[test]
    fn uniform_mask_stays_uniform_including_corners() {
        let mask = SkinMask::from_fn(9, 6, |_, _| 0.8);
        let smoothed = smooth_mask(&mask);
        for &v in smoothed.values() {
            assert_close(v, 0.8);
        }
    }

    #[test]
    fn zero_mask_stays_zero() {
        let mask = SkinMask::new(8, 8);
        let smoothed = smooth_mask(&mask);
        assert!(smoothed.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn impulse_spreads_by_window_size() {
        // A single 1.0 at the center of a 5×5 mask is inside every
        // pixel's window, so each output is 1 / (in-bounds sample count).
        let mask = SkinMask::from_fn(5, 5, |x, y| if (x, y) == (2, 2) { 1.0 } else { 0.0 });
        let smoothed = smooth_mask(&mask);

        assert_close(smoothed.get(2, 2), 1.0 / 25.0);
        assert_close(smoothed.get(0, 0), 1.0 / 9.0);
        assert_close(smoothed.get(2, 0), 1.0 / 15.0);
        assert_close(smoothed.get(4, 4), 1.0 / 9.0);
    }

    #[test]
    fn impulse_does_not_reach_beyond_radius() {
        let mask = SkinMask::from_fn(9, 9, |x, y| if (x, y) == (0, 0) { 1.0 } else { 0.0 });
        let smoothed = smooth_mask(&mask);
        assert!(smoothed.get(2, 2) > 0.0);
        assert!(smoothed.get(3, 0).abs() < f32::EPSILON);
        assert!(smoothed.get(0, 3).abs() < f32::EPSILON);
    }

    #[test]
    fn smoothing_softens_a_hard_edge() {
        let mask = SkinMask::from_fn(10, 4, |x, _| if x < 5 { 1.0 } else { 0.0 });
        let smoothed = smooth_mask(&mask);
        let left = smoothed.get(4, 1);
        let right = smoothed.get(5, 1);
        assert!(left < 1.0 && left > 0.5, "left of edge: {left}");
        assert!(right > 0.0 && right < 0.5, "right of edge: {right}");
    }

    #[test]
    fn output_dimensions_preserved() {
        let mask = SkinMask::new(17, 3);
        let smoothed = smooth_mask(&mask);
        assert_eq!(smoothed.dimensions(), mask.dimensions());
    }

    #[test]
    fn matches_direct_two_dimensional_average() {
        #[allow(clippy::cast_precision_loss)]
        let mask = SkinMask::from_fn(7, 6, |x, y| ((x * 7 + y * 3) % 5) as f32 / 4.0);
        let smoothed = smooth_mask(&mask);

        for y in 0..6u32 {
            for x in 0..7u32 {
                let (x0, x1) = window(x, MASK_RADIUS, 7);
                let (y0, y1) = window(y, MASK_RADIUS, 6);
                let mut sum = 0.0;
                let mut n = 0.0;
                for ny in y0..=y1 {
                    for nx in x0..=x1 {
                        sum += mask.get(nx, ny);
                        n += 1.0;
                    }
                }
                assert_close(smoothed.get(x, y), sum / n);
            }
        }
    }

    #[test]
    fn empty_mask_is_handled() {
        let smoothed = smooth_mask(&SkinMask::new(0, 0));
        assert!(smoothed.values().is_empty());
    }
}
