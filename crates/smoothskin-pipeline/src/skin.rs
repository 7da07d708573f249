//! Per-pixel skin likelihood from color alone.
//!
//! Each pixel is converted to YCbCr. Pixels inside a fixed luma/chroma
//! band score by how close their chroma sits to the middle of the band;
//! pixels outside the band can still be caught by an RGB ordering rule
//! that recognizes skin under unusual lighting. Scores at or below the
//! `skin_range`-dependent acceptance threshold are zeroed.
//!
//! This is stage 1 of the pipeline.

use crate::types::{RgbaImage, SkinMask};

/// Luma must be strictly above this for the chroma band to apply.
pub const LUMA_MIN: f32 = 80.0;

/// Inclusive Cb acceptance band.
pub const CB_BAND: (f32, f32) = (77.0, 127.0);

/// Inclusive Cr acceptance band.
pub const CR_BAND: (f32, f32) = (133.0, 173.0);

/// Flat bonus added to the centeredness average inside the band.
pub const BAND_BIAS: f32 = 0.3;

/// Score assigned by the RGB fallback rule.
pub const RGB_FALLBACK_SCORE: f32 = 0.6;

/// A pixel in luma/chroma form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YCbCr {
    /// Luma.
    pub y: f32,
    /// Blue-difference chroma, offset by 128.
    pub cb: f32,
    /// Red-difference chroma, offset by 128.
    pub cr: f32,
}

/// Convert 8-bit RGB to full-range YCbCr (BT.601 weights).
#[must_use]
pub fn to_ycbcr(r: u8, g: u8, b: u8) -> YCbCr {
    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    YCbCr {
        y: 0.114f32.mul_add(b, 0.299f32.mul_add(r, 0.587 * g)),
        cb: 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b,
        cr: 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b,
    }
}

/// How close `value` is to the middle of `band`: 1.0 at the center,
/// 0.0 at either edge.
fn centeredness(value: f32, (low, high): (f32, f32)) -> f32 {
    let mid = (low + high) / 2.0;
    let half = (high - low) / 2.0;
    1.0 - (value - mid).abs() / half
}

fn in_band(value: f32, (low, high): (f32, f32)) -> bool {
    (low..=high).contains(&value)
}

/// Classic RGB skin rule, used only when the chroma band rejects a pixel.
const fn rgb_rule(r: u8, g: u8, b: u8) -> bool {
    r > 95 && g > 40 && b > 20 && r > g && r > b && r.abs_diff(g) > 15
}

/// Raw skin likelihood of a single RGB pixel, in `[0, 1]`.
///
/// The fallback score is not blended with the band score: it only
/// applies when the band test fails, so the two detection paths can
/// meet with a step between them.
#[must_use]
pub fn skin_likelihood(r: u8, g: u8, b: u8) -> f32 {
    let ycc = to_ycbcr(r, g, b);

    if ycc.y > LUMA_MIN && in_band(ycc.cb, CB_BAND) && in_band(ycc.cr, CR_BAND) {
        let cb_score = centeredness(ycc.cb, CB_BAND);
        let cr_score = centeredness(ycc.cr, CR_BAND);
        return (f32::midpoint(cb_score, cr_score) + BAND_BIAS).min(1.0);
    }

    if rgb_rule(r, g, b) {
        RGB_FALLBACK_SCORE
    } else {
        0.0
    }
}

/// Minimum score a pixel must exceed to count as skin.
#[must_use]
pub fn acceptance_threshold(skin_range: f32) -> f32 {
    skin_range.mul_add(0.4, 0.3)
}

/// Compute the thresholded skin likelihood mask of `image`.
///
/// Scores at or below [`acceptance_threshold`] become 0; the rest keep
/// their raw likelihood. Alpha is ignored.
#[must_use = "returns the skin mask"]
pub fn detect_skin(image: &RgbaImage, skin_range: f32) -> SkinMask {
    let threshold = acceptance_threshold(skin_range);
    let mask = SkinMask::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        let score = skin_likelihood(r, g, b);
        if score > threshold { score } else { 0.0 }
    });

    tracing::debug!(
        width = mask.width(),
        height = mask.height(),
        threshold,
        skin_pixels = mask.count_at_least(f32::MIN_POSITIVE),
        "detected skin"
    );

    mask
}
