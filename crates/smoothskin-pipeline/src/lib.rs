//! smoothskin-pipeline: content-aware skin smoothing (sans-IO).
//!
//! Smooths skin while keeping facial contours crisp:
//! skin detection -> mask smoothing -> bilateral smoothing ->
//! mask-gated sharpening.
//!
//! Every stage reads a borrowed raster and returns a new one of the
//! same size; alpha is carried through untouched. The crate has **no
//! I/O dependencies**: it works on in-memory rasters and byte slices.
//! File handling lives in `smoothskin-cli`.

pub mod bilateral;
pub mod decode;
pub mod diagnostics;
pub mod mask;
pub mod parallel;
pub mod pipeline;
pub mod sharpen;
pub mod skin;
pub mod types;

pub use pipeline::Pipeline;
pub use types::{
    Dimensions, GrayImage, PipelineError, RgbaImage, SkinMask, SmoothingParams, StagedResult,
};

/// Run the full filter and return only the final image.
///
/// # Pipeline steps
///
/// 1. Skin likelihood from YCbCr band + RGB fallback, thresholded by
///    `skin_range`
/// 2. 5×5 box average of the likelihood mask
/// 3. Bilateral smoothing, blended by `mask * intensity`
/// 4. Laplacian sharpening inside the mask
///
/// An image with no skin comes back unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if any parameter is
/// non-finite or outside `[0, 1]`.
pub fn smooth_skin(
    image: &RgbaImage,
    params: &SmoothingParams,
) -> Result<RgbaImage, PipelineError> {
    params.validate()?;

    let raw_mask = skin::detect_skin(image, params.skin_range);
    let mask = mask::smooth_mask(&raw_mask);
    drop(raw_mask);

    let smoothed = bilateral::smooth(image, &mask, params.intensity, params.texture_preserve)?;
    sharpen::sharpen(&smoothed, &mask, params.sharpness)
}

/// [`smooth_skin`] over a raw row-major RGBA byte buffer.
///
/// # Errors
///
/// Returns [`PipelineError::ImageTooLarge`] if `width * height * 4`
/// overflows `usize`, [`PipelineError::BufferSize`] if `pixels.len()` is
/// not `width * height * 4`, and [`PipelineError::InvalidParameter`] for
/// out-of-range parameters.
pub fn smooth_skin_raw(
    width: u32,
    height: u32,
    pixels: &[u8],
    params: &SmoothingParams,
) -> Result<Vec<u8>, PipelineError> {
    let expected = Dimensions { width, height }
        .pixel_count()
        .checked_mul(4)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(PipelineError::ImageTooLarge { width, height })?;
    let size_error = PipelineError::BufferSize {
        expected,
        actual: pixels.len(),
    };
    if pixels.len() != expected {
        return Err(size_error);
    }
    let image = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or(size_error)?;
    Ok(smooth_skin(&image, params)?.into_raw())
}

/// Run the full filter, keeping every intermediate.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if any parameter is
/// non-finite or outside `[0, 1]`.
pub fn process_staged(
    image: &RgbaImage,
    params: &SmoothingParams,
) -> Result<StagedResult, PipelineError> {
    Pipeline::new(image.clone(), *params)?
        .detect_skin()
        .smooth_mask()
        .smooth()?
        .sharpen()
        .map(pipeline::Sharpened::into_result)
}

/// Decode `image_bytes` (PNG, JPEG, BMP, WebP) and run the full filter.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the format is unrecognized, and
/// [`PipelineError::InvalidParameter`] for out-of-range parameters.
pub fn process(image_bytes: &[u8], params: &SmoothingParams) -> Result<RgbaImage, PipelineError> {
    params.validate()?;
    let image = decode::decode_rgba(image_bytes)?;
    smooth_skin(&image, params)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn rippled_skin(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let ripple = ((x * 3 + y * 5) % 11) as u8;
            image::Rgba([214 + ripple, 164 + ripple, 134 + ripple, 255])
        })
    }

    #[test]
    fn smooth_skin_matches_process_staged() {
        let img = rippled_skin(20, 16);
        let params = SmoothingParams::default();
        let direct = smooth_skin(&img, &params).unwrap();
        let staged = process_staged(&img, &params).unwrap();
        assert_eq!(&direct, staged.final_image());
    }

    #[test]
    fn smooth_skin_rejects_invalid_params() {
        let params = SmoothingParams {
            texture_preserve: f32::INFINITY,
            ..SmoothingParams::default()
        };
        assert!(matches!(
            smooth_skin(&rippled_skin(4, 4), &params),
            Err(PipelineError::InvalidParameter {
                name: "texture_preserve",
                ..
            })
        ));
    }

    #[test]
    fn raw_buffer_round_trip() {
        let img = rippled_skin(9, 7);
        let params = SmoothingParams::default();
        let raw = smooth_skin_raw(9, 7, img.as_raw(), &params).unwrap();
        assert_eq!(raw, smooth_skin(&img, &params).unwrap().into_raw());
    }

    #[test]
    fn raw_buffer_too_short_is_rejected() {
        let result = smooth_skin_raw(4, 4, &[0; 60], &SmoothingParams::default());
        assert!(matches!(
            result,
            Err(PipelineError::BufferSize {
                expected: 64,
                actual: 60
            })
        ));
    }

    #[test]
    fn raw_buffer_too_long_is_rejected() {
        let result = smooth_skin_raw(2, 2, &[0; 20], &SmoothingParams::default());
        assert!(matches!(
            result,
            Err(PipelineError::BufferSize {
                expected: 16,
                actual: 20
            })
        ));
    }

    #[test]
    fn raw_buffer_with_overflowing_dimensions_is_rejected() {
        let params = SmoothingParams::default();
        assert!(matches!(
            smooth_skin_raw(u32::MAX, u32::MAX, &[0; 16], &params),
            Err(PipelineError::ImageTooLarge {
                width: u32::MAX,
                height: u32::MAX
            })
        ));
        assert!(matches!(
            smooth_skin_raw(1 << 31, 1 << 31, &[], &params),
            Err(PipelineError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &SmoothingParams::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &SmoothingParams::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_validates_params_before_decoding() {
        let params = SmoothingParams {
            sharpness: -1.0,
            ..SmoothingParams::default()
        };
        assert!(matches!(
            process(&[], &params),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn process_decodes_and_filters() {
        let img = rippled_skin(16, 12);
        let params = SmoothingParams::default();
        let out = process(&encode_png(&img), &params).unwrap();
        assert_eq!(out, smooth_skin(&img, &params).unwrap());
        assert_ne!(out, img);
    }
}
