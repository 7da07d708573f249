//! Image decoding.
//!
//! Turns encoded bytes (PNG, JPEG, BMP, WebP) into the 8-bit RGBA raster
//! every pipeline stage works on. Whatever the source format, the result
//! always has four channels; sources without alpha come out opaque.

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes into an RGBA raster.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    tracing::debug!(
        input_bytes = bytes.len(),
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded image"
    );
    Ok(img.to_rgba8())
}
