//! Row-parallel dispatch for the per-pixel stages.
//!
//! Every neighborhood stage reads from a frozen input and writes each
//! output row independently, so rows can be handed to `rayon` workers
//! without locking. Small images stay on the calling thread where the
//! pool overhead would dominate.

use rayon::prelude::*;

/// Pixel count at or above which rows are processed in parallel.
pub const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Run `f(y, row)` for every row of a row-major buffer.
///
/// `row_len` is the number of elements per row (e.g. `width * 4` for
/// RGBA bytes, `width` for a mask). `pixel_count` decides between the
/// parallel and sequential paths; both produce identical results since
/// each call only touches its own row.
pub fn for_each_row_mut<T, F>(data: &mut [T], row_len: usize, pixel_count: usize, f: F)
where
    T: Send,
    F: Fn(u32, &mut [T]) + Sync,
{
    if row_len == 0 {
        return;
    }

    if pixel_count >= PARALLEL_THRESHOLD {
        data.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| f(row_index(y), row));
    } else {
        for (y, row) in data.chunks_mut(row_len).enumerate() {
            f(row_index(y), row);
        }
    }
}

/// Row indices come from `u32` image heights, so they always fit.
#[allow(clippy::cast_possible_truncation)]
const fn row_index(y: usize) -> u32 {
    y as u32
}
