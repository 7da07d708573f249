//! Pipeline diagnostics: timing, pixel counts, and derived parameters
//! for each stage.
//!
//! Intended for parameter tuning and performance work. The library has
//! no clock of its own; callers pass a [`Clock`] to
//! [`process_staged_with_diagnostics`] so the crate stays free of
//! platform time APIs.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{Dimensions, PipelineError, RgbaImage, SkinMask, SmoothingParams, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source supplied by the caller.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: skin likelihood detection.
    pub skin_detection: StageDiagnostics,
    /// Stage 2: mask box-averaging.
    pub mask_smoothing: StageDiagnostics,
    /// Stage 3: bilateral smoothing.
    pub smoothing: StageDiagnostics,
    /// Stage 4: mask-gated sharpening.
    pub sharpening: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Skin likelihood detection metrics.
    SkinDetection {
        /// Acceptance threshold derived from `skin_range`.
        threshold: f32,
        /// Pixels whose likelihood survived the threshold.
        skin_pixel_count: u64,
        /// Total pixel count for computing coverage.
        total_pixel_count: u64,
    },
    /// Mask smoothing metrics.
    MaskSmoothing {
        /// Box window half-width.
        radius: u32,
        /// Mean mask weight before averaging.
        mean_before: f32,
        /// Mean mask weight after averaging.
        mean_after: f32,
    },
    /// Bilateral smoothing metrics.
    Smoothing {
        /// Spatial window half-width.
        blur_radius: u32,
        /// Range kernel sigma.
        sigma_color: f32,
        /// Pixels that passed the mask gate (0 when intensity is 0).
        processed_pixel_count: u64,
    },
    /// Sharpening metrics.
    Sharpening {
        /// Sharpening strength.
        sharpness: f32,
        /// Interior pixels that passed the mask gate (0 when sharpness is 0).
        processed_pixel_count: u64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pixels classified as skin before mask smoothing.
    pub skin_pixel_count: u64,
    /// Pixels changed by at least one channel in the final output.
    pub changed_pixel_count: u64,
}

impl PipelineDiagnostics {
    /// The four stages in execution order, paired with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 4] {
        [
            ("Skin Detection", &self.skin_detection),
            ("Mask Smoothing", &self.mask_smoothing),
            ("Bilateral Smoothing", &self.smoothing),
            ("Sharpening", &self.sharpening),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Skin pixels: {}  |  Changed pixels: {}",
            self.summary.skin_pixel_count, self.summary.changed_pixel_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::SkinDetection {
            threshold,
            skin_pixel_count,
            total_pixel_count,
        } => format!(
            "threshold={threshold:.2} skin={skin_pixel_count} ({:.1}%)",
            percent(*skin_pixel_count, *total_pixel_count),
        ),
        StageMetrics::MaskSmoothing {
            radius,
            mean_before,
            mean_after,
        } => format!("r={radius} mean {mean_before:.3}->{mean_after:.3}"),
        StageMetrics::Smoothing {
            blur_radius,
            sigma_color,
            processed_pixel_count,
        } => format!(
            "r={blur_radius} sigma={sigma_color:.1} processed={processed_pixel_count}"
        ),
        StageMetrics::Sharpening {
            sharpness,
            processed_pixel_count,
        } => format!("amount={sharpness:.2} processed={processed_pixel_count}"),
    }
}

/// Number of interior pixels (excluding the 1-pixel border) whose
/// weight is at least `threshold`.
pub(crate) fn count_interior_at_least(mask: &SkinMask, threshold: f32) -> u64 {
    let (w, h) = (mask.width(), mask.height());
    if w < 3 || h < 3 {
        return 0;
    }
    (1..h - 1)
        .map(|y| {
            mask.row(y)[1..w as usize - 1]
                .iter()
                .map(|&v| u64::from(v >= threshold))
                .sum::<u64>()
        })
        .sum()
}

/// Number of pixels whose RGBA value differs between `a` and `b`.
pub(crate) fn count_changed_pixels(a: &RgbaImage, b: &RgbaImage) -> u64 {
    a.pixels().zip(b.pixels()).map(|(p, q)| u64::from(p != q)).sum()
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// Produces the same [`StagedResult`] as [`crate::process_staged`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `params` fails
/// validation.
pub fn process_staged_with_diagnostics<C: Clock>(
    image: &RgbaImage,
    params: &SmoothingParams,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let pending = Pipeline::new(image.clone(), *params)?;

    let start = clock.now();
    let detected = pending.detect_skin();
    let skin_detection = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: detected.stage_metrics(),
    };

    let start = clock.now();
    let mask_smoothed = detected.smooth_mask();
    let mask_smoothing = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: mask_smoothed.stage_metrics(),
    };

    let start = clock.now();
    let smoothed = mask_smoothed.smooth()?;
    let smoothing = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: smoothed.stage_metrics(),
    };

    let start = clock.now();
    let sharpened = smoothed.sharpen()?;
    let sharpening = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: sharpened.stage_metrics(),
    };

    let staged = sharpened.into_result();
    let total_duration = clock.elapsed(&total_start);

    let Dimensions { width, height } = staged.dimensions;
    let summary = PipelineSummary {
        image_width: width,
        image_height: height,
        pixel_count: staged.dimensions.pixel_count(),
        skin_pixel_count: staged.raw_mask.count_at_least(f32::MIN_POSITIVE),
        changed_pixel_count: count_changed_pixels(&staged.original, &staged.sharpened),
    };

    tracing::info!(
        dimensions = %staged.dimensions,
        total_ms = duration_ms(total_duration),
        skin_pixels = summary.skin_pixel_count,
        changed_pixels = summary.changed_pixel_count,
        "pipeline complete"
    );

    Ok((
        staged,
        PipelineDiagnostics {
            skin_detection,
            mask_smoothing,
            smoothing,
            sharpening,
            total_duration,
            summary,
        },
    ))
}
