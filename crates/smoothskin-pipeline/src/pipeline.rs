//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::smooth_skin`] which runs the whole filter in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use smoothskin_pipeline::{Pipeline, PipelineError, RgbaImage, SmoothingParams};
//! # fn run(image: RgbaImage) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(image, SmoothingParams::default())?
//!     .detect_skin()
//!     .smooth_mask()
//!     .smooth()?
//!     .sharpen()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. Parameters are
//! validated once, in [`Pipeline::new`], before any pixel is touched.
//!
//! # Memory
//!
//! The final stage holds the original raster, both masks, and two more
//! rasters of the same size. For a 12-megapixel photo that is roughly
//! 240 MB until [`Sharpened::into_result`] hands it off. Callers that
//! only need the output should use [`crate::smooth_skin`], which drops
//! intermediates as soon as the next stage has consumed them.

use crate::diagnostics::{StageMetrics, count_interior_at_least};
use crate::types::{
    Dimensions, PipelineError, RgbaImage, SkinMask, SmoothingParams, StagedResult,
};
use crate::{bilateral, mask, sharpen, skin};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`detect_skin`](Self::detect_skin) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .detect_skin() to continue"]
pub struct Pending {
    params: SmoothingParams,
    original: RgbaImage,
}

impl Pending {
    /// The untouched source raster.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// The validated parameters.
    #[must_use]
    pub const fn params(&self) -> &SmoothingParams {
        &self.params
    }

    /// Score every pixel for skin likelihood.
    pub fn detect_skin(self) -> SkinDetected {
        let raw_mask = skin::detect_skin(&self.original, self.params.skin_range);
        SkinDetected {
            params: self.params,
            original: self.original,
            raw_mask,
        }
    }
}

// ───────────────────────── Stage 1: SkinDetected ─────────────────────

/// Pipeline state after skin detection.
///
/// Call [`smooth_mask`](Self::smooth_mask) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .smooth_mask() to continue"]
pub struct SkinDetected {
    params: SmoothingParams,
    original: RgbaImage,
    raw_mask: SkinMask,
}

impl SkinDetected {
    /// The thresholded likelihood mask.
    #[must_use]
    pub const fn raw_mask(&self) -> &SkinMask {
        &self.raw_mask
    }

    /// Box-average the mask.
    pub fn smooth_mask(self) -> MaskSmoothed {
        let mask = mask::smooth_mask(&self.raw_mask);
        MaskSmoothed {
            params: self.params,
            original: self.original,
            raw_mask: self.raw_mask,
            mask,
        }
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::SkinDetection {
            threshold: skin::acceptance_threshold(self.params.skin_range),
            skin_pixel_count: self.raw_mask.count_at_least(f32::MIN_POSITIVE),
            total_pixel_count: self.raw_mask.dimensions().pixel_count(),
        }
    }
}

// ───────────────────────── Stage 2: MaskSmoothed ─────────────────────

/// Pipeline state after mask smoothing.
///
/// Call [`smooth`](Self::smooth) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
pub struct MaskSmoothed {
    params: SmoothingParams,
    original: RgbaImage,
    raw_mask: SkinMask,
    mask: SkinMask,
}

impl MaskSmoothed {
    /// The smoothed mask that gates the remaining stages.
    #[must_use]
    pub const fn mask(&self) -> &SkinMask {
        &self.mask
    }

    /// Run the bilateral smoothing stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the mask no
    /// longer matches the raster.
    pub fn smooth(self) -> Result<Smoothed, PipelineError> {
        let smoothed = bilateral::smooth(
            &self.original,
            &self.mask,
            self.params.intensity,
            self.params.texture_preserve,
        )?;
        Ok(Smoothed {
            params: self.params,
            original: self.original,
            raw_mask: self.raw_mask,
            mask: self.mask,
            smoothed,
        })
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        StageMetrics::MaskSmoothing {
            radius: mask::MASK_RADIUS,
            mean_before: self.raw_mask.mean(),
            mean_after: self.mask.mean(),
        }
    }
}

// ───────────────────────── Stage 3: Smoothed ─────────────────────────

/// Pipeline state after bilateral smoothing.
///
/// Call [`sharpen`](Self::sharpen) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .sharpen() to continue"]
pub struct Smoothed {
    params: SmoothingParams,
    original: RgbaImage,
    raw_mask: SkinMask,
    mask: SkinMask,
    smoothed: RgbaImage,
}

impl Smoothed {
    /// The smoothed raster.
    #[must_use]
    pub const fn smoothed(&self) -> &RgbaImage {
        &self.smoothed
    }

    /// Run the sharpening stage, the last step.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the mask no
    /// longer matches the raster.
    pub fn sharpen(self) -> Result<Sharpened, PipelineError> {
        let sharpened = sharpen::sharpen(&self.smoothed, &self.mask, self.params.sharpness)?;
        Ok(Sharpened {
            params: self.params,
            original: self.original,
            raw_mask: self.raw_mask,
            mask: self.mask,
            smoothed: self.smoothed,
            sharpened,
        })
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        let intensity = self.params.intensity;
        StageMetrics::Smoothing {
            blur_radius: bilateral::blur_radius(intensity),
            sigma_color: bilateral::sigma_color(self.params.texture_preserve),
            processed_pixel_count: if intensity > 0.0 {
                self.mask.count_at_least(bilateral::MIN_MASK_WEIGHT)
            } else {
                0
            },
        }
    }
}

// ───────────────────────── Stage 4: Sharpened ────────────────────────

/// Pipeline state after sharpening, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`].
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Sharpened {
    params: SmoothingParams,
    original: RgbaImage,
    raw_mask: SkinMask,
    mask: SkinMask,
    smoothed: RgbaImage,
    sharpened: RgbaImage,
}

impl Sharpened {
    /// The final output raster.
    #[must_use]
    pub const fn sharpened(&self) -> &RgbaImage {
        &self.sharpened
    }

    /// Image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.sharpened)
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = self.dimensions();
        StagedResult {
            original: self.original,
            raw_mask: self.raw_mask,
            mask: self.mask,
            smoothed: self.smoothed,
            sharpened: self.sharpened,
            params: self.params,
            dimensions,
        }
    }

    pub(crate) fn stage_metrics(&self) -> StageMetrics {
        let sharpness = self.params.sharpness;
        StageMetrics::Sharpening {
            sharpness,
            processed_pixel_count: if sharpness > 0.0 {
                count_interior_at_least(&self.mask, sharpen::MIN_MASK_WEIGHT)
            } else {
                0
            },
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 5;

/// The output produced by a single pipeline stage.
#[must_use]
pub enum StageOutput<'a> {
    /// Source raster (not yet processed).
    Source {
        /// The original image.
        original: &'a RgbaImage,
    },
    /// Thresholded skin likelihood.
    SkinDetected {
        /// The raw mask.
        raw_mask: &'a SkinMask,
    },
    /// Box-averaged skin likelihood.
    MaskSmoothed {
        /// The smoothed mask.
        mask: &'a SkinMask,
    },
    /// Bilateral smoothing result.
    Smoothed {
        /// The smoothed raster.
        smoothed: &'a RgbaImage,
    },
    /// Sharpening result.
    Sharpened {
        /// The final raster.
        sharpened: &'a RgbaImage,
        /// Image dimensions.
        dimensions: Dimensions,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Each stage struct implements it, and [`Stage`] delegates to whichever
/// variant it holds.
///
/// # Loop pattern
///
/// ```rust
/// # use smoothskin_pipeline::{Pipeline, PipelineError, RgbaImage, SmoothingParams};
/// # use smoothskin_pipeline::pipeline::{Stage, Advance};
/// # fn run(image: RgbaImage) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(image, SmoothingParams::default())?.into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Short name of this stage (e.g. `"source"`, `"mask"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `4` for
    /// Sharpened).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Metrics describing the work done to reach this state, or `None`
    /// for [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(None)` if already at the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if a stage receives
    /// a mask that does not match its raster.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages and return the final [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::SkinDetected(self.detect_skin())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.detect_skin().complete()
    }
}

impl PipelineStage for SkinDetected {
    const NAME: &str = "skin";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::SkinDetected {
            raw_mask: &self.raw_mask,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::MaskSmoothed(self.smooth_mask())))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.smooth_mask().complete()
    }
}

impl PipelineStage for MaskSmoothed {
    const NAME: &str = "mask";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::MaskSmoothed { mask: &self.mask }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Smoothed(self.smooth()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        self.smooth()?.complete()
    }
}

impl PipelineStage for Smoothed {
    const NAME: &str = "smooth";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Smoothed {
            smoothed: &self.smoothed,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Sharpened(self.sharpen()?)))
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.sharpen()?.into_result())
    }
}

impl PipelineStage for Sharpened {
    const NAME: &str = "sharpen";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Sharpened {
            sharpened: &self.sharpened,
            dimensions: self.dimensions(),
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(self.stage_metrics())
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<StagedResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// Use [`From`] conversions to enter the dynamic API from any typed
/// stage, then call [`advance`](Self::advance) in a loop.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`SkinDetected`].
    SkinDetected(SkinDetected),
    /// See [`MaskSmoothed`].
    MaskSmoothed(MaskSmoothed),
    /// See [`Smoothed`].
    Smoothed(Smoothed),
    /// See [`Sharpened`].
    Sharpened(Sharpened),
}

/// Compile-time guard: adding a [`Stage`] variant breaks this match,
/// a reminder to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::SkinDetected(_)
        | Stage::MaskSmoothed(_)
        | Stage::Smoothed(_)
        | Stage::Sharpened(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::SkinDetected(s) => s.$method($($arg),*),
            Self::MaskSmoothed(s) => s.$method($($arg),*),
            Self::Smoothed(s) => s.$method($($arg),*),
            Self::Sharpened(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Short name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics; `None` for `Pending`.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Sharpened(_))
    }

    /// Advance to the next stage; `Ok(None)` consumes a completed
    /// pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // Only the final stage yields `None`, and it was handled above.
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<StagedResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro call `.name()` and `.index()` on `&self`; associated
// constants aren't reachable as `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<SkinDetected> for Stage {
    fn from(s: SkinDetected) -> Self {
        Self::SkinDetected(s)
    }
}

impl From<MaskSmoothed> for Stage {
    fn from(s: MaskSmoothed) -> Self {
        Self::MaskSmoothed(s)
    }
}

impl From<Smoothed> for Stage {
    fn from(s: Smoothed) -> Self {
        Self::Smoothed(s)
    }
}

impl From<Sharpened> for Stage {
    fn from(s: Sharpened) -> Self {
        Self::Sharpened(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental skin smoothing pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Validate `params` and wrap `image` as the [`Pending`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if any parameter is
    /// non-finite or outside `[0, 1]`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: RgbaImage, params: SmoothingParams) -> Result<Pending, PipelineError> {
        params.validate()?;
        tracing::debug!(
            dimensions = %Dimensions::of(&image),
            ?params,
            "starting skin smoothing pipeline"
        );
        Ok(Pending {
            params,
            original: image,
        })
    }
}
