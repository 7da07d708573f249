//! smoothskin: apply the skin smoothing filter to an image file.
//!
//! Decodes the input, runs the four-stage filter, and writes the result.
//! Optionally exports the skin mask, a before/after fade comparison, and
//! per-stage diagnostics (as a report or JSON). With `--runs N` the
//! filter is repeated and timings are summarized, which is handy when
//! tuning parameters on a specific photo.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin smoothskin -- [OPTIONS] <INPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use image::{Rgba, RgbaImage};
use smoothskin_pipeline::SmoothingParams;
use smoothskin_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use tracing_subscriber::EnvFilter;

/// Smooth skin in a photo while keeping facial contours sharp.
#[derive(Parser)]
#[command(name = "smoothskin", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Output image path. Defaults to `<input stem>-smoothed.png` next
    /// to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Smoothing strength (0-100).
    #[arg(long, default_value_t = percent(SmoothingParams::DEFAULT_INTENSITY), value_parser = percent_parser())]
    intensity: u32,

    /// Texture preservation (0-100). Higher keeps more pore detail.
    #[arg(long, default_value_t = percent(SmoothingParams::DEFAULT_TEXTURE_PRESERVE), value_parser = percent_parser())]
    texture_preserve: u32,

    /// Skin detection strictness (0-100). Higher accepts fewer pixels.
    #[arg(long, default_value_t = percent(SmoothingParams::DEFAULT_SKIN_RANGE), value_parser = percent_parser())]
    skin_range: u32,

    /// Edge restoration strength (0-100).
    #[arg(long, default_value_t = percent(SmoothingParams::DEFAULT_SHARPNESS), value_parser = percent_parser())]
    sharpness: u32,

    /// Full parameter set as a JSON string (normalized 0.0-1.0 values).
    ///
    /// When provided, the individual parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Also write the smoothed skin mask as a grayscale PNG.
    #[arg(long, value_name = "PATH")]
    mask_output: Option<PathBuf>,

    /// Also write a before/after comparison: original on one side,
    /// filtered on the other, with a linear fade between them.
    #[arg(long, value_name = "PATH")]
    compare: Option<PathBuf>,

    /// Clockwise rotation of the comparison fade in degrees.
    /// 0 = left-to-right, 90 = top-to-bottom.
    #[arg(long, value_name = "DEG", default_value_t = 0.0)]
    compare_angle: f64,

    /// Print the per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of the human-readable report.
    #[arg(long)]
    json: bool,

    /// Number of runs for averaging timings.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins
    /// when set.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Normalized parameter to a 0-100 slider value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn percent(value: f32) -> u32 {
    (value * 100.0 + 0.5) as u32
}

fn percent_parser() -> clap::builder::RangedU64ValueParser<u32> {
    clap::builder::RangedU64ValueParser::<u32>::new().range(0..=100)
}

/// Build [`SmoothingParams`] from CLI arguments.
///
/// `--config-json` takes precedence over the individual flags.
fn params_from_cli(cli: &Cli) -> Result<SmoothingParams, String> {
    if let Some(ref json) = cli.config_json {
        let params: SmoothingParams = serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?;
        params
            .validate()
            .map_err(|e| format!("Invalid --config-json: {e}"))?;
        return Ok(params);
    }

    SmoothingParams::from_percentages(
        cli.intensity,
        cli.texture_preserve,
        cli.skin_range,
        cli.sharpness,
    )
    .map_err(|e| e.to_string())
}

/// `photo.jpg` -> `photo-smoothed.png` in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}-smoothed.png"))
}

fn init_tracing(verbose: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("logging disabled: {err}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let params = params_from_cli(cli)?;

    let image_bytes = std::fs::read(&cli.input)
        .map_err(|e| format!("Error reading {}: {e}", cli.input.display()))?;
    let image = smoothskin_pipeline::decode::decode_rgba(&image_bytes)
        .map_err(|e| format!("Error decoding {}: {e}", cli.input.display()))?;

    tracing::info!(
        input = %cli.input.display(),
        bytes = image_bytes.len(),
        width = image.width(),
        height = image.height(),
        ?params,
        runs = cli.runs,
        "loaded image"
    );

    let mut first_result = None;
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            tracing::info!("run {}/{}", run + 1, cli.runs);
        }

        let (staged, diagnostics) =
            smoothskin_pipeline::diagnostics::process_staged_with_diagnostics(
                &image, &params, &StdClock,
            )
            .map_err(|e| format!("Pipeline error: {e}"))?;

        if cli.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else if cli.diagnostics {
            println!("{}", diagnostics.report());
        }

        if first_result.is_none() {
            first_result = Some(staged);
        }
        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let staged = first_result.ok_or_else(|| "no pipeline runs completed".to_string())?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    save(&staged.sharpened, &output, "output")?;

    if let Some(ref path) = cli.mask_output {
        save(&staged.mask.to_gray_image(), path, "mask")?;
    }

    if let Some(ref path) = cli.compare {
        let fade = FadeParams::new(cli.compare_angle);
        let comparison = blend_images(&staged.original, &staged.sharpened, &fade);
        save(&comparison, path, "comparison")?;
    }

    Ok(())
}

fn save<P, C>(image: &image::ImageBuffer<P, C>, path: &Path, what: &str) -> Result<(), String>
where
    P: image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
    C: std::ops::Deref<Target = [P::Subpixel]>,
{
    image
        .save(path)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote {what}");
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Skin Detection", |d| d.skin_detection.duration),
        ("Mask Smoothing", |d| d.mask_smoothing.duration),
        ("Bilateral Smoothing", |d| d.smoothing.duration),
        ("Sharpening", |d| d.sharpening.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

// ---------------------------------------------------------------------------
// Comparison image
// ---------------------------------------------------------------------------

/// Direction of the comparison fade. The 50/50 point is the image center.
struct FadeParams {
    /// Clockwise rotation angle in radians.
    angle_rad: f64,
}

impl FadeParams {
    fn new(angle_deg: f64) -> Self {
        Self {
            angle_rad: angle_deg.to_radians(),
        }
    }
}

/// Blend two same-sized RGBA images along a directed linear gradient.
///
/// `t = 0` (all `original`) at the start of the gradient axis, `t = 1`
/// (all `processed`) at the end, `t = 0.5` through the image center.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_images(original: &RgbaImage, processed: &RgbaImage, fade: &FadeParams) -> RgbaImage {
    let (width, height) = original.dimensions();

    let w = f64::from(width);
    let h = f64::from(height);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let cos_a = fade.angle_rad.cos();
    let sin_a = fade.angle_rad.sin();

    // Half-extent of the gradient: the farthest corner projection.
    let half_extent = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
        .iter()
        .map(|&(x, y)| (x - cx).mul_add(cos_a, (y - cy) * sin_a).abs())
        .fold(0.0, f64::max);

    let inv_extent = if half_extent > f64::EPSILON {
        0.5 / half_extent
    } else {
        0.0
    };

    RgbaImage::from_fn(width, height, |x_px, y_px| {
        let proj = (f64::from(x_px) + 0.5 - cx).mul_add(cos_a, (f64::from(y_px) + 0.5 - cy) * sin_a);
        let t = proj.mul_add(inv_extent, 0.5).clamp(0.0, 1.0);

        let orig = original.get_pixel(x_px, y_px).0;
        let proc_px = processed.get_pixel(x_px, y_px).0;
        let blend = |o: u8, p: u8| -> u8 {
            let val = f64::from(o).mul_add(1.0 - t, f64::from(p) * t);
            val.round().clamp(0.0, 255.0) as u8
        };

        Rgba(std::array::from_fn(|c| blend(orig[c], proc_px[c])))
    })
}
