//! Integration tests: whole-pipeline properties through the public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use smoothskin_pipeline::{
    PipelineError, RgbaImage, SmoothingParams, bilateral, sharpen, skin, smooth_skin,
    smooth_skin_raw,
};

const SKIN: [u8; 4] = [220, 170, 140, 255];

/// A face-like test card: rippled skin oval on a blue background,
/// with a darker "lip" band and varying alpha.
fn test_card(width: u32, height: u32) -> RgbaImage {
    let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
    RgbaImage::from_fn(width, height, |x, y| {
        let dx = (f64::from(x) - cx) / cx;
        let dy = (f64::from(y) - cy) / cy;
        #[allow(clippy::cast_possible_truncation)]
        let alpha = 155 + ((x + y) % 100) as u8;
        if dx.hypot(dy) > 0.8 {
            return image::Rgba([25, 50, 190, alpha]);
        }
        if y == height * 2 / 3 {
            return image::Rgba([170, 80, 80, alpha]);
        }
        #[allow(clippy::cast_possible_truncation)]
        let ripple = ((x * 13 + y * 7) % 15) as u8;
        image::Rgba([212 + ripple, 162 + ripple, 132 + ripple, alpha])
    })
}

fn param_grid() -> Vec<SmoothingParams> {
    let mut grid = Vec::new();
    for intensity in [0.0, 0.5, 1.0] {
        for texture_preserve in [0.0, 1.0] {
            for skin_range in [0.0, 1.0] {
                for sharpness in [0.0, 1.0] {
                    grid.push(SmoothingParams {
                        intensity,
                        texture_preserve,
                        skin_range,
                        sharpness,
                    });
                }
            }
        }
    }
    grid
}

#[test]
fn uniform_skin_scenario_is_unchanged() {
    let img = RgbaImage::from_pixel(4, 4, image::Rgba(SKIN));
    let params = SmoothingParams::from_percentages(50, 70, 50, 30).unwrap();
    let out = smooth_skin(&img, &params).unwrap();
    for p in out.pixels() {
        assert_eq!(p.0, SKIN);
    }
}

#[test]
fn dimensions_are_preserved() {
    let params = SmoothingParams::default();
    for (w, h) in [(1, 1), (1, 7), (3, 2), (17, 5), (40, 31)] {
        let out = smooth_skin(&test_card(w, h), &params).unwrap();
        assert_eq!(out.dimensions(), (w, h));
    }
}

#[test]
fn alpha_is_preserved_for_all_params() {
    let img = test_card(30, 24);
    for params in param_grid() {
        let out = smooth_skin(&img, &params).unwrap();
        for (a, b) in img.pixels().zip(out.pixels()) {
            assert_eq!(a.0[3], b.0[3], "{params:?}");
        }
    }
}

#[test]
fn zero_intensity_smoothing_is_identity() {
    let img = test_card(30, 24);
    let raw = skin::detect_skin(&img, 0.0);
    let mask = smoothskin_pipeline::mask::smooth_mask(&raw);
    for texture_preserve in [0.0, 0.5, 1.0] {
        let out = bilateral::smooth(&img, &mask, 0.0, texture_preserve).unwrap();
        assert_eq!(out, img);
    }
}

#[test]
fn zero_sharpness_sharpening_is_identity() {
    let img = test_card(30, 24);
    let raw = skin::detect_skin(&img, 0.0);
    let mask = smoothskin_pipeline::mask::smooth_mask(&raw);
    assert_eq!(sharpen::sharpen(&img, &mask, 0.0).unwrap(), img);
}

#[test]
fn zero_intensity_and_sharpness_is_identity_end_to_end() {
    let img = test_card(30, 24);
    let params = SmoothingParams {
        intensity: 0.0,
        sharpness: 0.0,
        ..SmoothingParams::default()
    };
    assert_eq!(smooth_skin(&img, &params).unwrap(), img);
}

#[test]
fn images_without_skin_are_unchanged() {
    let blue = RgbaImage::from_pixel(12, 9, image::Rgba([0, 0, 255, 255]));
    let gray = RgbaImage::from_fn(12, 9, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        let v = ((x * 20 + y * 9) % 256) as u8;
        image::Rgba([v, v, v, 200])
    });
    for img in [blue, gray] {
        for params in param_grid() {
            assert_eq!(smooth_skin(&img, &params).unwrap(), img, "{params:?}");
        }
    }
}

#[test]
fn repeated_runs_are_identical() {
    let img = test_card(48, 40);
    let params = SmoothingParams {
        intensity: 0.8,
        texture_preserve: 0.2,
        skin_range: 0.3,
        sharpness: 0.6,
    };
    let first = smooth_skin(&img, &params).unwrap();
    for _ in 0..3 {
        assert_eq!(smooth_skin(&img, &params).unwrap(), first);
    }
}

#[test]
fn large_images_take_the_parallel_path_deterministically() {
    // 320 x 220 = 70 400 pixels, above the parallel threshold.
    let img = test_card(320, 220);
    let params = SmoothingParams {
        intensity: 0.25,
        ..SmoothingParams::default()
    };
    let a = smooth_skin(&img, &params).unwrap();
    let b = smooth_skin(&img, &params).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.get_pixel(0, 0), img.get_pixel(0, 0));
    assert_ne!(a, img);
}

#[test]
fn smoothing_reduces_skin_noise() {
    let img = test_card(40, 40);
    let params = SmoothingParams {
        intensity: 1.0,
        texture_preserve: 0.0,
        skin_range: 0.5,
        sharpness: 0.0,
    };
    let out = smooth_skin(&img, &params).unwrap();

    // Mean absolute horizontal difference over the skin interior.
    let roughness = |im: &RgbaImage| -> u64 {
        (14..26u32)
            .flat_map(|y| (14..25u32).map(move |x| (x, y)))
            .filter(|&(_, y)| y != 40 * 2 / 3)
            .map(|(x, y)| u64::from(im.get_pixel(x, y).0[0].abs_diff(im.get_pixel(x + 1, y).0[0])))
            .sum()
    };
    assert!(
        roughness(&out) * 2 < roughness(&img),
        "roughness {} -> {}",
        roughness(&img),
        roughness(&out),
    );
}

#[test]
fn high_sharpness_clamps_instead_of_wrapping() {
    // Two skin tones with identical chroma: both score 1.0 and the mask
    // is 1.0 everywhere, so the bright interior pixels overshoot 255.
    let img = RgbaImage::from_fn(6, 6, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([250, 200, 170, 255])
        } else {
            image::Rgba([230, 180, 150, 255])
        }
    });
    let params = SmoothingParams {
        intensity: 0.0,
        texture_preserve: 0.5,
        skin_range: 0.5,
        sharpness: 1.0,
    };
    let out = smooth_skin(&img, &params).unwrap();
    for y in 1..5 {
        for x in 1..5 {
            let p = out.get_pixel(x, y).0;
            if (x + y) % 2 == 0 {
                assert_eq!(p, [255, 220, 190, 255], "bright ({x},{y})");
            } else {
                assert_eq!(p, [210, 160, 130, 255], "dark ({x},{y})");
            }
        }
    }
}

#[test]
fn adversarial_contrast_stays_in_range_and_keeps_alpha() {
    let img = RgbaImage::from_fn(16, 16, |x, y| {
        if (x * 3 + y) % 4 == 0 {
            image::Rgba([255, 255, 255, 7])
        } else {
            image::Rgba([222, 171, 141, 250])
        }
    });
    let params = SmoothingParams {
        intensity: 1.0,
        texture_preserve: 0.0,
        skin_range: 0.0,
        sharpness: 1.0,
    };
    let out = smooth_skin(&img, &params).unwrap();
    for (a, b) in img.pixels().zip(out.pixels()) {
        assert_eq!(a.0[3], b.0[3]);
    }
}

#[test]
fn raw_entry_point_checks_buffer_length() {
    let img = test_card(8, 6);
    let params = SmoothingParams::default();
    let raw = smooth_skin_raw(8, 6, img.as_raw(), &params).unwrap();
    assert_eq!(raw.len(), 8 * 6 * 4);

    let err = smooth_skin_raw(8, 6, &img.as_raw()[4..], &params).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::BufferSize {
            expected: 192,
            actual: 188
        }
    ));
    assert_eq!(err.to_string(), "pixel buffer holds 188 bytes, expected 192");
}

#[test]
fn invalid_params_fail_before_any_work() {
    let img = test_card(8, 6);
    for (params, name) in [
        (
            SmoothingParams {
                intensity: 1.01,
                ..SmoothingParams::default()
            },
            "intensity",
        ),
        (
            SmoothingParams {
                skin_range: f32::NAN,
                ..SmoothingParams::default()
            },
            "skin_range",
        ),
    ] {
        let err = smooth_skin(&img, &params).unwrap_err();
        assert!(
            matches!(err, PipelineError::InvalidParameter { name: n, .. } if n == name),
            "{err}"
        );
    }
}
