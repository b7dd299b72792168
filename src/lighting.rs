//! Lighting normalization: shift the blended image's luminance toward the
//! original photograph's average so the composited garment sits in the same
//! light as the rest of the scene.

use image::{Rgb, RgbImage};
use palette::{FromColor, Lab, Srgb};

/// Damping applied to the mean-luminance difference. Deliberately
/// under-corrects so the garment keeps its own shading.
const ADJUSTMENT_DAMPING: f32 = 0.7;

/// Shift the result image's lightness so its mean matches the original's.
///
/// Both images are converted to Lab, the mean L difference is computed, and
/// 0.7 of that difference is added to every L value of the result (clamped
/// to the valid range) before converting back.
pub fn match_luminance(result: &RgbImage, original: &RgbImage) -> RgbImage {
    let result_lab = to_lab(result);
    let shift = ADJUSTMENT_DAMPING * (mean_lightness_of(original) - mean_lightness(&result_lab));

    let mut adjusted = RgbImage::new(result.width(), result.height());
    for (pixel, lab) in adjusted.pixels_mut().zip(result_lab.iter()) {
        let mut lab = *lab;
        lab.l = (lab.l + shift).clamp(0.0, 100.0);
        let rgb = Srgb::from_color(lab);
        *pixel = Rgb([
            (rgb.red * 255.0).round().clamp(0.0, 255.0) as u8,
            (rgb.green * 255.0).round().clamp(0.0, 255.0) as u8,
            (rgb.blue * 255.0).round().clamp(0.0, 255.0) as u8,
        ]);
    }
    adjusted
}

fn to_lab(image: &RgbImage) -> Vec<Lab> {
    image
        .pixels()
        .map(|pixel| {
            let Rgb([r, g, b]) = *pixel;
            Lab::from_color(Srgb::new(
                f32::from(r) / 255.0,
                f32::from(g) / 255.0,
                f32::from(b) / 255.0,
            ))
        })
        .collect()
}

fn mean_lightness(lab: &[Lab]) -> f32 {
    let sum: f64 = lab.iter().map(|c| f64::from(c.l)).sum();
    (sum / lab.len() as f64) as f32
}

fn mean_lightness_of(image: &RgbImage) -> f32 {
    mean_lightness(&to_lab(image))
}
