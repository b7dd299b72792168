//! Compositor: resizes the isolated garment into its placement region and
//! alpha-blends it onto the person image, reinjecting a fraction of the
//! garment's own high-frequency detail to counteract resampling blur.

use image::{imageops, imageops::FilterType, GrayImage, Rgb, RgbImage, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

use crate::region::PlacementRegion;

/// Fraction of the garment's high-frequency residual added back during the
/// blend.
const DETAIL_STRENGTH: f32 = 0.3;

/// Sigma matching a 5x5 Gaussian kernel; the blur that defines the
/// high-frequency residual.
const DETAIL_SIGMA: f32 = 1.1;

/// Placement region clamped to image bounds, plus the extent of garment
/// pixels actually pasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClippedRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Blend the isolated garment onto the person image inside the placement
/// region.
///
/// The garment is resized to the region's extent with Lanczos3 to minimize
/// texture loss, re-squashed if the region overruns the right or bottom
/// edge, and shrunk when the origin is negative. Per pixel and channel:
///
/// `result = (1 - a) * original + a * (garment + 0.3 * detail)`
///
/// where `a` is the garment alpha scaled by the person-mask value, so the
/// blend never paints over background pixels the mask excludes, and
/// `detail` is the garment minus its own Gaussian blur. A region or clipped
/// extent that collapses to zero leaves the person image untouched.
pub fn composite(
    person: &RgbImage,
    garment: &RgbaImage,
    person_mask: &GrayImage,
    region: &PlacementRegion,
) -> RgbImage {
    let mut result = person.clone();

    let Some((clipped, garment)) = fit_garment(garment, region, person.width(), person.height())
    else {
        log::debug!("placement region collapsed, skipping blend");
        return result;
    };

    let garment_rgb = drop_alpha(&garment);
    let blurred = gaussian_blur_f32(&garment_rgb, DETAIL_SIGMA);

    for dy in 0..clipped.height {
        for dx in 0..clipped.width {
            let (px, py) = (clipped.x + dx, clipped.y + dy);

            let garment_pixel = garment.get_pixel(dx, dy);
            let mask_weight = f32::from(person_mask.get_pixel(px, py).0[0]) / 255.0;
            let alpha = f32::from(garment_pixel.0[3]) / 255.0 * mask_weight;

            if alpha == 0.0 {
                continue;
            }

            let blur_pixel = blurred.get_pixel(dx, dy);
            let original = result.get_pixel(px, py);
            let mut blended = [0u8; 3];
            for c in 0..3 {
                let garment_value = f32::from(garment_pixel.0[c]);
                let detail = garment_value - f32::from(blur_pixel.0[c]);
                let value = (1.0 - alpha) * f32::from(original.0[c])
                    + alpha * (garment_value + DETAIL_STRENGTH * detail);
                blended[c] = value.clamp(0.0, 255.0).round() as u8;
            }
            result.put_pixel(px, py, Rgb(blended));
        }
    }

    result
}

/// Resize the garment into the region and clip against image bounds.
///
/// Negative origins shrink the pasted extent (the garment keeps its
/// top-left corner, matching the observed placement behavior); right or
/// bottom overflow re-resizes the garment down to the remaining space.
/// Returns `None` when nothing is left to paste.
fn fit_garment(
    garment: &RgbaImage,
    region: &PlacementRegion,
    image_width: u32,
    image_height: u32,
) -> Option<(ClippedRegion, RgbaImage)> {
    if region.width <= 0 || region.height <= 0 {
        return None;
    }

    let mut x = region.x;
    let mut y = region.y;
    let mut width = region.width;
    let mut height = region.height;

    if x < 0 {
        width += x;
        x = 0;
    }
    if y < 0 {
        height += y;
        y = 0;
    }
    if width <= 0 || height <= 0 || x >= image_width as i32 || y >= image_height as i32 {
        return None;
    }

    let mut resized = imageops::resize(
        garment,
        region.width as u32,
        region.height as u32,
        FilterType::Lanczos3,
    );

    // 負の原点で縮んだ分はガーメントの左上ウィンドウを切り出す
    if (resized.width(), resized.height()) != (width as u32, height as u32) {
        resized = imageops::crop_imm(&resized, 0, 0, width as u32, height as u32).to_image();
    }

    // 右端・下端からはみ出す分は残りの空間へ再リサイズ
    if y as u32 + height as u32 > image_height {
        height = (image_height - y as u32) as i32;
    }
    if x as u32 + width as u32 > image_width {
        width = (image_width - x as u32) as i32;
    }
    if width <= 0 || height <= 0 {
        return None;
    }
    if (resized.width(), resized.height()) != (width as u32, height as u32) {
        resized = imageops::resize(&resized, width as u32, height as u32, FilterType::Lanczos3);
    }

    Some((
        ClippedRegion {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
        },
        resized,
    ))
}

fn drop_alpha(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y);
        Rgb([p.0[0], p.0[1], p.0[2]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn full_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([255]))
    }

    fn solid_garment(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    #[test]
    fn test_zero_alpha_garment_is_identity() {
        let person = RgbImage::from_pixel(100, 100, Rgb([40, 80, 120]));
        let garment = solid_garment(50, 50, [200, 10, 10, 0]);
        let region = PlacementRegion {
            x: 10,
            y: 10,
            width: 50,
            height: 50,
        };

        let result = composite(&person, &garment, &full_mask(100, 100), &region);
        assert_eq!(result, person);
    }

    #[test]
    fn test_full_alpha_solid_garment_replaces_region() {
        // 単色ガーメントでは detail ≡ 0 となり、結果はガーメント色そのもの
        let person = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let garment = solid_garment(32, 32, [90, 140, 200, 255]);
        let region = PlacementRegion {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
        };

        let result = composite(&person, &garment, &full_mask(64, 64), &region);
        for pixel in result.pixels() {
            assert_eq!(pixel.0, [90, 140, 200]);
        }
    }

    #[test]
    fn test_mask_excluded_pixels_stay_untouched() {
        let person = RgbImage::from_pixel(64, 64, Rgb([10, 20, 30]));
        let garment = solid_garment(32, 32, [255, 0, 0, 255]);
        let region = PlacementRegion {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
        };

        // マスクの左半分だけが人物
        let mask = GrayImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let result = composite(&person, &garment, &mask, &region);
        assert_eq!(result.get_pixel(16, 16).0, [255, 0, 0]);
        assert_eq!(result.get_pixel(48, 16).0, [10, 20, 30]);
    }

    #[test]
    fn test_oversized_region_never_writes_out_of_bounds() {
        let person = RgbImage::from_pixel(60, 40, Rgb([7, 7, 7]));
        let garment = solid_garment(16, 16, [250, 250, 250, 255]);
        let oversized = [
            PlacementRegion {
                x: 30,
                y: 20,
                width: 100,
                height: 100,
            },
            PlacementRegion {
                x: -25,
                y: -25,
                width: 50,
                height: 50,
            },
            PlacementRegion {
                x: -10,
                y: 35,
                width: 200,
                height: 300,
            },
        ];

        for region in oversized {
            let result = composite(&person, &garment, &full_mask(60, 40), &region);
            assert_eq!(result.dimensions(), person.dimensions());

            // クランプ後の矩形の外側のピクセルは変更されない
            let x0 = region.x.max(0);
            let y0 = region.y.max(0);
            let x1 = (region.x + region.width).min(60);
            let y1 = (region.y + region.height).min(40);
            for (x, y, pixel) in result.enumerate_pixels() {
                let inside =
                    (x as i32) >= x0 && (x as i32) < x1 && (y as i32) >= y0 && (y as i32) < y1;
                if !inside {
                    assert_eq!(pixel.0, [7, 7, 7], "pixel ({x}, {y}) was touched");
                }
            }
        }
    }

    #[test]
    fn test_fully_outside_region_is_identity() {
        let person = RgbImage::from_pixel(32, 32, Rgb([1, 2, 3]));
        let garment = solid_garment(8, 8, [255, 255, 255, 255]);
        let region = PlacementRegion {
            x: 100,
            y: 100,
            width: 10,
            height: 10,
        };

        let result = composite(&person, &garment, &full_mask(32, 32), &region);
        assert_eq!(result, person);
    }

    #[test]
    fn test_degenerate_region_is_identity() {
        let person = RgbImage::from_pixel(32, 32, Rgb([5, 5, 5]));
        let garment = solid_garment(8, 8, [255, 255, 255, 255]);
        let region = PlacementRegion {
            x: 4,
            y: 4,
            width: 0,
            height: -3,
        };

        let result = composite(&person, &garment, &full_mask(32, 32), &region);
        assert_eq!(result, person);
    }

    #[test]
    fn test_negative_origin_shrinks_pasted_extent() {
        let person = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
        let garment = solid_garment(16, 16, [200, 200, 200, 255]);
        let region = PlacementRegion {
            x: -10,
            y: -10,
            width: 30,
            height: 30,
        };

        let result = composite(&person, &garment, &full_mask(40, 40), &region);
        // 貼り付け範囲は (0,0)..(20,20) に縮む
        assert_eq!(result.get_pixel(10, 10).0, [200, 200, 200]);
        assert_eq!(result.get_pixel(25, 25).0, [0, 0, 0]);
    }
}
