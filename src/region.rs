//! Region calculation: maps body landmarks (or the person mask's largest
//! contour as fallback) plus a garment class to the rectangle the garment is
//! composited into.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};

use crate::perception::BodyLandmarks;

/// Garment-type strings recognized as upper-body garments.
const UPPER_BODY_TYPES: [&str; 5] = ["shirt", "tshirt", "top", "blouse", "jacket"];

/// Garment-type strings recognized as lower-body garments.
const LOWER_BODY_TYPES: [&str; 4] = ["pants", "trousers", "jeans", "shorts"];

/// Coarse garment classification driving placement policy.
///
/// Derived from the free-text garment-type field; anything outside the fixed
/// vocabulary degrades to `Other` rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarmentClass {
    UpperBody,
    LowerBody,
    Other,
}

impl GarmentClass {
    /// Classify a free-text garment-type string (case-insensitive,
    /// whitespace-trimmed).
    pub fn classify(garment_type: &str) -> Self {
        let normalized = garment_type.trim().to_lowercase();
        if UPPER_BODY_TYPES.contains(&normalized.as_str()) {
            Self::UpperBody
        } else if LOWER_BODY_TYPES.contains(&normalized.as_str()) {
            Self::LowerBody
        } else {
            Self::Other
        }
    }
}

/// Axis-aligned placement rectangle in person-image pixel coordinates.
///
/// May extend outside image bounds or carry a negative origin; the
/// compositor clamps it before any pixel is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PlacementRegion {
    /// Fixed tiny region returned when neither landmarks nor a contour
    /// exist. The compositor treats it as a near-no-op.
    pub const NO_SIGNAL: Self = Self {
        x: 0,
        y: 0,
        width: 100,
        height: 100,
    };

    /// Compute the placement region from body landmarks.
    ///
    /// Margins are fixed pixel offsets taken from the placement policy:
    /// upper-body garments span shoulders to hips, lower-body garments hang
    /// a fixed 200px from the hip line. The 200px extent deliberately does
    /// not scale with image resolution; see DESIGN.md.
    pub fn from_landmarks(landmarks: &BodyLandmarks, class: GarmentClass) -> Self {
        let (left_shoulder, right_shoulder) = (landmarks.left_shoulder, landmarks.right_shoulder);
        let (left_hip, right_hip) = (landmarks.left_hip, landmarks.right_hip);

        let (top, bottom, left, right) = match class {
            GarmentClass::UpperBody => (
                left_shoulder.1.min(right_shoulder.1) - 20,
                left_hip.1.max(right_hip.1) + 20,
                left_shoulder.0.min(left_hip.0) - 30,
                right_shoulder.0.max(right_hip.0) + 30,
            ),
            GarmentClass::LowerBody => {
                let top = left_hip.1.min(right_hip.1) - 20;
                (
                    top,
                    top + 200,
                    left_hip.0.min(left_shoulder.0) - 20,
                    right_hip.0.max(right_shoulder.0) + 20,
                )
            }
            GarmentClass::Other => (
                left_shoulder.1.min(right_shoulder.1) - 20,
                left_hip.1.max(right_hip.1) + 100,
                left_shoulder.0.min(left_hip.0) - 30,
                right_shoulder.0.max(right_hip.0) + 30,
            ),
        };

        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Compute the placement region from the cleaned person mask.
    ///
    /// Takes the bounding box of the largest outer contour, then shrinks it
    /// vertically per garment class: upper-body garments occupy the top 60%
    /// starting 10% down, lower-body garments the bottom 60% starting 40%
    /// down. Returns `None` when the mask has no contour at all.
    pub fn from_mask(mask: &GrayImage, class: GarmentClass) -> Option<Self> {
        let (x, y, w, h) = largest_contour_bounds(mask)?;

        let region = match class {
            GarmentClass::UpperBody => Self {
                x,
                y: y + h / 10,
                width: w,
                height: h * 6 / 10,
            },
            GarmentClass::LowerBody => Self {
                x,
                y: y + h * 4 / 10,
                width: w,
                height: h * 6 / 10,
            },
            GarmentClass::Other => Self {
                x,
                y,
                width: w,
                height: h,
            },
        };

        Some(region)
    }

    /// Pick the placement region per the tie-break rule: landmarks always
    /// win over the mask-derived bounding box, and the no-signal default is
    /// used only when both are missing.
    pub fn select(
        landmarks: Option<&BodyLandmarks>,
        mask: &GrayImage,
        class: GarmentClass,
    ) -> Self {
        match landmarks {
            Some(lm) => Self::from_landmarks(lm, class),
            None => Self::from_mask(mask, class).unwrap_or(Self::NO_SIGNAL),
        }
    }
}

/// Bounding box (x, y, w, h) of the largest outer contour of a binary mask.
fn largest_contour_bounds(mask: &GrayImage) -> Option<(i32, i32, i32, i32)> {
    let contours: Vec<Contour<i32>> = find_contours(mask);

    contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && !c.points.is_empty())
        .map(|c| {
            let min_x = c.points.iter().map(|p| p.x).min().unwrap_or(0);
            let max_x = c.points.iter().map(|p| p.x).max().unwrap_or(0);
            let min_y = c.points.iter().map(|p| p.y).min().unwrap_or(0);
            let max_y = c.points.iter().map(|p| p.y).max().unwrap_or(0);
            (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
        })
        .max_by_key(|&(_, _, w, h)| i64::from(w) * i64::from(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn landmarks_400x600() -> BodyLandmarks {
        BodyLandmarks {
            left_shoulder: (100, 150),
            right_shoulder: (300, 150),
            left_hip: (110, 400),
            right_hip: (290, 400),
            left_elbow: (80, 280),
            right_elbow: (320, 280),
        }
    }

    #[test]
    fn test_classify_garment_types() {
        // 大文字小文字と前後の空白は無視される
        let cases = [
            ("tshirt", GarmentClass::UpperBody),
            ("Shirt", GarmentClass::UpperBody),
            ("BLOUSE", GarmentClass::UpperBody),
            ("  jacket ", GarmentClass::UpperBody),
            ("jeans", GarmentClass::LowerBody),
            ("Shorts", GarmentClass::LowerBody),
            ("hat", GarmentClass::Other),
            ("", GarmentClass::Other),
        ];

        for (input, expected) in cases {
            assert_eq!(GarmentClass::classify(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_upper_body_region_from_landmarks() {
        let region =
            PlacementRegion::from_landmarks(&landmarks_400x600(), GarmentClass::UpperBody);

        assert_eq!(region.x, 70);
        assert_eq!(region.y, 130);
        assert_eq!(region.width, 260);
        assert_eq!(region.height, 290);
    }

    #[test]
    fn test_lower_body_region_has_fixed_extent() {
        let region =
            PlacementRegion::from_landmarks(&landmarks_400x600(), GarmentClass::LowerBody);

        assert_eq!(region.y, 380);
        assert_eq!(region.height, 200);
        assert_eq!(region.x, 80);
        assert_eq!(region.width, 240);
    }

    #[test]
    fn test_other_region_extends_below_hips() {
        let region = PlacementRegion::from_landmarks(&landmarks_400x600(), GarmentClass::Other);

        assert_eq!(region.y, 130);
        assert_eq!(region.height, 370);
    }

    #[test]
    fn test_mask_fallback_uses_largest_contour() {
        // 100x200 の矩形前景（原点 50,100）を持つマスク
        let mut mask = GrayImage::new(400, 600);
        for y in 100..300 {
            for x in 50..150 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let region = PlacementRegion::from_mask(&mask, GarmentClass::UpperBody).unwrap();
        assert_eq!(region.x, 50);
        assert_eq!(region.y, 100 + 200 / 10);
        assert_eq!(region.width, 100);
        assert_eq!(region.height, 200 * 6 / 10);

        let lower = PlacementRegion::from_mask(&mask, GarmentClass::LowerBody).unwrap();
        assert_eq!(lower.y, 100 + 200 * 4 / 10);
        assert_eq!(lower.height, 200 * 6 / 10);
    }

    #[test]
    fn test_empty_mask_yields_no_region() {
        let mask = GrayImage::new(64, 64);
        assert!(PlacementRegion::from_mask(&mask, GarmentClass::Other).is_none());
    }

    #[test]
    fn test_select_prefers_landmarks_over_mask() {
        let mut mask = GrayImage::new(400, 600);
        for y in 0..600 {
            for x in 0..400 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let landmarks = landmarks_400x600();
        let region = PlacementRegion::select(Some(&landmarks), &mask, GarmentClass::UpperBody);
        assert_eq!(
            region,
            PlacementRegion::from_landmarks(&landmarks, GarmentClass::UpperBody)
        );
    }

    #[test]
    fn test_select_falls_back_to_no_signal() {
        let mask = GrayImage::new(64, 64);
        let region = PlacementRegion::select(None, &mask, GarmentClass::UpperBody);
        assert_eq!(region, PlacementRegion::NO_SIGNAL);
    }
}
