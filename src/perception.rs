//! Perception adapters: normalize raw provider outputs into the pipeline's
//! data model. Mask cleanup mirrors the confidence-thresholding plus
//! morphological close/open used before any contour-based geometry.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

use crate::errors::Result;
use crate::traits::{ConfidenceMap, PersonSegmenter, PoseDetection, PoseEstimator};

/// Confidence cutoff applied to the raw segmentation map (fraction of the
/// provider's [0, 1] scale).
const CONFIDENCE_CUTOFF: f32 = 0.1;

/// Radius of the 5x5 square structuring element used for speckle removal.
const CLEANUP_KERNEL_RADIUS: u8 = 2;

/// Named body keypoints in person-image pixel coordinates.
///
/// Coordinates are signed: a detection slightly outside the frame (the pose
/// provider reports normalized coordinates that may leave [0, 1]) still maps
/// to a meaningful position for region arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLandmarks {
    pub left_shoulder: (i32, i32),
    pub right_shoulder: (i32, i32),
    pub left_hip: (i32, i32),
    pub right_hip: (i32, i32),
    pub left_elbow: (i32, i32),
    pub right_elbow: (i32, i32),
}

/// Run both perception providers against the person image and normalize
/// their outputs: a cleaned binary mask and optional pixel-space landmarks.
pub fn extract_person_signals<S, P>(
    segmenter: &S,
    pose: &P,
    person: &RgbImage,
) -> Result<(GrayImage, Option<BodyLandmarks>)>
where
    S: PersonSegmenter,
    P: PoseEstimator,
{
    let confidence = segmenter.segment(person)?;
    let mask = clean_mask(&confidence);

    let landmarks = pose
        .detect(person)?
        .map(|detection| to_pixel_landmarks(&detection, person.width(), person.height()));

    if landmarks.is_some() {
        log::debug!("pose landmarks detected");
    } else {
        log::debug!("no pose landmarks detected, mask fallback available");
    }

    Ok((mask, landmarks))
}

/// Threshold a raw confidence map into a binary mask and remove speckle.
///
/// Close fills small holes inside the person, open drops isolated foreground
/// specks; both use a 5x5 square element. Geometry derived from the mask
/// (contours, bounding boxes) relies on this cleanup having happened.
pub fn clean_mask(confidence: &ConfidenceMap) -> GrayImage {
    let binary = GrayImage::from_fn(confidence.width(), confidence.height(), |x, y| {
        let Luma([v]) = *confidence.get_pixel(x, y);
        if v > CONFIDENCE_CUTOFF {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let closed = close(&binary, Norm::LInf, CLEANUP_KERNEL_RADIUS);
    open(&closed, Norm::LInf, CLEANUP_KERNEL_RADIUS)
}

/// Convert a normalized pose detection to pixel coordinates.
pub fn to_pixel_landmarks(detection: &PoseDetection, width: u32, height: u32) -> BodyLandmarks {
    let scale = |kp: crate::traits::NormalizedKeypoint| {
        (
            (kp.x * width as f32) as i32,
            (kp.y * height as f32) as i32,
        )
    };

    BodyLandmarks {
        left_shoulder: scale(detection.left_shoulder),
        right_shoulder: scale(detection.right_shoulder),
        left_hip: scale(detection.left_hip),
        right_hip: scale(detection.right_hip),
        left_elbow: scale(detection.left_elbow),
        right_elbow: scale(detection.right_elbow),
    }
}
