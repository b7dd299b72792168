use image::{Luma, RgbImage, Rgba, RgbaImage};

use crate::errors::{Result, TryOnError};
use crate::traits::{
    BackgroundRemover, ConfidenceMap, NormalizedKeypoint, PersonSegmenter, PoseDetection,
    PoseEstimator,
};

/// テスト用のモック人物セグメンテーションプロバイダ
///
/// 入力画像と同じ寸法の一様な信頼度マップを返す
#[derive(Debug, Clone)]
pub struct MockPersonSegmenter {
    pub confidence: f32,
}

impl MockPersonSegmenter {
    /// 全面が前景のマップを返すモック
    pub const fn full() -> Self {
        Self { confidence: 1.0 }
    }

    /// 全面が背景のマップを返すモック
    pub const fn empty() -> Self {
        Self { confidence: 0.0 }
    }
}

impl PersonSegmenter for MockPersonSegmenter {
    fn segment(&self, img: &RgbImage) -> Result<ConfidenceMap> {
        Ok(ConfidenceMap::from_pixel(
            img.width(),
            img.height(),
            Luma([self.confidence]),
        ))
    }
}

/// テスト用のモックポーズ推定プロバイダ
///
/// 固定の検出結果（または検出なし）を返す
#[derive(Debug, Clone)]
pub struct MockPoseEstimator {
    pub detection: Option<PoseDetection>,
}

impl MockPoseEstimator {
    /// 検出なしを返すモック
    pub const fn absent() -> Self {
        Self { detection: None }
    }

    /// 典型的な直立姿勢の検出結果を返すモック
    pub fn upright() -> Self {
        let kp = |x, y| NormalizedKeypoint { x, y };
        Self {
            detection: Some(PoseDetection {
                left_shoulder: kp(0.25, 0.25),
                right_shoulder: kp(0.75, 0.25),
                left_hip: kp(0.275, 0.667),
                right_hip: kp(0.725, 0.667),
                left_elbow: kp(0.2, 0.45),
                right_elbow: kp(0.8, 0.45),
            }),
        }
    }
}

impl PoseEstimator for MockPoseEstimator {
    fn detect(&self, _img: &RgbImage) -> Result<Option<PoseDetection>> {
        Ok(self.detection)
    }
}

/// テスト用のモック背景除去プロバイダ
///
/// 入力をそのまま返し、アルファは固定値
#[derive(Debug, Clone)]
pub struct MockBackgroundRemover {
    pub alpha: u8,
}

impl MockBackgroundRemover {
    /// 全面不透明の切り抜きを返すモック
    pub const fn opaque() -> Self {
        Self { alpha: 255 }
    }

    /// 全面透明の切り抜きを返すモック
    pub const fn transparent() -> Self {
        Self { alpha: 0 }
    }
}

impl BackgroundRemover for MockBackgroundRemover {
    fn remove_background(&self, img: &RgbImage) -> Result<RgbaImage> {
        Ok(RgbaImage::from_fn(img.width(), img.height(), |x, y| {
            let p = img.get_pixel(x, y);
            Rgba([p.0[0], p.0[1], p.0[2], self.alpha])
        }))
    }
}

/// 常に失敗する背景除去プロバイダ（フォールバック経路のテスト用）
#[derive(Debug, Clone)]
pub struct FailingBackgroundRemover;

impl BackgroundRemover for FailingBackgroundRemover {
    fn remove_background(&self, _img: &RgbImage) -> Result<RgbaImage> {
        Err(TryOnError::Model {
            operation: "background removal".to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock provider failure",
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_segmenter_matches_dimensions() -> Result<()> {
        let img = RgbImage::new(120, 80);
        let map = MockPersonSegmenter::full().segment(&img)?;
        assert_eq!(map.dimensions(), (120, 80));
        assert!(map.pixels().all(|p| p.0[0] == 1.0));
        Ok(())
    }

    #[test]
    fn test_mock_pose_estimator_states() -> Result<()> {
        let img = RgbImage::new(64, 64);
        assert!(MockPoseEstimator::absent().detect(&img)?.is_none());
        assert!(MockPoseEstimator::upright().detect(&img)?.is_some());
        Ok(())
    }

    #[test]
    fn test_failing_remover_errors() {
        let img = RgbImage::new(16, 16);
        assert!(FailingBackgroundRemover.remove_background(&img).is_err());
    }
}
