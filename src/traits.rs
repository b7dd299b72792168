use crate::errors::Result;
use image::{ImageBuffer, Luma, RgbImage, RgbaImage};

/// 人物画像と同じ寸法を持つ前景信頼度マップ（値域 [0, 1]）
pub type ConfidenceMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 正規化座標 [0, 1] で表されたキーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedKeypoint {
    pub x: f32,
    pub y: f32,
}

/// ポーズ推定器が報告する 1 件の検出結果
///
/// 座標は正規化済み（画像寸法に依存しない）。ピクセル座標への変換は
/// perception モジュールのアダプタが行う。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseDetection {
    pub left_shoulder: NormalizedKeypoint,
    pub right_shoulder: NormalizedKeypoint,
    pub left_hip: NormalizedKeypoint,
    pub right_hip: NormalizedKeypoint,
    pub left_elbow: NormalizedKeypoint,
    pub right_elbow: NormalizedKeypoint,
}

/// 人物セグメンテーションプロバイダの抽象化
///
/// 依存関係逆転原則（DIP）に従い、具象クラスではなく抽象に依存する
pub trait PersonSegmenter: Send + Sync {
    /// ピクセル単位の前景信頼度マップを返す（入力画像と同じ寸法）
    fn segment(&self, img: &RgbImage) -> Result<ConfidenceMap>;
}

/// ポーズランドマークプロバイダの抽象化
///
/// 検出なしは `None` であり、エラーではない。呼び出し側は必ず分岐する。
pub trait PoseEstimator: Send + Sync {
    /// ゼロまたは 1 件の検出結果を返す
    fn detect(&self, img: &RgbImage) -> Result<Option<PoseDetection>>;
}

/// 背景除去プロバイダの抽象化
///
/// アルファチャンネルが前景を示す RGBA 切り抜きを返す。
/// エラーは garment モジュールのフォールバックで吸収される。
pub trait BackgroundRemover: Send + Sync {
    /// 入力画像と同じ寸法の RGBA 切り抜きを返す
    fn remove_background(&self, img: &RgbImage) -> Result<RgbaImage>;
}

impl<T: PersonSegmenter + ?Sized> PersonSegmenter for &T {
    fn segment(&self, img: &RgbImage) -> Result<ConfidenceMap> {
        (**self).segment(img)
    }
}

impl<T: PoseEstimator + ?Sized> PoseEstimator for &T {
    fn detect(&self, img: &RgbImage) -> Result<Option<PoseDetection>> {
        (**self).detect(img)
    }
}

impl<T: BackgroundRemover + ?Sized> BackgroundRemover for &T {
    fn remove_background(&self, img: &RgbImage) -> Result<RgbaImage> {
        (**self).remove_background(img)
    }
}
