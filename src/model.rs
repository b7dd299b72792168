use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, imageops::FilterType, ImageBuffer, RgbImage, Rgba, RgbaImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use once_cell::sync::OnceCell;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;

use crate::errors::{Result, TryOnError};
use crate::traits::{
    BackgroundRemover, ConfidenceMap, NormalizedKeypoint, PersonSegmenter, PoseDetection,
    PoseEstimator,
};

/// Keypoint order produced by the pose model's output tensor.
const KEYPOINT_COUNT: usize = 6;

/// Mean keypoint score below which a pose output is treated as no detection.
const MIN_DETECTION_CONFIDENCE: f32 = 0.5;

fn build_session(model_path: &Path, device_id: i32) -> Result<(Session, u32)> {
    let mut session = SessionBuilder::new()
        .map_err(|e| TryOnError::Model {
            operation: "セッションビルダー初期化".to_string(),
            source: Box::new(e),
        })?
        .with_execution_providers([
            TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
        ])
        .map_err(|e| TryOnError::Model {
            operation: "実行プロバイダー設定".to_string(),
            source: Box::new(e),
        })?
        .with_memory_pattern(true)
        .map_err(|e| TryOnError::Model {
            operation: "メモリパターン設定".to_string(),
            source: Box::new(e),
        })?
        .commit_from_file(model_path)
        .map_err(|e| TryOnError::Model {
            operation: format!("モデルファイル読み込み: {}", model_path.display()),
            source: Box::new(e),
        })?;

    let image_size =
        session.inputs[0]
            .input_type
            .tensor_shape()
            .ok_or_else(|| TryOnError::Model {
                operation: "モデル入力形状取得".to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "テンソル形状が取得できません",
                )),
            })?[2] as u32;

    // initialize model
    let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
    session
        .run(ort::inputs!["img" => TensorRef::from_array_view(&data).map_err(|e| {
            TryOnError::Model {
                operation: "初期化テンソル作成".to_string(),
                source: Box::new(e),
            }
        })?])
        .map_err(|e| TryOnError::Model {
            operation: "モデル初期化実行".to_string(),
            source: Box::new(e),
        })?;

    Ok((session, image_size))
}

/// Resize to the model's square input and normalize to a [0, 1] NCHW tensor.
fn image_to_tensor(img: &RgbImage, image_size: u32) -> Array4<f32> {
    let resized = imageops::resize(img, image_size, image_size, FilterType::Lanczos3);
    resized
        .as_ndarray3()
        .slice_move(s![NewAxis, .., .., ..])
        .map(|&v| f32::from(v) / 255.0)
}

/// Run a single-output mask model and restore the mask to image resolution.
fn predict_mask(
    session: &Mutex<Session>,
    tensor: ArrayView4<f32>,
    image_size: u32,
    width: u32,
    height: u32,
) -> Result<ConfidenceMap> {
    let mask = {
        let mut binding = session.lock();
        let outputs = binding.run(
            ort::inputs!["img" => TensorRef::from_array_view(&tensor.as_standard_layout())?],
        )?;
        outputs["mask"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .to_owned()
    };

    let (raw, _) = mask.into_raw_vec_and_offset();
    let small: ConfidenceMap =
        ImageBuffer::from_raw(image_size, image_size, raw).ok_or_else(|| TryOnError::Model {
            operation: "マスクバッファ構築".to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "マスク出力の要素数が入力形状と一致しません",
            )),
        })?;

    Ok(imageops::resize(&small, width, height, FilterType::Lanczos3))
}

/// ONNX-backed person segmentation provider.
pub struct OnnxPersonSegmenter {
    image_size: u32,
    session: Mutex<Session>,
}

impl OnnxPersonSegmenter {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let (session, image_size) = build_session(model_path, device_id)?;
        Ok(Self {
            image_size,
            session: Mutex::new(session),
        })
    }
}

impl PersonSegmenter for OnnxPersonSegmenter {
    fn segment(&self, img: &RgbImage) -> Result<ConfidenceMap> {
        let tensor = image_to_tensor(img, self.image_size);
        predict_mask(
            &self.session,
            tensor.view(),
            self.image_size,
            img.width(),
            img.height(),
        )
    }
}

/// ONNX-backed pose landmark provider.
///
/// The model emits `[1, 6, 3]` normalized (x, y, score) rows in the order
/// left/right shoulder, left/right hip, left/right elbow.
pub struct OnnxPoseEstimator {
    image_size: u32,
    session: Mutex<Session>,
}

impl OnnxPoseEstimator {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let (session, image_size) = build_session(model_path, device_id)?;
        Ok(Self {
            image_size,
            session: Mutex::new(session),
        })
    }
}

impl PoseEstimator for OnnxPoseEstimator {
    fn detect(&self, img: &RgbImage) -> Result<Option<PoseDetection>> {
        let tensor = image_to_tensor(img, self.image_size);
        let output = {
            let mut binding = self.session.lock();
            let outputs = binding.run(
                ort::inputs!["img" => TensorRef::from_array_view(&tensor.as_standard_layout())?],
            )?;
            outputs["landmarks"]
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix3>()?
                .to_owned()
        };

        if output.shape()[1] < KEYPOINT_COUNT {
            return Err(TryOnError::Model {
                operation: "ランドマーク出力形状検証".to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("キーポイント数が不足しています: {}", output.shape()[1]),
                )),
            });
        }

        // 平均スコアが閾値未満なら検出なしとして扱う（エラーではない）
        let mean_score = output
            .slice(s![0, ..KEYPOINT_COUNT, 2])
            .mean()
            .unwrap_or(0.0);
        if mean_score < MIN_DETECTION_CONFIDENCE {
            return Ok(None);
        }

        let kp = |i: usize| NormalizedKeypoint {
            x: output[[0, i, 0]],
            y: output[[0, i, 1]],
        };

        Ok(Some(PoseDetection {
            left_shoulder: kp(0),
            right_shoulder: kp(1),
            left_hip: kp(2),
            right_hip: kp(3),
            left_elbow: kp(4),
            right_elbow: kp(5),
        }))
    }
}

/// ONNX-backed background matting provider.
///
/// Predicts an alpha matte and attaches it to the input image, yielding the
/// RGBA cutout the garment isolator consumes.
pub struct OnnxBackgroundRemover {
    image_size: u32,
    session: Mutex<Session>,
}

impl OnnxBackgroundRemover {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let (session, image_size) = build_session(model_path, device_id)?;
        Ok(Self {
            image_size,
            session: Mutex::new(session),
        })
    }
}

impl BackgroundRemover for OnnxBackgroundRemover {
    fn remove_background(&self, img: &RgbImage) -> Result<RgbaImage> {
        let tensor = image_to_tensor(img, self.image_size);
        let matte = predict_mask(
            &self.session,
            tensor.view(),
            self.image_size,
            img.width(),
            img.height(),
        )?;

        // マットをアルファとして適用し前景を抽出
        Ok(RgbaImage::from_fn(img.width(), img.height(), |x, y| {
            let p = img.get_pixel(x, y);
            let alpha = (matte.get_pixel(x, y).0[0].clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgba([p.0[0], p.0[1], p.0[2], alpha])
        }))
    }
}

/// Filesystem locations of the three perception models.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub segmentation: PathBuf,
    pub pose: PathBuf,
    pub matting: PathBuf,
}

/// The fully loaded provider set backing one process.
pub struct ProviderSet {
    pub segmenter: OnnxPersonSegmenter,
    pub pose: OnnxPoseEstimator,
    pub remover: OnnxBackgroundRemover,
}

impl ProviderSet {
    pub fn load(paths: &ModelPaths, device_id: i32) -> Result<Self> {
        Ok(Self {
            segmenter: OnnxPersonSegmenter::new(&paths.segmentation, device_id)?,
            pose: OnnxPoseEstimator::new(&paths.pose, device_id)?,
            remover: OnnxBackgroundRemover::new(&paths.matting, device_id)?,
        })
    }
}

/// Process-wide lazily initialized provider set.
///
/// Model loading is expensive, so it happens at most once per process: the
/// OnceCell guards concurrent first use, and `is_ready` gives callers a
/// minimal "not ready" health signal while `warm_up` loads in the
/// background. Constructed and injected explicitly rather than living as a
/// module global, so tests can substitute providers freely.
pub struct LazyProviders {
    paths: ModelPaths,
    device_id: i32,
    cell: OnceCell<ProviderSet>,
}

impl LazyProviders {
    pub const fn new(paths: ModelPaths, device_id: i32) -> Self {
        Self {
            paths,
            device_id,
            cell: OnceCell::new(),
        }
    }

    /// Get the provider set, loading the models on first use. Concurrent
    /// first calls initialize exactly once.
    pub fn get(&self) -> Result<&ProviderSet> {
        self.cell
            .get_or_try_init(|| ProviderSet::load(&self.paths, self.device_id))
    }

    /// Whether the providers have finished loading.
    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Start loading the models on a background thread.
    pub fn warm_up(self: Arc<Self>) {
        std::thread::spawn(move || {
            if let Err(err) = self.get() {
                log::error!("provider warm-up failed: {err}");
            } else {
                log::info!("providers ready");
            }
        });
    }
}
