use clap::Parser;
use image::ImageFormat;
use std::path::PathBuf;

use crate::model::ModelPaths;

#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Photograph of the person
    pub person_image: PathBuf,

    /// Photograph of the garment
    pub garment_image: PathBuf,

    #[arg(short, long, default_value = "shirt")]
    pub garment_type: String,

    #[arg(short, long, default_value = "")]
    pub instructions: String,

    #[arg(short, long, default_value = "tryon.png", value_parser = check_output_path)]
    pub output: PathBuf,

    #[arg(long)]
    pub segmentation_model: PathBuf,

    #[arg(long)]
    pub pose_model: PathBuf,

    #[arg(long)]
    pub matting_model: PathBuf,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    /// モデルファイルの位置をまとめて提供する
    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            segmentation: self.segmentation_model.clone(),
            pose: self.pose_model.clone(),
            matting: self.matting_model.clone(),
        }
    }
}

fn check_output_path(s: &str) -> Result<PathBuf, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_path(s)
        .map_err(|_| format!("{} has no recognized image extension. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not writable. {}", s, supported_message));
    }

    Ok(PathBuf::from(s))
}
