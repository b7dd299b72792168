use std::{fs, sync::Arc};

use anyhow::{ensure, Context, Result};
use log::info;

use tryon_rs::{Config, LazyProviders, TryOnProcessor};

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::new();

    ensure!(
        config.person_image.exists(),
        "Person image does not exist: {}",
        config.person_image.display()
    );
    ensure!(
        config.garment_image.exists(),
        "Garment image does not exist: {}",
        config.garment_image.display()
    );
    ensure!(
        config.segmentation_model.exists(),
        "Segmentation model does not exist"
    );
    ensure!(config.pose_model.exists(), "Pose model does not exist");
    ensure!(config.matting_model.exists(), "Matting model does not exist");

    let person_bytes = fs::read(&config.person_image).with_context(|| {
        format!(
            "Failed to read person image: {}",
            config.person_image.display()
        )
    })?;
    let garment_bytes = fs::read(&config.garment_image).with_context(|| {
        format!(
            "Failed to read garment image: {}",
            config.garment_image.display()
        )
    })?;

    let providers = Arc::new(LazyProviders::new(config.model_paths(), config.device_id));
    Arc::clone(&providers).warm_up();

    // 単発 CLI ではそのまま初期化完了を待つ
    let set = providers.get()?;
    let processor = TryOnProcessor::from_provider_set(set);

    let output = processor.process(
        &person_bytes,
        &garment_bytes,
        &config.garment_type,
        &config.instructions,
    )?;

    output
        .image
        .save(&config.output)
        .with_context(|| format!("Failed to save result: {}", config.output.display()))?;

    info!("result written to {}", config.output.display());
    println!("{}", output.description);

    Ok(())
}
