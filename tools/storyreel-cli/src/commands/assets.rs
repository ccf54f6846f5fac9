//! Generate or regenerate assets for an existing storyboard.

use std::path::PathBuf;
use std::sync::Arc;

use storyreel_common::AppConfig;
use storyreel_gen_ai::{generate_all_assets, BatchOptions};
use storyreel_story_model::{AspectRatio, ImageStyle, Storyboard};

use super::build_client;

pub async fn run(
    path: PathBuf,
    voice: String,
    aspect: String,
    image_style: String,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let aspect: AspectRatio = aspect.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let image_style: ImageStyle = image_style.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let client = Arc::new(build_client(api_key, &config)?);

    let mut storyboard = Storyboard::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))?;
    if storyboard.scenes.is_empty() {
        anyhow::bail!("Storyboard has no scenes");
    }

    let assets_dir = path
        .parent()
        .map(|dir| dir.join("assets"))
        .unwrap_or_else(|| PathBuf::from("assets"));

    println!(
        "Generating assets for {} scenes into {}",
        storyboard.scenes.len(),
        assets_dir.display()
    );

    let mut options = BatchOptions::from_config(&config.generation, assets_dir);
    options.voice = voice;
    options.aspect = aspect;
    options.image_style = image_style;

    let summary = generate_all_assets(client, &mut storyboard, &options).await?;
    println!(
        "  {} scenes generated, {} failed, {} already had assets",
        summary.generated, summary.failed, summary.skipped
    );
    for (index, scene) in storyboard.failed_scenes() {
        println!(
            "  [FAILED] scene {}: {}",
            index + 1,
            scene.generation_error.as_deref().unwrap_or("unknown error")
        );
    }

    storyboard.save(&path)?;
    println!("Storyboard updated: {}", path.display());

    Ok(())
}
