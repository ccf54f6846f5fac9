//! Generate a storyboard and its assets for a topic.

use std::path::PathBuf;
use std::sync::Arc;

use storyreel_common::AppConfig;
use storyreel_gen_ai::{generate_all_assets, BatchOptions, GenerativeProvider, RetryPolicy};
use storyreel_story_model::{AspectRatio, ImageStyle, Storyboard};

use super::{build_client, storyboard_path};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    topic: String,
    duration: f64,
    output: PathBuf,
    voice: String,
    aspect: String,
    image_style: String,
    script_only: bool,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let aspect: AspectRatio = aspect.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let image_style: ImageStyle = image_style.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let client = Arc::new(build_client(api_key, &config)?);

    std::fs::create_dir_all(&output)?;

    println!("Generating storyboard for: {topic}");
    let total_steps = if script_only { 2 } else { 3 };

    println!("Step 1/{total_steps}: Generating script...");
    let retry = RetryPolicy::from_config(&config.generation);
    let plans = retry
        .run("generate_script", || {
            client.generate_script(&topic, duration)
        })
        .await?;
    println!("  {} scenes planned", plans.len());

    let mut storyboard = Storyboard::from_plans(topic.as_str(), plans);

    if !script_only {
        println!("Step 2/{total_steps}: Generating scene assets...");
        let mut options = BatchOptions::from_config(&config.generation, output.join("assets"));
        options.voice = voice;
        options.aspect = aspect;
        options.image_style = image_style;

        let summary = generate_all_assets(client, &mut storyboard, &options).await?;
        println!(
            "  {} scenes generated, {} failed",
            summary.generated, summary.failed
        );
        for (index, scene) in storyboard.failed_scenes() {
            println!(
                "  [FAILED] scene {}: {}",
                index + 1,
                scene.generation_error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("Step {total_steps}/{total_steps}: Saving storyboard...");
    let path = storyboard_path(&output);
    storyboard.save(&path)?;
    println!("Storyboard written to: {}", path.display());

    if storyboard.failed_scenes().next().is_some() {
        println!("Some scenes failed; re-run generate to retry them.");
    }

    Ok(())
}
