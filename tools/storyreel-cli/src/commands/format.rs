//! Turn an existing script file into a storyboard.

use std::path::PathBuf;

use storyreel_common::AppConfig;
use storyreel_gen_ai::{GenerativeProvider, RetryPolicy};
use storyreel_story_model::Storyboard;

use super::{build_client, storyboard_path};

pub async fn run(file: PathBuf, output: PathBuf, api_key: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let client = build_client(api_key, &config)?;

    let raw_text = std::fs::read_to_string(&file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", file.display()))?;
    if raw_text.trim().is_empty() {
        anyhow::bail!("Script file {} is empty", file.display());
    }

    println!("Formatting script: {}", file.display());
    let retry = RetryPolicy::from_config(&config.generation);
    let plans = retry
        .run("format_script", || client.format_script(&raw_text))
        .await?;
    println!("  {} scenes planned", plans.len());

    let topic = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("script")
        .to_string();
    let storyboard = Storyboard::from_plans(topic, plans);

    std::fs::create_dir_all(&output)?;
    let path = storyboard_path(&output);
    storyboard.save(&path)?;
    println!("Storyboard written to: {}", path.display());
    println!("Run `storyreel assets {}` to generate scene media.", path.display());

    Ok(())
}
