pub mod assets;
pub mod bundle;
pub mod check;
pub mod export;
pub mod format;
pub mod generate;

use std::path::PathBuf;

use storyreel_common::AppConfig;
use storyreel_gen_ai::GeminiClient;

/// Resolve the API key from the CLI flag or environment and build the
/// generative client.
pub fn build_client(api_key: Option<String>, config: &AppConfig) -> anyhow::Result<GeminiClient> {
    let key = api_key
        .or_else(|| config.generation.api_key.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No API key found. Pass --api-key or set STORYREEL_API_KEY / GEMINI_API_KEY"
            )
        })?;
    Ok(GeminiClient::new(key)?)
}

/// Storyboard file location inside a project directory.
pub fn storyboard_path(dir: &std::path::Path) -> PathBuf {
    dir.join("storyboard.json")
}
