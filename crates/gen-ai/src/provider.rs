//! Generative provider seam.

use async_trait::async_trait;
use storyreel_common::StoryResult;
use storyreel_story_model::{AspectRatio, ImageStyle, ScenePlan};

/// A generative backend able to produce scripts, images, and speech.
///
/// Consumed behind `Arc<dyn GenerativeProvider>` so the batch layer and
/// the CLI stay independent of the concrete API.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Generate a scene-by-scene script for a topic. The scene count is
    /// derived from the target duration (six per minute, at least three).
    async fn generate_script(
        &self,
        topic: &str,
        duration_minutes: f64,
    ) -> StoryResult<Vec<ScenePlan>>;

    /// Reformat caller-supplied prose into scenes without inventing
    /// new content.
    async fn format_script(&self, raw_text: &str) -> StoryResult<Vec<ScenePlan>>;

    /// Generate a still image for a prompt, in the requested style.
    /// Returns encoded PNG bytes.
    async fn generate_image(
        &self,
        prompt: &str,
        aspect: AspectRatio,
        style: ImageStyle,
    ) -> StoryResult<Vec<u8>>;

    /// Synthesize narration speech. Returns a playable WAV container.
    async fn generate_speech(&self, narration: &str, voice: &str) -> StoryResult<Vec<u8>>;
}
