//! Scene data model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One narrated segment of the output video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Unique scene identifier.
    pub id: String,

    /// Text spoken and subtitled for this scene.
    pub narration: String,

    /// Prompt describing the desired visual. Consumed by asset
    /// generation, never by the export core.
    pub visual_prompt: String,

    /// Generated still image, once generation has completed.
    #[serde(default)]
    pub image: Option<PathBuf>,

    /// Generated narration clip, once generation has completed.
    #[serde(default)]
    pub audio: Option<PathBuf>,

    /// Whether an asset-generation request is currently running.
    /// Editing-time state; the export pipeline ignores it.
    #[serde(default)]
    pub in_flight: bool,

    /// Error from the most recent failed generation attempt, if any.
    #[serde(default)]
    pub generation_error: Option<String>,
}

impl Scene {
    /// Create a scene from its script plan.
    pub fn new(narration: impl Into<String>, visual_prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            narration: narration.into(),
            visual_prompt: visual_prompt.into(),
            image: None,
            audio: None,
            in_flight: false,
            generation_error: None,
        }
    }

    /// Whether both assets have been generated.
    pub fn assets_ready(&self) -> bool {
        self.image.is_some() && self.audio.is_some()
    }

    /// Record the outcome of a successful generation pass.
    pub fn set_assets(&mut self, image: PathBuf, audio: PathBuf) {
        self.image = Some(image);
        self.audio = Some(audio);
        self.in_flight = false;
        self.generation_error = None;
    }

    /// Record a per-scene generation failure. Other scenes are unaffected.
    pub fn set_generation_error(&mut self, error: impl Into<String>) {
        self.in_flight = false;
        self.generation_error = Some(error.into());
    }
}

/// A scene as planned by the script generator, before any assets exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenePlan {
    /// Text spoken and subtitled for this scene.
    pub narration: String,

    /// Prompt describing the desired visual.
    #[serde(alias = "visualPrompt")]
    pub visual_prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scene_has_unique_id() {
        let a = Scene::new("one", "a hill");
        let b = Scene::new("two", "a valley");
        assert_ne!(a.id, b.id);
        assert!(!a.assets_ready());
    }

    #[test]
    fn test_set_assets_clears_error() {
        let mut scene = Scene::new("text", "prompt");
        scene.set_generation_error("rate limited");
        assert_eq!(scene.generation_error.as_deref(), Some("rate limited"));

        scene.set_assets(PathBuf::from("a.png"), PathBuf::from("a.wav"));
        assert!(scene.assets_ready());
        assert!(scene.generation_error.is_none());
    }

    #[test]
    fn test_scene_plan_accepts_camel_case() {
        let plan: ScenePlan =
            serde_json::from_str(r#"{"narration":"hi","visualPrompt":"a lake"}"#).unwrap();
        assert_eq!(plan.visual_prompt, "a lake");
    }
}
