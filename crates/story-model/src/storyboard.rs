//! Storyboard: the ordered scene sequence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scene::{Scene, ScenePlan};
use crate::{ModelError, ModelResult};

/// Current storyboard schema version.
const STORYBOARD_VERSION: &str = "1";

/// An ordered sequence of scenes, the unit the export pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storyboard {
    /// Schema version.
    pub version: String,

    /// Topic or title the storyboard was generated from.
    pub topic: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Scenes in playback order.
    pub scenes: Vec<Scene>,
}

impl Storyboard {
    /// Create an empty storyboard.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            version: STORYBOARD_VERSION.to_string(),
            topic: topic.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            scenes: Vec::new(),
        }
    }

    /// Build a storyboard from script plans, in order.
    pub fn from_plans(topic: impl Into<String>, plans: Vec<ScenePlan>) -> Self {
        let mut storyboard = Self::new(topic);
        storyboard.scenes = plans
            .into_iter()
            .map(|plan| Scene::new(plan.narration, plan.visual_prompt))
            .collect();
        storyboard
    }

    /// Number of scenes a script should contain for a target duration:
    /// six scenes per minute, never fewer than three.
    pub fn scene_count_for_minutes(minutes: f64) -> usize {
        ((minutes * 6.0).ceil() as usize).max(3)
    }

    /// Load a storyboard from a JSON file.
    pub fn load(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let storyboard: Self = serde_json::from_str(&content)?;
        if storyboard.version != STORYBOARD_VERSION {
            return Err(ModelError::Invalid {
                message: format!(
                    "Unsupported storyboard version {} (expected {})",
                    storyboard.version, STORYBOARD_VERSION
                ),
            });
        }
        Ok(storyboard)
    }

    /// Save the storyboard as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> ModelResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Scenes whose latest generation attempt failed.
    pub fn failed_scenes(&self) -> impl Iterator<Item = (usize, &Scene)> {
        self.scenes
            .iter()
            .enumerate()
            .filter(|(_, scene)| scene.generation_error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_count_floor_is_three() {
        assert_eq!(Storyboard::scene_count_for_minutes(0.1), 3);
        assert_eq!(Storyboard::scene_count_for_minutes(0.5), 3);
    }

    #[test]
    fn test_scene_count_scales_with_minutes() {
        assert_eq!(Storyboard::scene_count_for_minutes(1.0), 6);
        assert_eq!(Storyboard::scene_count_for_minutes(2.5), 15);
        // Partial minutes round up.
        assert_eq!(Storyboard::scene_count_for_minutes(1.1), 7);
    }

    #[test]
    fn test_from_plans_preserves_order() {
        let plans = vec![
            ScenePlan {
                narration: "first".to_string(),
                visual_prompt: "a".to_string(),
            },
            ScenePlan {
                narration: "second".to_string(),
                visual_prompt: "b".to_string(),
            },
        ];
        let storyboard = Storyboard::from_plans("test", plans);
        assert_eq!(storyboard.scenes.len(), 2);
        assert_eq!(storyboard.scenes[0].narration, "first");
        assert_eq!(storyboard.scenes[1].narration, "second");
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyboard.json");

        let mut storyboard = Storyboard::new("volcanoes");
        storyboard.scenes.push(Scene::new("lava flows", "a volcano"));
        storyboard.save(&path).unwrap();

        let loaded = Storyboard::load(&path).unwrap();
        assert_eq!(loaded.topic, "volcanoes");
        assert_eq!(loaded.scenes.len(), 1);
        assert_eq!(loaded.scenes[0].narration, "lava flows");
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyboard.json");
        std::fs::write(
            &path,
            r#"{"version":"99","topic":"x","created_at":"now","scenes":[]}"#,
        )
        .unwrap();

        let err = Storyboard::load(&path).unwrap_err();
        assert!(err.to_string().contains("version"));
    }
}
