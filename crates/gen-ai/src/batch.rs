//! Bulk asset generation for a storyboard.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use storyreel_common::{GenerationConfig, StoryResult};
use storyreel_story_model::{AspectRatio, ImageStyle, Storyboard};

use crate::provider::GenerativeProvider;
use crate::queue::BoundedQueue;
use crate::retry::RetryPolicy;

/// Options for one bulk-generation pass.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Narration voice name.
    pub voice: String,

    /// Aspect ratio requested from the image model.
    pub aspect: AspectRatio,

    /// Visual treatment requested from the image model.
    pub image_style: ImageStyle,

    /// Directory scene assets are written into.
    pub assets_dir: PathBuf,

    /// Retry policy applied to every remote call.
    pub retry: RetryPolicy,

    /// Worker cap for the generation queue.
    pub workers: usize,

    /// Pacing delay between dispatched scene tasks.
    pub pacing: Duration,
}

impl BatchOptions {
    /// Options derived from the application generation config.
    pub fn from_config(config: &GenerationConfig, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            voice: config.voice.clone(),
            aspect: AspectRatio::Landscape16x9,
            image_style: ImageStyle::default(),
            assets_dir: assets_dir.into(),
            retry: RetryPolicy::from_config(config),
            workers: config.queue_workers,
            pacing: Duration::from_millis(config.queue_pacing_ms),
        }
    }
}

/// Summary of a bulk-generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub generated: usize,
    pub failed: usize,
    /// Scenes left untouched because their assets already exist.
    pub skipped: usize,
}

struct SceneAssets {
    image: PathBuf,
    audio: PathBuf,
}

/// Generate image and narration assets for every scene of the storyboard.
///
/// Scenes run through the bounded queue with the retry policy wrapped
/// around each remote call. A failure is recorded on its scene
/// (`generation_error`) and the remaining scenes keep going; the pass
/// itself only fails if the assets directory cannot be created.
pub async fn generate_all_assets(
    provider: Arc<dyn GenerativeProvider>,
    storyboard: &mut Storyboard,
    options: &BatchOptions,
) -> StoryResult<BatchSummary> {
    std::fs::create_dir_all(&options.assets_dir)?;

    // Scenes with assets in place are left alone, so a re-run only
    // retries what is missing or previously failed.
    let pending: Vec<usize> = storyboard
        .scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| !scene.assets_ready())
        .map(|(index, _)| index)
        .collect();

    let queue = BoundedQueue::new(options.workers, options.pacing);
    tracing::info!(
        scenes = storyboard.scenes.len(),
        pending = pending.len(),
        workers = queue.workers(),
        pacing_ms = options.pacing.as_millis() as u64,
        "Generating scene assets"
    );

    let tasks: Vec<_> = pending
        .iter()
        .map(|&index| {
            let scene = &storyboard.scenes[index];
            let provider = provider.clone();
            let retry = options.retry.clone();
            let narration = scene.narration.clone();
            let visual_prompt = scene.visual_prompt.clone();
            let voice = options.voice.clone();
            let aspect = options.aspect;
            let image_style = options.image_style;
            let image_path = scene_asset_path(&options.assets_dir, index, "png");
            let audio_path = scene_asset_path(&options.assets_dir, index, "wav");

            move || async move {
                let image_bytes = retry
                    .run("generate_image", || {
                        provider.generate_image(&visual_prompt, aspect, image_style)
                    })
                    .await?;
                std::fs::write(&image_path, image_bytes)?;

                let audio_bytes = retry
                    .run("generate_speech", || {
                        provider.generate_speech(&narration, &voice)
                    })
                    .await?;
                std::fs::write(&audio_path, audio_bytes)?;

                Ok(SceneAssets {
                    image: image_path,
                    audio: audio_path,
                })
            }
        })
        .collect();

    let results = queue.run_all(tasks).await;

    let mut summary = BatchSummary {
        skipped: storyboard.scenes.len() - pending.len(),
        ..BatchSummary::default()
    };
    for (&index, result) in pending.iter().zip(results) {
        let scene = &mut storyboard.scenes[index];
        match result {
            Ok(assets) => {
                scene.set_assets(assets.image, assets.audio);
                summary.generated += 1;
            }
            Err(error) => {
                tracing::warn!(scene = %scene.id, error = %error, "Scene asset generation failed");
                scene.set_generation_error(error.to_string());
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        generated = summary.generated,
        failed = summary.failed,
        "Asset generation pass finished"
    );
    Ok(summary)
}

fn scene_asset_path(dir: &Path, index: usize, ext: &str) -> PathBuf {
    dir.join(format!("scene_{:02}.{ext}", index + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storyreel_common::StoryError;
    use storyreel_story_model::ScenePlan;

    /// Provider whose image call fails for one designated prompt.
    struct FlakyProvider {
        fail_on: String,
        image_calls: AtomicU32,
    }

    #[async_trait]
    impl GenerativeProvider for FlakyProvider {
        async fn generate_script(&self, _: &str, _: f64) -> StoryResult<Vec<ScenePlan>> {
            unimplemented!("not used by batch tests")
        }

        async fn format_script(&self, _: &str) -> StoryResult<Vec<ScenePlan>> {
            unimplemented!("not used by batch tests")
        }

        async fn generate_image(
            &self,
            prompt: &str,
            _: AspectRatio,
            _: ImageStyle,
        ) -> StoryResult<Vec<u8>> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            if prompt == self.fail_on {
                Err(StoryError::generation("unsafe prompt"))
            } else {
                Ok(vec![0x89, 0x50, 0x4e, 0x47])
            }
        }

        async fn generate_speech(&self, _: &str, _: &str) -> StoryResult<Vec<u8>> {
            Ok(vec![0x52, 0x49, 0x46, 0x46])
        }
    }

    fn test_options(dir: &Path) -> BatchOptions {
        BatchOptions {
            voice: "Kore".to_string(),
            aspect: AspectRatio::Landscape16x9,
            image_style: ImageStyle::default(),
            assets_dir: dir.to_path_buf(),
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
            workers: 2,
            pacing: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_others_continue() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider {
            fail_on: "bad".to_string(),
            image_calls: AtomicU32::new(0),
        });

        let plans = vec![
            ScenePlan {
                narration: "one".into(),
                visual_prompt: "ok-1".into(),
            },
            ScenePlan {
                narration: "two".into(),
                visual_prompt: "bad".into(),
            },
            ScenePlan {
                narration: "three".into(),
                visual_prompt: "ok-2".into(),
            },
        ];
        let mut storyboard = Storyboard::from_plans("test", plans);

        let summary = generate_all_assets(provider, &mut storyboard, &test_options(dir.path()))
            .await
            .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                generated: 2,
                failed: 1,
                skipped: 0
            }
        );
        assert!(storyboard.scenes[0].assets_ready());
        assert!(!storyboard.scenes[1].assets_ready());
        assert!(storyboard.scenes[1].generation_error.is_some());
        assert!(storyboard.scenes[2].assets_ready());

        assert!(storyboard.scenes[0].image.as_ref().unwrap().exists());
        assert!(storyboard.scenes[2].audio.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn test_non_rate_limit_failures_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider {
            fail_on: "bad".to_string(),
            image_calls: AtomicU32::new(0),
        });

        let plans = vec![ScenePlan {
            narration: "n".into(),
            visual_prompt: "bad".into(),
        }];
        let mut storyboard = Storyboard::from_plans("test", plans);

        generate_all_assets(
            provider.clone(),
            &mut storyboard,
            &test_options(dir.path()),
        )
        .await
        .unwrap();

        // One attempt despite a two-attempt retry budget.
        assert_eq!(provider.image_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scenes_with_assets_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider {
            fail_on: "never".to_string(),
            image_calls: AtomicU32::new(0),
        });

        let plans = vec![
            ScenePlan {
                narration: "one".into(),
                visual_prompt: "a".into(),
            },
            ScenePlan {
                narration: "two".into(),
                visual_prompt: "b".into(),
            },
        ];
        let mut storyboard = Storyboard::from_plans("test", plans);
        storyboard.scenes[0].set_assets(
            dir.path().join("existing.png"),
            dir.path().join("existing.wav"),
        );

        let summary = generate_all_assets(
            provider.clone(),
            &mut storyboard,
            &test_options(dir.path()),
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                generated: 1,
                failed: 0,
                skipped: 1
            }
        );
        // Only the pending scene hit the image model.
        assert_eq!(provider.image_calls.load(Ordering::SeqCst), 1);
        // The pre-existing asset paths were not overwritten.
        assert_eq!(
            storyboard.scenes[0].image.as_ref().unwrap(),
            &dir.path().join("existing.png")
        );
    }

    #[test]
    fn test_asset_paths_are_one_based() {
        let path = scene_asset_path(Path::new("/tmp/assets"), 0, "png");
        assert_eq!(path, PathBuf::from("/tmp/assets/scene_01.png"));
    }
}
