//! Scene timing resolution and the export state machine driver.

use image::RgbImage;
use storyreel_common::{ExportClock, FrameSchedule, StoryError, StoryResult};
use storyreel_story_model::{ExportSettings, Scene};

use crate::export::{CancelFlag, ExportProgress, ExportStage, ProgressCallback};
use crate::frame::FrameRenderer;
use crate::mixer::probe_duration_ms;
use crate::sink::EncodeSink;

/// Display duration for a scene with no narration audio.
pub const DEFAULT_SCENE_MS: u64 = 3000;

/// Extra hold added to every scene so trailing narration is not cut off.
pub const SCENE_GRACE_MS: u64 = 500;

/// Output frame rate of the export pipeline.
pub const EXPORT_FPS: u32 = 30;

/// Resolved position of one scene on the export timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTiming {
    pub index: usize,

    /// Timeline offset of the scene start.
    pub start_ms: u64,

    /// Visual duration including the grace hold.
    pub duration_ms: u64,
}

impl SceneTiming {
    /// Timeline offset of the scene end.
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// Resolve the timeline for a scene sequence.
///
/// A scene's duration is its decoded narration length (or the fixed
/// default when the clip is absent or undecodable) plus the fixed grace.
/// Scenes are laid out strictly in sequence with no overlap and no gaps.
pub fn resolve_timings(scenes: &[Scene]) -> Vec<SceneTiming> {
    let mut start_ms = 0u64;
    scenes
        .iter()
        .enumerate()
        .map(|(index, scene)| {
            let narration_ms = scene.audio.as_deref().and_then(|path| {
                let duration = probe_duration_ms(path);
                if duration.is_none() {
                    tracing::warn!(
                        scene = index,
                        path = %path.display(),
                        "Narration clip could not be decoded; using default duration"
                    );
                }
                duration
            });

            let duration_ms = narration_ms.unwrap_or(DEFAULT_SCENE_MS) + SCENE_GRACE_MS;
            let timing = SceneTiming {
                index,
                start_ms,
                duration_ms,
            };
            start_ms += duration_ms;
            timing
        })
        .collect()
}

/// Total timeline duration in milliseconds.
pub fn total_duration_ms(timings: &[SceneTiming]) -> u64 {
    timings.last().map(SceneTiming::end_ms).unwrap_or(0)
}

/// State of one export invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Initializing,
    /// Rendering the scene with this index.
    RenderingScene(usize),
    Finalizing,
    Complete,
    Aborted,
}

/// Drives the frame renderer across the resolved timeline and feeds the
/// encode sink, scene by scene, frame by frame.
///
/// Frames are produced against the nominal timeline: the global frame
/// counter maps to timeline time, and a scene's elapsed fraction is
/// computed from that time, never from how many frames have actually
/// been rendered. Slow rendering therefore cannot shorten the output or
/// leak drift into later scenes.
pub struct TimelineDriver<'a> {
    renderer: &'a FrameRenderer,
    sink: &'a mut dyn EncodeSink,
    schedule: FrameSchedule,
    cancel: &'a CancelFlag,
    progress: Option<&'a ProgressCallback>,
    clock: &'a ExportClock,
    state: ExportState,
}

impl<'a> TimelineDriver<'a> {
    pub fn new(
        renderer: &'a FrameRenderer,
        sink: &'a mut dyn EncodeSink,
        schedule: FrameSchedule,
        cancel: &'a CancelFlag,
        progress: Option<&'a ProgressCallback>,
        clock: &'a ExportClock,
    ) -> Self {
        Self {
            renderer,
            sink,
            schedule,
            cancel,
            progress,
            clock,
            state: ExportState::Idle,
        }
    }

    /// Current driver state.
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Render every scene in order. Returns the number of frames
    /// submitted to the sink.
    pub async fn run(
        &mut self,
        scenes: &[Scene],
        timings: &[SceneTiming],
        settings: &ExportSettings,
    ) -> StoryResult<u64> {
        self.transition(ExportState::Initializing);

        let total_ms = total_duration_ms(timings);
        let total_frames = self.schedule.frame_count(total_ms);
        let mut frame_index = 0u64;

        for timing in timings {
            self.check_cancelled()?;
            self.transition(ExportState::RenderingScene(timing.index));

            let scene = &scenes[timing.index];
            let visual = load_scene_visual(scene);
            let end_ms = timing.end_ms() as f64;

            tracing::debug!(
                scene = timing.index,
                start_ms = timing.start_ms,
                duration_ms = timing.duration_ms,
                has_image = visual.is_some(),
                "Rendering scene"
            );

            while self.schedule.time_at_ms(frame_index) < end_ms {
                self.check_cancelled()?;

                let time_ms = self.schedule.time_at_ms(frame_index);
                let elapsed_fraction =
                    (time_ms - timing.start_ms as f64) / timing.duration_ms as f64;

                let frame = self.renderer.render(
                    visual.as_ref(),
                    &scene.narration,
                    elapsed_fraction,
                    settings,
                );
                if let Err(error) = self.sink.submit_frame(frame.as_raw()) {
                    self.transition(ExportState::Aborted);
                    return Err(error);
                }

                frame_index += 1;
                if frame_index % self.schedule.fps() as u64 == 0 {
                    self.report_progress(frame_index, total_frames);
                    // Suspension point: keep the task cooperative during
                    // long renders.
                    tokio::task::yield_now().await;
                }
            }
        }

        self.transition(ExportState::Finalizing);
        self.report_progress(frame_index, total_frames);
        Ok(frame_index)
    }

    /// Mark the export finished.
    pub fn complete(&mut self) {
        self.transition(ExportState::Complete);
    }

    fn check_cancelled(&mut self) -> StoryResult<()> {
        if self.cancel.is_cancelled() {
            self.transition(ExportState::Aborted);
            return Err(StoryError::Cancelled);
        }
        Ok(())
    }

    fn transition(&mut self, to: ExportState) {
        if self.state != to {
            tracing::debug!(from = ?self.state, to = ?to, "Export state transition");
            self.state = to;
        }
    }

    fn report_progress(&self, frames_rendered: u64, total_frames: u64) {
        let Some(callback) = self.progress else {
            return;
        };
        let progress = if total_frames == 0 {
            0.0
        } else {
            frames_rendered as f64 / total_frames as f64
        };
        callback(ExportProgress {
            progress,
            frames_rendered,
            total_frames,
            eta_secs: self.clock.eta_secs(progress),
            stage: ExportStage::Rendering,
        });
    }
}

/// Load a scene's still image, degrading to a black frame on failure.
fn load_scene_visual(scene: &Scene) -> Option<RgbImage> {
    let path = scene.image.as_deref()?;
    match image::open(path) {
        Ok(image) => Some(image.to_rgb8()),
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "Scene image could not be decoded; rendering black frame"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::EncodeSink;
    use std::path::{Path, PathBuf};

    fn scene_with_audio(path: Option<PathBuf>) -> Scene {
        let mut scene = Scene::new("narration", "prompt");
        scene.audio = path;
        scene
    }

    fn wav_with_duration(dir: &Path, name: &str, ms: u64) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..(ms * 48) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    /// Sink that counts frames instead of encoding them.
    #[derive(Default)]
    struct CountingSink {
        frames: u64,
    }

    impl EncodeSink for CountingSink {
        fn submit_frame(&mut self, _rgb: &[u8]) -> StoryResult<()> {
            self.frames += 1;
            Ok(())
        }

        fn finish(&mut self) -> StoryResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_timing_uses_default_without_audio() {
        let scenes = vec![scene_with_audio(None), scene_with_audio(None)];
        let timings = resolve_timings(&scenes);

        assert_eq!(timings[0].start_ms, 0);
        assert_eq!(timings[0].duration_ms, DEFAULT_SCENE_MS + SCENE_GRACE_MS);
        assert_eq!(timings[1].start_ms, 3500);
        assert_eq!(total_duration_ms(&timings), 7000);
    }

    #[test]
    fn test_timing_uses_decoded_audio_duration() {
        let dir = tempfile::tempdir().unwrap();
        let audio = wav_with_duration(dir.path(), "scene.wav", 2000);

        let scenes = vec![
            scene_with_audio(Some(audio.clone())),
            scene_with_audio(Some(audio.clone())),
            scene_with_audio(Some(audio)),
        ];
        let timings = resolve_timings(&scenes);

        for (i, timing) in timings.iter().enumerate() {
            assert_eq!(timing.duration_ms, 2500);
            assert_eq!(timing.start_ms, i as u64 * 2500);
        }
        assert_eq!(total_duration_ms(&timings), 7500);
    }

    #[test]
    fn test_timing_falls_back_on_undecodable_audio() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("noise.wav");
        std::fs::write(&bogus, b"not a wav file").unwrap();

        let timings = resolve_timings(&[scene_with_audio(Some(bogus))]);
        assert_eq!(timings[0].duration_ms, DEFAULT_SCENE_MS + SCENE_GRACE_MS);
    }

    #[test]
    fn test_scenes_are_contiguous() {
        let scenes: Vec<Scene> = (0..5).map(|_| scene_with_audio(None)).collect();
        let timings = resolve_timings(&scenes);

        for pair in timings.windows(2) {
            assert_eq!(pair[0].end_ms(), pair[1].start_ms);
        }
    }

    #[tokio::test]
    async fn test_driver_submits_exact_frame_count() {
        let scenes = vec![scene_with_audio(None)];
        let timings = resolve_timings(&scenes);
        let renderer = FrameRenderer::new(32, 18, None);
        let mut sink = CountingSink::default();
        let cancel = CancelFlag::default();
        let clock = ExportClock::start();
        let settings = ExportSettings {
            show_subtitles: false,
            ..Default::default()
        };

        let schedule = FrameSchedule::new(EXPORT_FPS);
        let mut driver =
            TimelineDriver::new(&renderer, &mut sink, schedule, &cancel, None, &clock);
        let frames = driver.run(&scenes, &timings, &settings).await.unwrap();

        // 3500ms at 30fps.
        let state = driver.state();
        assert_eq!(frames, 105);
        assert_eq!(sink.frames, 105);
        assert_eq!(state, ExportState::Finalizing);
    }

    #[tokio::test]
    async fn test_driver_cancellation_aborts() {
        let scenes: Vec<Scene> = (0..3).map(|_| scene_with_audio(None)).collect();
        let timings = resolve_timings(&scenes);
        let renderer = FrameRenderer::new(32, 18, None);
        let mut sink = CountingSink::default();
        let cancel = CancelFlag::default();
        cancel.request();
        let clock = ExportClock::start();
        let settings = ExportSettings::default();

        let schedule = FrameSchedule::new(EXPORT_FPS);
        let mut driver =
            TimelineDriver::new(&renderer, &mut sink, schedule, &cancel, None, &clock);
        let err = driver
            .run(&scenes, &timings, &settings)
            .await
            .unwrap_err();

        assert!(matches!(err, StoryError::Cancelled));
        assert_eq!(driver.state(), ExportState::Aborted);
        assert_eq!(sink.frames, 0);
    }

    /// Sink that keeps the last submitted frame.
    #[derive(Default)]
    struct LastFrameSink {
        frames: u64,
        last: Vec<u8>,
    }

    impl EncodeSink for LastFrameSink {
        fn submit_frame(&mut self, rgb: &[u8]) -> StoryResult<()> {
            self.frames += 1;
            self.last = rgb.to_vec();
            Ok(())
        }

        fn finish(&mut self) -> StoryResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_single_scene_without_assets_renders_full_default_duration() {
        // One scene, no image, no audio, subtitles on: 3000 + 500ms of
        // frames, black background, wrapped narration on top.
        let mut scene = scene_with_audio(None);
        scene.narration = "Hello world".to_string();
        let scenes = vec![scene];
        let timings = resolve_timings(&scenes);
        assert_eq!(total_duration_ms(&timings), 3500);

        let renderer = FrameRenderer::new(640, 360, None);
        let mut sink = LastFrameSink::default();
        let cancel = CancelFlag::default();
        let clock = ExportClock::start();
        let settings = ExportSettings {
            show_subtitles: true,
            ..Default::default()
        };

        let schedule = FrameSchedule::new(EXPORT_FPS);
        let mut driver =
            TimelineDriver::new(&renderer, &mut sink, schedule, &cancel, None, &clock);
        let frames = driver.run(&scenes, &timings, &settings).await.unwrap();

        assert_eq!(frames, 105);
        assert_eq!(sink.last.len(), 640 * 360 * 3);
        if renderer.has_font() {
            // Subtitle text shows up as non-black pixels.
            assert!(sink.last.iter().any(|&b| b > 0));
        } else {
            assert!(sink.last.iter().all(|&b| b == 0));
        }
    }

    #[tokio::test]
    async fn test_driver_handles_scene_boundaries() {
        let scenes = vec![scene_with_audio(None), scene_with_audio(None)];
        let timings = resolve_timings(&scenes);
        let renderer = FrameRenderer::new(16, 9, None);
        let mut sink = CountingSink::default();
        let cancel = CancelFlag::default();
        let clock = ExportClock::start();
        let settings = ExportSettings {
            show_subtitles: false,
            ..Default::default()
        };

        let schedule = FrameSchedule::new(EXPORT_FPS);
        let mut driver =
            TimelineDriver::new(&renderer, &mut sink, schedule, &cancel, None, &clock);
        let frames = driver.run(&scenes, &timings, &settings).await.unwrap();
        assert_eq!(frames, 210);
    }
}
