//! Export job orchestration.
//!
//! `export_video` is a pure function of (storyboard snapshot, export
//! settings) to (output file | failure): it owns all ephemeral render
//! state for the invocation and releases it on completion, failure, or
//! cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use storyreel_common::{ExportClock, ExportDefaults, FrameSchedule, StoryError, StoryResult};
use storyreel_story_model::{ExportSettings, Storyboard};

use crate::frame::FrameRenderer;
use crate::mixer::{self, NarrationCue};
use crate::sink::{EncodeSink, FfmpegSink};
use crate::timeline::{resolve_timings, total_duration_ms, TimelineDriver};

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Scene sequence snapshot consumed by the export.
    pub storyboard: Storyboard,

    /// Export settings captured at export start.
    pub settings: ExportSettings,

    /// Output file path.
    pub output_path: PathBuf,

    /// Pipeline defaults (fps, bitrates, font).
    pub defaults: ExportDefaults,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Cooperative cancellation handle, checked at every suspension point of
/// the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the export holding this flag.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One export at a time owns the encode surface.
static EXPORT_IN_FLIGHT: AtomicBool = AtomicBool::new(false);

struct BusyGuard;

impl BusyGuard {
    fn acquire() -> StoryResult<Self> {
        if EXPORT_IN_FLIGHT.swap(true, Ordering::SeqCst) {
            return Err(StoryError::ExportBusy);
        }
        Ok(Self)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        EXPORT_IN_FLIGHT.store(false, Ordering::SeqCst);
    }
}

/// Default timestamped output file name.
pub fn default_output_name() -> String {
    format!("story_{}.mp4", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Export the storyboard to a video file.
///
/// This is the main entry point for rendering. Rejects a second export
/// while one is already in flight. On failure or cancellation the
/// partial output is discarded and all resources are released.
pub async fn export_video(
    job: ExportJob,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> StoryResult<PathBuf> {
    let _guard = BusyGuard::acquire()?;

    let result = run_export(&job, progress.as_ref(), &cancel).await;

    if let Err(error) = &result {
        if let Some(callback) = &progress {
            callback(ExportProgress {
                progress: 0.0,
                frames_rendered: 0,
                total_frames: 0,
                eta_secs: 0.0,
                stage: ExportStage::Failed,
            });
        }
        tracing::warn!(error = %error, "Export failed; partial output discarded");
        let _ = std::fs::remove_file(&job.output_path);
    }

    result
}

async fn run_export(
    job: &ExportJob,
    progress: Option<&ProgressCallback>,
    cancel: &CancelFlag,
) -> StoryResult<PathBuf> {
    let clock = ExportClock::start();
    let settings = job.settings.clone().normalized();

    tracing::info!(
        output = %job.output_path.display(),
        scenes = job.storyboard.scenes.len(),
        aspect = ?settings.aspect_ratio,
        "Starting export"
    );

    if job.storyboard.scenes.is_empty() {
        return Err(StoryError::unsupported("Cannot export an empty storyboard"));
    }
    if !FfmpegSink::is_available() {
        return Err(StoryError::encode(
            "No encode backend found (expected ffmpeg in PATH)",
        ));
    }
    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if let Some(callback) = progress {
        callback(ExportProgress {
            progress: 0.0,
            frames_rendered: 0,
            total_frames: 0,
            eta_secs: 0.0,
            stage: ExportStage::Preparing,
        });
    }

    let (width, height) = settings.aspect_ratio.dimensions();
    let timings = resolve_timings(&job.storyboard.scenes);
    let total_ms = total_duration_ms(&timings);
    let schedule = FrameSchedule::new(job.defaults.fps);

    tracing::info!(
        duration_ms = total_ms,
        frames = schedule.frame_count(total_ms),
        "Timeline resolved"
    );

    // Audio mix-down: looping bed plus narration cues at scene offsets.
    let background = settings.background_music.as_deref().and_then(|path| {
        match mixer::decode_audio(path) {
            Ok(clip) => Some(clip),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Background music could not be loaded; continuing without it"
                );
                None
            }
        }
    });

    let mut cues = Vec::new();
    for timing in &timings {
        let scene = &job.storyboard.scenes[timing.index];
        let Some(audio_path) = scene.audio.as_deref() else {
            continue;
        };
        match mixer::decode_audio(audio_path) {
            Ok(clip) => cues.push(NarrationCue {
                start_ms: timing.start_ms,
                clip,
            }),
            Err(error) => {
                tracing::warn!(
                    scene = timing.index,
                    error = %error,
                    "Narration clip could not be loaded; scene will be silent"
                );
            }
        }
    }

    let mix = mixer::mix_timeline(total_ms, background.as_ref(), settings.music_volume, &cues);
    let mix_path = std::env::temp_dir().join(format!("storyreel-mix-{}.wav", std::process::id()));
    mixer::write_wav(&mix, &mix_path)?;

    let renderer = FrameRenderer::new(width, height, job.defaults.font_path.as_deref());
    let mut sink = FfmpegSink::create(
        &job.output_path,
        width,
        height,
        schedule.fps(),
        &mix_path,
        job.defaults.video_bitrate_kbps,
        job.defaults.audio_bitrate_kbps,
    )?;

    let drive_result = {
        let mut driver =
            TimelineDriver::new(&renderer, &mut sink, schedule, cancel, progress, &clock);
        let result = driver.run(&job.storyboard.scenes, &timings, &settings).await;
        if result.is_ok() {
            driver.complete();
        }
        result
    };

    // On the error path, dropping the sink kills the encoder and removes
    // its partial output.
    let finished = drive_result.and_then(|frames| {
        sink.finish()?;
        Ok(frames)
    });
    drop(sink);
    let _ = std::fs::remove_file(&mix_path);

    let frames = finished?;
    if let Some(callback) = progress {
        callback(ExportProgress {
            progress: 1.0,
            frames_rendered: frames,
            total_frames: frames,
            eta_secs: 0.0,
            stage: ExportStage::Complete,
        });
    }
    tracing::info!(
        frames,
        elapsed_secs = clock.elapsed_secs(),
        output = %job.output_path.display(),
        "Export finished"
    );
    Ok(job.output_path.clone())
}
