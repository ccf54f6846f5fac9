//! Export a storyboard to video.

use std::path::PathBuf;

use storyreel_common::AppConfig;
use storyreel_render_engine::export::{
    default_output_name, export_video, CancelFlag, ExportJob, ExportProgress, ProgressCallback,
};
use storyreel_story_model::{AspectRatio, ExportSettings, Storyboard, SubtitleStyle};

pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    aspect: String,
    style: String,
    show_subtitles: bool,
    music: Option<PathBuf>,
    music_volume: f32,
) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let aspect: AspectRatio = aspect.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let style: SubtitleStyle = style.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let storyboard = Storyboard::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))?;
    let output_path = output.unwrap_or_else(|| PathBuf::from(default_output_name()));

    let pending: Vec<usize> = storyboard
        .scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| !scene.assets_ready())
        .map(|(i, _)| i + 1)
        .collect();
    if !pending.is_empty() {
        println!(
            "Note: scenes {pending:?} have missing assets and will fall back to black frames / default timing."
        );
    }

    let settings = ExportSettings {
        aspect_ratio: aspect,
        music_volume,
        subtitle_style: style,
        show_subtitles,
        background_music: music,
    };

    println!("Exporting storyboard: {}", path.display());
    println!("  Output: {}", output_path.display());
    println!("  Scenes: {}", storyboard.scenes.len());

    let job = ExportJob {
        storyboard,
        settings,
        output_path: output_path.clone(),
        defaults: config.export,
    };

    // Ctrl-C aborts the export at the next suspension point.
    let cancel = CancelFlag::new();
    let cancel_handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nCancelling export...");
            cancel_handle.request();
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
    });

    match export_video(job, Some(progress_cb), cancel).await {
        Ok(_) => {
            println!("\nExport complete: {}", output_path.display());
        }
        Err(e) => {
            println!("\nExport failed: {e}");
        }
    }

    Ok(())
}
