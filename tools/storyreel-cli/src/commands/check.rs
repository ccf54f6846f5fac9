//! Check system capabilities.

use storyreel_common::AppConfig;
use storyreel_render_engine::frame::FrameRenderer;
use storyreel_render_engine::sink::FfmpegSink;

pub fn run() -> anyhow::Result<()> {
    println!("Storyreel System Check");
    println!("{}", "=".repeat(50));

    let config = AppConfig::from_env();

    if FfmpegSink::is_available() {
        println!("[OK] Encode backend: ffmpeg found in PATH");
    } else {
        println!("[FAIL] Encode backend: ffmpeg not found (exports will fail)");
    }

    let renderer = FrameRenderer::new(16, 9, config.export.font_path.as_deref());
    if renderer.has_font() {
        println!("[OK] Subtitle font: found");
    } else {
        println!("[WARN] Subtitle font: none found (subtitles will be skipped; set STORYREEL_FONT)");
    }

    if config.generation.api_key.is_some() {
        println!("[OK] API key: configured");
    } else {
        println!("[WARN] API key: not set (generation commands need STORYREEL_API_KEY)");
    }

    println!();
    if FfmpegSink::is_available() {
        println!("Storyreel is ready to export.");
    } else {
        println!("Install ffmpeg to enable exporting.");
    }

    Ok(())
}
