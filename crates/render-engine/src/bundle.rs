//! Asset bundle: zip archive of per-scene media plus the script
//! transcript. Independent of the export pipeline; plain file
//! aggregation.

use std::io::Write;
use std::path::Path;

use storyreel_common::{StoryError, StoryResult};
use storyreel_story_model::Storyboard;

/// Plain-text transcript of the storyboard script.
pub fn transcript(storyboard: &Storyboard) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", storyboard.topic));
    output.push_str(&format!("{}\n\n", "=".repeat(storyboard.topic.len().max(8))));

    for (i, scene) in storyboard.scenes.iter().enumerate() {
        output.push_str(&format!("Scene {}\n", i + 1));
        output.push_str(&format!("Narration: {}\n", scene.narration));
        output.push_str(&format!("Visual: {}\n\n", scene.visual_prompt));
    }

    output
}

/// Write a zip archive bundling per-scene images, narration clips, and
/// the script transcript.
///
/// A scene whose assets are missing on disk is skipped with a warning;
/// the bundle itself still succeeds.
pub fn write_bundle(storyboard: &Storyboard, path: &Path) -> StoryResult<()> {
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("script.txt", options)
        .map_err(|e| StoryError::bundle(format!("Failed to add transcript: {e}")))?;
    zip.write_all(transcript(storyboard).as_bytes())?;

    let mut bundled = 0usize;
    for (i, scene) in storyboard.scenes.iter().enumerate() {
        for (asset, subdir) in [(&scene.image, "images"), (&scene.audio, "audio")] {
            let Some(asset_path) = asset.as_deref() else {
                continue;
            };
            let bytes = match std::fs::read(asset_path) {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::warn!(
                        scene = i,
                        path = %asset_path.display(),
                        error = %error,
                        "Scene asset missing; leaving it out of the bundle"
                    );
                    continue;
                }
            };

            let ext = asset_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin");
            let name = format!("{subdir}/scene_{:02}.{ext}", i + 1);
            zip.start_file(name.as_str(), options)
                .map_err(|e| StoryError::bundle(format!("Failed to add {name}: {e}")))?;
            zip.write_all(&bytes)?;
            bundled += 1;
        }
    }

    zip.finish()
        .map_err(|e| StoryError::bundle(format!("Failed to finalize archive: {e}")))?;

    tracing::info!(
        output = %path.display(),
        scenes = storyboard.scenes.len(),
        assets = bundled,
        "Bundle written"
    );
    Ok(())
}
