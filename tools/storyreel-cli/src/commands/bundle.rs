//! Bundle storyboard assets into a zip archive.

use std::path::PathBuf;

use storyreel_render_engine::bundle::write_bundle;
use storyreel_story_model::Storyboard;

pub fn run(path: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let storyboard = Storyboard::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))?;

    let output_path = output.unwrap_or_else(|| {
        path.parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("assets.zip")
    });

    println!("Bundling assets for: {}", path.display());
    write_bundle(&storyboard, &output_path)?;
    println!("Bundle written to: {}", output_path.display());

    Ok(())
}
