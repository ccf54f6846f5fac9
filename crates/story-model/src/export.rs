//! Export settings and output geometry.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output frame aspect, fixing the pixel dimensions of the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AspectRatio {
    /// 1920x1080 landscape.
    Landscape16x9,
    /// 1080x1920 portrait.
    Portrait9x16,
}

impl AspectRatio {
    /// Output dimensions in pixels (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape16x9 => (1920, 1080),
            AspectRatio::Portrait9x16 => (1080, 1920),
        }
    }

    /// Ratio label used by generative-image APIs.
    pub fn api_label(&self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" | "landscape" => Ok(AspectRatio::Landscape16x9),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait9x16),
            other => Err(format!("Unknown aspect ratio: {other}. Use: 16:9, 9:16")),
        }
    }
}

/// Visual treatment requested from the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Photorealistic,
    Cinematic,
    Illustration,
    Watercolor,
}

impl ImageStyle {
    /// Fragment appended to the image prompt.
    pub fn prompt_fragment(&self) -> &'static str {
        match self {
            ImageStyle::Photorealistic => "photorealistic, high detail",
            ImageStyle::Cinematic => "cinematic lighting, film still",
            ImageStyle::Illustration => "digital illustration, clean lines",
            ImageStyle::Watercolor => "soft watercolor painting",
        }
    }
}

impl FromStr for ImageStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" | "photorealistic" => Ok(ImageStyle::Photorealistic),
            "cinematic" => Ok(ImageStyle::Cinematic),
            "illustration" => Ok(ImageStyle::Illustration),
            "watercolor" => Ok(ImageStyle::Watercolor),
            other => Err(format!(
                "Unknown image style: {other}. Use: photorealistic, cinematic, illustration, watercolor"
            )),
        }
    }
}

/// Subtitle rendering preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleStyle {
    /// White bold text on a semi-transparent rounded box.
    Modern,
    /// Highlighted yellow text on a semi-transparent rounded box.
    Karaoke,
    /// Gold text with drop shadow, no box.
    Classic,
    /// Plain white text, no box.
    Minimal,
}

impl FromStr for SubtitleStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modern" => Ok(SubtitleStyle::Modern),
            "karaoke" => Ok(SubtitleStyle::Karaoke),
            "classic" => Ok(SubtitleStyle::Classic),
            "minimal" => Ok(SubtitleStyle::Minimal),
            other => Err(format!(
                "Unknown subtitle style: {other}. Use: modern, karaoke, classic, minimal"
            )),
        }
    }
}

/// Value object describing one export run. Captured at export start and
/// read-only for the lifetime of the invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,

    /// Background music gain in [0, 1].
    pub music_volume: f32,

    /// Subtitle rendering preset.
    pub subtitle_style: SubtitleStyle,

    /// Whether to draw subtitles at all.
    pub show_subtitles: bool,

    /// Loopable background music clip.
    #[serde(default)]
    pub background_music: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Landscape16x9,
            music_volume: 0.25,
            subtitle_style: SubtitleStyle::Modern,
            show_subtitles: true,
            background_music: None,
        }
    }
}

impl ExportSettings {
    /// Clamp out-of-range values into their valid domain.
    pub fn normalized(mut self) -> Self {
        self.music_volume = self.music_volume.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_dimensions() {
        assert_eq!(AspectRatio::Landscape16x9.dimensions(), (1920, 1080));
        assert_eq!(AspectRatio::Portrait9x16.dimensions(), (1080, 1920));
    }

    #[test]
    fn test_aspect_parsing() {
        assert_eq!(
            "16:9".parse::<AspectRatio>().unwrap(),
            AspectRatio::Landscape16x9
        );
        assert_eq!(
            "portrait".parse::<AspectRatio>().unwrap(),
            AspectRatio::Portrait9x16
        );
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_image_style_parsing() {
        assert_eq!(
            "cinematic".parse::<ImageStyle>().unwrap(),
            ImageStyle::Cinematic
        );
        assert_eq!("photo".parse::<ImageStyle>().unwrap(), ImageStyle::default());
        assert!("oil".parse::<ImageStyle>().is_err());
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!(
            "classic".parse::<SubtitleStyle>().unwrap(),
            SubtitleStyle::Classic
        );
        assert!("bold".parse::<SubtitleStyle>().is_err());
    }

    #[test]
    fn test_music_volume_clamped() {
        let settings = ExportSettings {
            music_volume: 1.7,
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.music_volume, 1.0);

        let settings = ExportSettings {
            music_volume: -0.2,
            ..Default::default()
        }
        .normalized();
        assert_eq!(settings.music_volume, 0.0);
    }
}
