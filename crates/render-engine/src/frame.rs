//! Frame rendering: background fill, Ken Burns image placement, and
//! subtitle overlay.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use storyreel_story_model::{ExportSettings, SubtitleStyle};

/// Zoom gain reached at the end of a scene.
const ZOOM_RANGE: f64 = 0.15;

/// Subtitle block geometry.
const SUBTITLE_MAX_WIDTH_FRAC: f64 = 0.8;
const SUBTITLE_LINE_HEIGHT: i32 = 60;
const SUBTITLE_BASELINE_OFFSET: i32 = 100;
const SUBTITLE_FONT_PX: f32 = 44.0;
const SUBTITLE_BOX_PADDING: i32 = 14;
const SUBTITLE_BOX_RADIUS: i32 = 12;
const SUBTITLE_BOX_ALPHA: f32 = 0.55;
const SHADOW_OFFSET: i32 = 2;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const GOLD: Rgb<u8> = Rgb([255, 215, 0]);
const KARAOKE_YELLOW: Rgb<u8> = Rgb([250, 230, 80]);
const SHADOW: Rgb<u8> = Rgb([20, 20, 20]);

/// Bold sans fonts commonly present on desktop systems, searched when no
/// explicit font is configured.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/noto/NotoSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Renders one output frame from a scene's visual, its narration text,
/// and the elapsed fraction of the scene.
///
/// Rendering never fails: a missing image yields a black frame with
/// subtitles, and a missing font yields frames without subtitles.
pub struct FrameRenderer {
    width: u32,
    height: u32,
    font: Option<FontVec>,
}

impl FrameRenderer {
    /// Create a renderer for the given output dimensions.
    ///
    /// The subtitle font is loaded from `font_path` when given, otherwise
    /// from the first readable system font candidate.
    pub fn new(width: u32, height: u32, font_path: Option<&Path>) -> Self {
        let font = load_font(font_path);
        if font.is_none() {
            tracing::warn!("No subtitle font found; subtitles will be skipped");
        }
        Self {
            width,
            height,
            font,
        }
    }

    /// Output dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether a subtitle font was found.
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render one frame.
    ///
    /// `elapsed_fraction` is progress through the scene's duration in
    /// `[0, 1)` and drives the zoom curve.
    pub fn render(
        &self,
        visual: Option<&RgbImage>,
        narration: &str,
        elapsed_fraction: f64,
        settings: &ExportSettings,
    ) -> RgbImage {
        let mut frame = RgbImage::from_pixel(self.width, self.height, Rgb([0, 0, 0]));

        if let Some(image) = visual {
            self.draw_cover_image(&mut frame, image, zoom_scale(elapsed_fraction));
        }

        if settings.show_subtitles && !narration.trim().is_empty() {
            if let Some(font) = &self.font {
                draw_subtitles(&mut frame, font, narration, settings.subtitle_style);
            }
        }

        frame
    }

    /// Draw `image` scaled to cover the frame with the zoom applied about
    /// the frame center.
    fn draw_cover_image(&self, frame: &mut RgbImage, image: &RgbImage, zoom: f64) {
        let (sx, sy, sw, sh) =
            cover_source_rect(image.width(), image.height(), self.width, self.height, zoom);
        let visible = imageops::crop_imm(image, sx, sy, sw, sh).to_image();
        let scaled = imageops::resize(&visible, self.width, self.height, FilterType::Triangle);
        imageops::replace(frame, &scaled, 0, 0);
    }
}

/// Ken Burns zoom curve: linear from 1.0 toward 1.0 + `ZOOM_RANGE` across
/// the scene.
pub fn zoom_scale(elapsed_fraction: f64) -> f64 {
    1.0 + ZOOM_RANGE * elapsed_fraction.clamp(0.0, 1.0)
}

/// Source rectangle of an `img_w x img_h` image visible in a
/// `frame_w x frame_h` output when the image is scaled to cover the frame
/// (aspect-fill, center crop) and `zoom` is applied about the center.
///
/// Returns `(x, y, w, h)` in source pixel coordinates.
pub fn cover_source_rect(
    img_w: u32,
    img_h: u32,
    frame_w: u32,
    frame_h: u32,
    zoom: f64,
) -> (u32, u32, u32, u32) {
    let cover = (frame_w as f64 / img_w as f64).max(frame_h as f64 / img_h as f64);
    let scale = cover * zoom;

    let src_w = (frame_w as f64 / scale).min(img_w as f64).max(1.0);
    let src_h = (frame_h as f64 / scale).min(img_h as f64).max(1.0);
    let x = (img_w as f64 - src_w) / 2.0;
    let y = (img_h as f64 - src_h) / 2.0;

    (x as u32, y as u32, src_w as u32, src_h as u32)
}

/// Greedy word-wrap: a word is appended to the current line unless doing
/// so would exceed `max_width` and the line already holds at least one
/// word. A single word wider than the budget still gets its own line.
pub fn wrap_lines<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measure(&candidate) > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn draw_subtitles(frame: &mut RgbImage, font: &FontVec, narration: &str, style: SubtitleStyle) {
    let (frame_w, frame_h) = frame.dimensions();
    let scale = PxScale::from(SUBTITLE_FONT_PX);
    let max_width = frame_w as f64 * SUBTITLE_MAX_WIDTH_FRAC;

    let lines = wrap_lines(narration, max_width, |s| {
        text_size(scale, font, s).0 as f64
    });

    let (color, boxed) = match style {
        SubtitleStyle::Modern => (WHITE, true),
        SubtitleStyle::Karaoke => (KARAOKE_YELLOW, true),
        SubtitleStyle::Classic => (GOLD, false),
        SubtitleStyle::Minimal => (WHITE, false),
    };

    // Bottom line first: line j (counted from the bottom) sits on a
    // baseline SUBTITLE_LINE_HEIGHT * j above the anchor baseline.
    for (j, line) in lines.iter().rev().enumerate() {
        let (line_w, _) = text_size(scale, font, line);
        let x = (frame_w as i32 - line_w as i32) / 2;
        let baseline =
            frame_h as i32 - SUBTITLE_BASELINE_OFFSET - SUBTITLE_LINE_HEIGHT * j as i32;
        let top = baseline - SUBTITLE_FONT_PX as i32;

        if boxed {
            blend_rounded_rect(
                frame,
                x - SUBTITLE_BOX_PADDING,
                top - SUBTITLE_BOX_PADDING / 2,
                line_w as i32 + 2 * SUBTITLE_BOX_PADDING,
                SUBTITLE_FONT_PX as i32 + SUBTITLE_BOX_PADDING,
                SUBTITLE_BOX_RADIUS,
                Rgb([0, 0, 0]),
                SUBTITLE_BOX_ALPHA,
            );
        }

        draw_text_mut(
            frame,
            SHADOW,
            x + SHADOW_OFFSET,
            top + SHADOW_OFFSET,
            scale,
            font,
            line,
        );
        draw_text_mut(frame, color, x, top, scale, font, line);
    }
}

/// Blend a rounded rectangle over the frame at the given opacity.
#[allow(clippy::too_many_arguments)]
fn blend_rounded_rect(
    frame: &mut RgbImage,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    radius: i32,
    color: Rgb<u8>,
    alpha: f32,
) {
    if w <= 0 || h <= 0 {
        return;
    }
    let radius = radius.min(w / 2).min(h / 2).max(0);
    let (frame_w, frame_h) = frame.dimensions();

    for py in y.max(0)..(y + h).min(frame_h as i32) {
        for px in x.max(0)..(x + w).min(frame_w as i32) {
            if !inside_rounded_rect(px, py, x, y, w, h, radius) {
                continue;
            }
            let pixel = frame.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                pixel.0[c] =
                    (pixel.0[c] as f32 * (1.0 - alpha) + color.0[c] as f32 * alpha) as u8;
            }
        }
    }
}

fn inside_rounded_rect(px: i32, py: i32, x: i32, y: i32, w: i32, h: i32, radius: i32) -> bool {
    let left = x + radius;
    let right = x + w - 1 - radius;
    let top = y + radius;
    let bottom = y + h - 1 - radius;

    let cx = px.clamp(left, right);
    let cy = py.clamp(top, bottom);
    let dx = px - cx;
    let dy = py - cy;
    dx * dx + dy * dy <= radius * radius
}

fn load_font(explicit: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<PathBuf> = explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONT_PATHS.iter().copied().map(PathBuf::from))
        .collect();

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                tracing::debug!(font = %path.display(), "Loaded subtitle font");
                return Some(font);
            }
            Err(_) => {
                tracing::warn!(font = %path.display(), "Font file could not be parsed; skipping");
            }
        }
    }
    None
}
