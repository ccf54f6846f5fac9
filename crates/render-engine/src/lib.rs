//! Storyreel Render Engine
//!
//! Offline export pipeline that turns a storyboard (scenes with generated
//! images and narration clips) into one muxed video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! storyboard ──► timeline resolution (narration length + grace per scene)
//!                      │
//!        ┌─────────────┴──────────────┐
//!        ▼                            ▼
//!  frame renderer               audio mixer
//!  (black fill, Ken Burns       (looping music bed
//!   zoom, subtitles)             + narration cues)
//!        │                            │
//!        ▼                            ▼
//!  raw RGB frames ──► encode sink ◄── mixed WAV
//!                    (ffmpeg mux)
//!                         │
//!                         ▼
//!                     output.mp4
//! ```

pub mod bundle;
pub mod export;
pub mod frame;
pub mod mixer;
pub mod sink;
pub mod timeline;

pub use export::*;
pub use frame::FrameRenderer;
pub use timeline::{ExportState, SceneTiming, DEFAULT_SCENE_MS, EXPORT_FPS, SCENE_GRACE_MS};
