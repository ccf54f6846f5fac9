//! Storyreel Story Model
//!
//! Defines the core data contracts for Storyreel:
//! - **Scene:** one narrated segment (text, visual prompt, asset handles)
//! - **Storyboard:** the ordered scene sequence and its JSON round-trip
//! - **Export settings:** output geometry, music gain, subtitle presets
//!
//! Asset handles are plain file paths; a scene whose assets have not been
//! generated yet simply carries `None` and the export pipeline substitutes
//! fallbacks (black frame, fixed duration, silence).

pub mod export;
pub mod scene;
pub mod storyboard;

pub use export::*;
pub use scene::*;
pub use storyboard::*;

/// Errors raised by model load/save operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid storyboard: {message}")]
    Invalid { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ModelError.
pub type ModelResult<T> = Result<T, ModelError>;
