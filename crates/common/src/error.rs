//! Error types shared across Storyreel crates.

use std::path::PathBuf;

/// Top-level error type for Storyreel operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("Generation error: {message}")]
    Generation { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Audio mix error: {message}")]
    Mix { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Bundle error: {message}")]
    Bundle { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("An export is already in progress")]
    ExportBusy,

    #[error("Export cancelled")]
    Cancelled,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoryError.
pub type StoryResult<T> = Result<T, StoryError>;

impl StoryError {
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
        }
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn mix(msg: impl Into<String>) -> Self {
        Self::Mix {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn bundle(msg: impl Into<String>) -> Self {
        Self::Bundle {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this failure belongs to the rate-limit class that the
    /// retry policy is allowed to re-attempt.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(StoryError::rate_limited("429").is_rate_limited());
        assert!(!StoryError::generation("bad prompt").is_rate_limited());
        assert!(!StoryError::Cancelled.is_rate_limited());
    }

    #[test]
    fn test_error_messages() {
        let err = StoryError::encode("ffmpeg exited with status 1");
        assert_eq!(err.to_string(), "Encode error: ffmpeg exited with status 1");

        let err = StoryError::FileNotFound {
            path: PathBuf::from("/tmp/missing.wav"),
        };
        assert!(err.to_string().contains("/tmp/missing.wav"));
    }
}
