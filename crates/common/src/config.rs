//! Runtime configuration.
//!
//! All configuration is runtime state: defaults plus environment
//! overrides, constructed once at startup and passed down by value.
//! Nothing here is persisted to disk.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative-API client settings.
    pub generation: GenerationConfig,

    /// Export pipeline defaults.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Settings for the generative-API collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key for the generative backend.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Default narration voice.
    pub voice: String,

    /// Maximum attempts per remote call (first try included).
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Backoff growth factor per attempt.
    pub backoff_multiplier: f64,

    /// Fraction of the delay added as random jitter.
    pub jitter: f64,

    /// Worker count for bulk asset generation.
    pub queue_workers: usize,

    /// Pacing delay between dispatched generation tasks, in milliseconds.
    pub queue_pacing_ms: u64,
}

/// Defaults for the export pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Subtitle font file. When absent, common system font locations
    /// are searched at render time.
    pub font_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            voice: "Kore".to_string(),
            max_attempts: 5,
            initial_delay_ms: 2000,
            backoff_multiplier: 2.0,
            jitter: 0.25,
            queue_workers: 3,
            queue_pacing_ms: 1000,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            font_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Build a config from defaults plus environment overrides.
    ///
    /// Recognized variables: `STORYREEL_API_KEY` (falls back to
    /// `GEMINI_API_KEY`) and `STORYREEL_FONT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.generation.api_key = std::env::var("STORYREEL_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        if let Ok(font) = std::env::var("STORYREEL_FONT") {
            if !font.trim().is_empty() {
                config.export.font_path = Some(PathBuf::from(font));
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.export.fps, 30);
        assert_eq!(config.export.video_bitrate_kbps, 8000);
        assert_eq!(config.generation.max_attempts, 5);
        assert!(config.generation.api_key.is_none());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = GenerationConfig::default();
        config.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
