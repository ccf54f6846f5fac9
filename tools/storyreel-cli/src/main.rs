//! Storyreel CLI — Command-line interface for generating and exporting
//! narrated short videos.
//!
//! Usage:
//!   storyreel generate [OPTIONS]   Generate a storyboard and its assets
//!   storyreel format <FILE>        Turn an existing script into a storyboard
//!   storyreel export <PATH>        Export a storyboard to video
//!   storyreel bundle <PATH>        Bundle storyboard assets into a zip
//!   storyreel check                Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Narrated short videos from AI-generated script, images, and speech",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a storyboard (script + assets) for a topic
    Generate {
        /// Topic to build the video around
        topic: String,

        /// Target video length in minutes
        #[arg(short, long, default_value = "1.0")]
        duration: f64,

        /// Output directory for the storyboard and its assets
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Narration voice name
        #[arg(long, default_value = "Kore")]
        voice: String,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "16:9")]
        aspect: String,

        /// Image style: photorealistic, cinematic, illustration, watercolor
        #[arg(long, default_value = "photorealistic")]
        image_style: String,

        /// Generate the script only, skipping image and speech assets
        #[arg(long)]
        script_only: bool,

        /// API key (falls back to STORYREEL_API_KEY / GEMINI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Generate or retry assets for an existing storyboard
    Assets {
        /// Path to the storyboard JSON
        path: PathBuf,

        /// Narration voice name
        #[arg(long, default_value = "Kore")]
        voice: String,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "16:9")]
        aspect: String,

        /// Image style: photorealistic, cinematic, illustration, watercolor
        #[arg(long, default_value = "photorealistic")]
        image_style: String,

        /// API key (falls back to STORYREEL_API_KEY / GEMINI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Turn an existing script file into a storyboard
    Format {
        /// Path to a plain-text script
        file: PathBuf,

        /// Output directory for the storyboard
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// API key (falls back to STORYREEL_API_KEY / GEMINI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Export a storyboard to a video file
    Export {
        /// Path to the storyboard JSON
        path: PathBuf,

        /// Output file path (defaults to a timestamped name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Aspect ratio: 16:9 or 9:16
        #[arg(long, default_value = "16:9")]
        aspect: String,

        /// Subtitle style: modern, karaoke, classic, minimal
        #[arg(long, default_value = "modern")]
        style: String,

        /// Disable subtitles
        #[arg(long)]
        no_subtitles: bool,

        /// Background music file (looped)
        #[arg(long)]
        music: Option<PathBuf>,

        /// Background music volume [0.0, 1.0]
        #[arg(long, default_value = "0.25")]
        music_volume: f32,
    },

    /// Bundle storyboard assets and transcript into a zip archive
    Bundle {
        /// Path to the storyboard JSON
        path: PathBuf,

        /// Output archive path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    storyreel_common::logging::init_logging(&storyreel_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Generate {
            topic,
            duration,
            output,
            voice,
            aspect,
            image_style,
            script_only,
            api_key,
        } => {
            commands::generate::run(
                topic,
                duration,
                output,
                voice,
                aspect,
                image_style,
                script_only,
                api_key,
            )
            .await
        }
        Commands::Assets {
            path,
            voice,
            aspect,
            image_style,
            api_key,
        } => commands::assets::run(path, voice, aspect, image_style, api_key).await,
        Commands::Format {
            file,
            output,
            api_key,
        } => commands::format::run(file, output, api_key).await,
        Commands::Export {
            path,
            output,
            aspect,
            style,
            no_subtitles,
            music,
            music_volume,
        } => {
            commands::export::run(
                path,
                output,
                aspect,
                style,
                !no_subtitles,
                music,
                music_volume,
            )
            .await
        }
        Commands::Bundle { path, output } => commands::bundle::run(path, output),
        Commands::Check => commands::check::run(),
    }
}
