//! Encode sink: muxes rendered frames and the mixed audio track into one
//! container file via an ffmpeg child process.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use storyreel_common::{StoryError, StoryResult};

/// Sink for rendered frames, finalized into a playable container.
///
/// Frames must be submitted at the declared rate; the sink timestamps
/// them by index and never retimes.
pub trait EncodeSink {
    /// Submit one RGB24 frame (`width * height * 3` bytes).
    fn submit_frame(&mut self, rgb: &[u8]) -> StoryResult<()>;

    /// Flush buffered encoder output and finalize the container.
    fn finish(&mut self) -> StoryResult<()>;
}

/// ffmpeg-backed sink: raw RGB24 frames piped to stdin, the mixed WAV as
/// a second input, muxed to MP4 (H.264 + AAC).
pub struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
    output_path: PathBuf,
    frame_bytes: usize,
}

impl FfmpegSink {
    /// Whether the encode backend is present on this system.
    pub fn is_available() -> bool {
        command_exists("ffmpeg")
    }

    /// Spawn the encoder for one export run.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        output_path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        audio_path: &Path,
        video_bitrate_kbps: u32,
        audio_bitrate_kbps: u32,
    ) -> StoryResult<Self> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-r".into(),
            fps.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-i".into(),
            audio_path.display().to_string(),
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "1:a".into(),
        ];
        args.extend(codec_args(video_bitrate_kbps, audio_bitrate_kbps));
        args.push(output_path.display().to_string());

        tracing::debug!(args = ?args, "Starting ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StoryError::encode(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoryError::encode("Failed to open ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StoryError::encode("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = std::io::BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            output = %output_path.display(),
            "ffmpeg encoder started"
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            output_path: output_path.to_path_buf(),
            frame_bytes: width as usize * height as usize * 3,
        })
    }

    fn drain_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }
}

impl EncodeSink for FfmpegSink {
    fn submit_frame(&mut self, rgb: &[u8]) -> StoryResult<()> {
        if rgb.len() != self.frame_bytes {
            return Err(StoryError::encode(format!(
                "Frame size mismatch: got {} bytes, expected {}",
                rgb.len(),
                self.frame_bytes
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StoryError::encode("Encoder already finished"))?;
        stdin
            .write_all(rgb)
            .map_err(|e| StoryError::encode(format!("ffmpeg pipe write failed: {e}")))
    }

    fn finish(&mut self) -> StoryResult<()> {
        // Closing stdin signals end of the video stream; ffmpeg then
        // flushes its buffers and finalizes the container.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Err(StoryError::encode("Encoder already finished"));
        };

        let status = child
            .wait()
            .map_err(|e| StoryError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = self.drain_stderr();

        if !status.success() {
            return Err(StoryError::encode(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }

        if !self.output_path.exists() {
            return Err(StoryError::encode(format!(
                "ffmpeg reported success but produced no output at {}",
                self.output_path.display()
            )));
        }

        tracing::info!(output = %self.output_path.display(), "Encoder finalized");
        Ok(())
    }
}

impl Drop for FfmpegSink {
    /// Abandoned sink (error or cancellation path): kill the encoder and
    /// discard the partial output.
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            let _ = std::fs::remove_file(&self.output_path);
            tracing::debug!(
                output = %self.output_path.display(),
                "Encoder killed; partial output discarded"
            );
        }
        if let Some(task) = self.stderr_task.take() {
            let _ = task.join();
        }
    }
}

/// Fixed high-quality MP4 target: H.264 high profile + AAC, faststart.
fn codec_args(video_bitrate_kbps: u32, audio_bitrate_kbps: u32) -> Vec<String> {
    vec![
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-profile:v".into(),
        "high".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-b:v".into(),
        format!("{}k", video_bitrate_kbps.max(1000)),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        format!("{}k", audio_bitrate_kbps.max(64)),
        "-movflags".into(),
        "+faststart".into(),
    ]
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_args_enforce_bitrate_floors() {
        let args = codec_args(500, 32);
        assert!(args.contains(&"1000k".to_string()));
        assert!(args.contains(&"64k".to_string()));
    }

    #[test]
    fn test_codec_args_fixed_target() {
        let args = codec_args(8000, 192);
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(args.contains(&"8000k".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }
}
