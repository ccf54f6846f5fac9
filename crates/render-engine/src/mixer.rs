//! Offline audio mix-down for the export timeline.
//!
//! Two logical inputs are summed into one PCM track covering the whole
//! timeline: a background bed that loops seamlessly at the configured
//! gain, and narration clips placed at their scene start offsets. The
//! result is written as a 16-bit WAV for the encode sink.

use std::io::Read;
use std::path::Path;
use std::process::Command;

use storyreel_common::{StoryError, StoryResult};

/// Sample rate of the mix output.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// A decoded audio clip normalized to the mix format: interleaved stereo
/// f32 at [`MIX_SAMPLE_RATE`].
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    pub samples: Vec<f32>,
}

impl AudioClip {
    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Clip duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / MIX_SAMPLE_RATE as u64
    }
}

/// One narration clip scheduled on the timeline.
#[derive(Debug, Clone)]
pub struct NarrationCue {
    /// Timeline offset of the owning scene's start.
    pub start_ms: u64,
    pub clip: AudioClip,
}

/// Decode an audio file into the mix format. WAV is decoded natively;
/// anything else goes through an ffmpeg transcode.
pub fn decode_audio(path: &Path) -> StoryResult<AudioClip> {
    if !path.exists() {
        return Err(StoryError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if is_wav {
        let reader = hound::WavReader::open(path)
            .map_err(|e| StoryError::mix(format!("Failed to open {}: {e}", path.display())))?;
        decode_wav(reader)
    } else {
        decode_via_ffmpeg(path)
    }
}

/// Duration of an audio file in milliseconds, if it can be probed.
pub fn probe_duration_ms(path: &Path) -> Option<u64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if is_wav {
        let reader = hound::WavReader::open(path).ok()?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return None;
        }
        return Some(reader.duration() as u64 * 1000 / spec.sample_rate as u64);
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}

fn decode_wav<R: Read>(reader: hound::WavReader<R>) -> StoryResult<AudioClip> {
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(StoryError::mix("WAV file has no channels or zero rate"));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| StoryError::mix(format!("WAV decode failed: {e}")))?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()
                .map_err(|e| StoryError::mix(format!("WAV decode failed: {e}")))?
        }
    };

    let stereo = to_stereo(&interleaved, spec.channels);
    Ok(AudioClip {
        samples: resample_stereo(&stereo, spec.sample_rate, MIX_SAMPLE_RATE),
    })
}

/// Transcode a non-WAV clip to the mix format through ffmpeg, via a
/// temporary WAV file.
fn decode_via_ffmpeg(path: &Path) -> StoryResult<AudioClip> {
    let temp = std::env::temp_dir().join(format!(
        "storyreel-decode-{}.wav",
        std::process::id()
    ));

    let output = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-i"])
        .arg(path)
        .args(["-ac", "2", "-ar", &MIX_SAMPLE_RATE.to_string(), "-acodec", "pcm_s16le"])
        .arg(&temp)
        .output()
        .map_err(|e| StoryError::mix(format!("Failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let _ = std::fs::remove_file(&temp);
        return Err(StoryError::mix(format!(
            "ffmpeg could not decode {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let reader = hound::WavReader::open(&temp)
        .map_err(|e| StoryError::mix(format!("Failed to read transcoded WAV: {e}")));
    let clip = reader.and_then(decode_wav);
    let _ = std::fs::remove_file(&temp);
    clip
}

/// Fold an interleaved stream of `channels` down to (or up to) stereo.
fn to_stereo(interleaved: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        1 => interleaved.iter().flat_map(|&s| [s, s]).collect(),
        2 => interleaved.to_vec(),
        n => {
            // Keep the first two channels of multichannel sources.
            let n = n as usize;
            interleaved
                .chunks_exact(n)
                .flat_map(|frame| [frame[0], frame[1]])
                .collect()
        }
    }
}

/// Linear-interpolation resampler over interleaved stereo samples.
fn resample_stereo(stereo: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || stereo.is_empty() {
        return stereo.to_vec();
    }

    let in_frames = stereo.len() / 2;
    let out_frames = (in_frames as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;

    let mut out = Vec::with_capacity(out_frames * 2);
    for i in 0..out_frames {
        let pos = i as f64 * step;
        let base = pos as usize;
        let frac = (pos - base as f64) as f32;
        let next = (base + 1).min(in_frames - 1);

        for ch in 0..2 {
            let a = stereo[2 * base + ch];
            let b = stereo[2 * next + ch];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

/// Mix the background bed and narration cues into one stereo track
/// covering `total_ms` of timeline.
///
/// The bed loops seamlessly for the full duration at `music_volume` gain.
/// Each cue is summed in at full gain from its start offset and may run
/// past its scene's nominal duration; samples past the timeline end are
/// dropped, since capture stops there.
pub fn mix_timeline(
    total_ms: u64,
    background: Option<&AudioClip>,
    music_volume: f32,
    cues: &[NarrationCue],
) -> AudioClip {
    let total_frames = (total_ms * MIX_SAMPLE_RATE as u64 / 1000) as usize;
    let mut samples = vec![0.0f32; total_frames * 2];

    if let Some(bed) = background {
        let gain = music_volume.clamp(0.0, 1.0);
        if bed.frames() > 0 && gain > 0.0 {
            for frame in 0..total_frames {
                let src = frame % bed.frames();
                samples[2 * frame] += bed.samples[2 * src] * gain;
                samples[2 * frame + 1] += bed.samples[2 * src + 1] * gain;
            }
        }
    }

    for cue in cues {
        let offset = (cue.start_ms * MIX_SAMPLE_RATE as u64 / 1000) as usize;
        for i in 0..cue.clip.frames() {
            let dst = offset + i;
            if dst >= total_frames {
                break;
            }
            samples[2 * dst] += cue.clip.samples[2 * i];
            samples[2 * dst + 1] += cue.clip.samples[2 * i + 1];
        }
    }

    for sample in &mut samples {
        *sample = sample.clamp(-1.0, 1.0);
    }

    AudioClip { samples }
}

/// Write a clip as 16-bit PCM WAV.
pub fn write_wav(clip: &AudioClip, path: &Path) -> StoryResult<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: MIX_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| StoryError::mix(format!("Failed to create {}: {e}", path.display())))?;

    for &sample in &clip.samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| StoryError::mix(format!("WAV write failed: {e}")))?;
    }

    writer
        .finalize()
        .map_err(|e| StoryError::mix(format!("WAV finalize failed: {e}")))?;
    Ok(())
}
