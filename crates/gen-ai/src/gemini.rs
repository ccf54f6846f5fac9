//! Gemini API client.
//!
//! HTTP adapter for the Google Generative Language API: text generation
//! for scripts, Imagen for stills (with a Gemini image-output fallback),
//! and the Gemini TTS preview models for narration speech.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;
use storyreel_common::{StoryError, StoryResult};
use storyreel_story_model::{AspectRatio, ImageStyle, ScenePlan, Storyboard};

use crate::provider::GenerativeProvider;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL_PRIMARY: &str = "imagen-3.0-generate-002";
const IMAGE_MODEL_FALLBACK: &str = "gemini-2.0-flash-preview-image-generation";
const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Sample rate of the raw PCM returned by the TTS models.
const TTS_SAMPLE_RATE: u32 = 24_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for the Gemini generative API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

// -- request/response types ------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfigBody>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfigBody {
    #[serde(skip_serializing_if = "Option::is_none", rename = "responseModalities")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "speechConfig")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
struct SpeechConfig {
    #[serde(rename = "voiceConfig")]
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
struct VoiceConfig {
    #[serde(rename = "prebuiltVoiceConfig")]
    prebuilt: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
struct PrebuiltVoiceConfig {
    #[serde(rename = "voiceName")]
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Option<Vec<Prediction>>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64: Option<String>,
}

// -- client ----------------------------------------------------------------

impl GeminiClient {
    /// Create a client for the production endpoint.
    pub fn new(api_key: impl Into<String>) -> StoryResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against an alternate endpoint (regional proxies).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> StoryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoryError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            http,
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> StoryResult<GenerateContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| StoryError::generation(format!("{model} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_failure(model, status, &body));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| StoryError::generation(format!("{model} returned malformed JSON: {e}")))
    }

    async fn generate_text(&self, model: &str, prompt: String) -> StoryResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: None,
        };
        let response = self.generate_content(model, &request).await?;
        first_text(&response)
            .ok_or_else(|| StoryError::generation(format!("{model} returned no text candidate")))
    }

    async fn generate_image_primary(
        &self,
        prompt: &str,
        aspect: AspectRatio,
    ) -> StoryResult<Vec<u8>> {
        let url = format!(
            "{}/models/{}:predict?key={}",
            self.base_url, IMAGE_MODEL_PRIMARY, self.api_key
        );
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: aspect.api_label().to_string(),
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                StoryError::generation(format!("{IMAGE_MODEL_PRIMARY} request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_failure(IMAGE_MODEL_PRIMARY, status, &body));
        }

        let parsed = response.json::<PredictResponse>().await.map_err(|e| {
            StoryError::generation(format!("{IMAGE_MODEL_PRIMARY} returned malformed JSON: {e}"))
        })?;

        let encoded = parsed
            .predictions
            .unwrap_or_default()
            .into_iter()
            .find_map(|p| p.bytes_base64)
            .ok_or_else(|| {
                StoryError::generation(format!("{IMAGE_MODEL_PRIMARY} returned no image data"))
            })?;

        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| StoryError::generation(format!("Image payload was not valid base64: {e}")))
    }

    async fn generate_image_fallback(&self, prompt: &str) -> StoryResult<Vec<u8>> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfigBody {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                speech_config: None,
            }),
        };

        let response = self.generate_content(IMAGE_MODEL_FALLBACK, &request).await?;
        let encoded = first_inline_data(&response).ok_or_else(|| {
            StoryError::generation(format!("{IMAGE_MODEL_FALLBACK} returned no image data"))
        })?;

        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| StoryError::generation(format!("Image payload was not valid base64: {e}")))
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate_script(
        &self,
        topic: &str,
        duration_minutes: f64,
    ) -> StoryResult<Vec<ScenePlan>> {
        let scene_count = Storyboard::scene_count_for_minutes(duration_minutes);
        tracing::info!(topic, scene_count, "Generating script");

        let prompt = format!(
            "Write a narrated short-video script about the following topic, \
             split into exactly {scene_count} scenes.\n\
             For each scene provide:\n\
             - \"narration\": one or two spoken sentences\n\
             - \"visualPrompt\": a detailed English description of the scene's still image\n\
             Respond with a JSON array only, no surrounding prose.\n\n\
             Topic: {topic}"
        );

        let text = self.generate_text(TEXT_MODEL, prompt).await?;
        parse_scene_plans(&text)
    }

    async fn format_script(&self, raw_text: &str) -> StoryResult<Vec<ScenePlan>> {
        tracing::info!(chars = raw_text.len(), "Formatting script");

        let prompt = format!(
            "Split the following script into scenes for a narrated short video. \
             Keep the author's wording; do not invent new content.\n\
             For each scene provide:\n\
             - \"narration\": the scene's spoken text, taken from the script\n\
             - \"visualPrompt\": a detailed English description of a matching still image\n\
             Respond with a JSON array only, no surrounding prose.\n\n\
             Script:\n{raw_text}"
        );

        let text = self.generate_text(TEXT_MODEL, prompt).await?;
        parse_scene_plans(&text)
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect: AspectRatio,
        style: ImageStyle,
    ) -> StoryResult<Vec<u8>> {
        let styled = format!("{prompt}. Style: {}.", style.prompt_fragment());
        match self.generate_image_primary(&styled, aspect).await {
            Ok(bytes) => Ok(bytes),
            // Rate limits go back to the retry policy; only other failure
            // classes select the fallback model.
            Err(error) if error.is_rate_limited() => Err(error),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    fallback = IMAGE_MODEL_FALLBACK,
                    "Primary image model failed; trying fallback"
                );
                self.generate_image_fallback(&styled).await
            }
        }
    }

    async fn generate_speech(&self, narration: &str, voice: &str) -> StoryResult<Vec<u8>> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: narration.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfigBody {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                }),
            }),
        };

        let response = self.generate_content(TTS_MODEL, &request).await?;
        let encoded = first_inline_data(&response)
            .ok_or_else(|| StoryError::generation(format!("{TTS_MODEL} returned no audio data")))?;

        let pcm = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| StoryError::generation(format!("Audio payload was not valid base64: {e}")))?;

        pcm_to_wav(&pcm, TTS_SAMPLE_RATE)
    }
}

// -- helpers ---------------------------------------------------------------

fn first_text(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .as_ref()?
        .iter()
        .filter_map(|c| c.content.as_ref())
        .filter_map(|c| c.parts.as_ref())
        .flatten()
        .find_map(|p| p.text.clone())
}

fn first_inline_data(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .as_ref()?
        .iter()
        .filter_map(|c| c.content.as_ref())
        .filter_map(|c| c.parts.as_ref())
        .flatten()
        .find_map(|p| p.inline_data.as_ref().map(|d| d.data.clone()))
}

/// Map an API failure to the typed error taxonomy. HTTP 429 and quota
/// exhaustion are the rate-limit class the retry policy may re-attempt.
fn classify_api_failure(model: &str, status: StatusCode, body: &str) -> StoryError {
    let snippet: String = body.chars().take(300).collect();
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        StoryError::rate_limited(format!("{model}: {status}: {snippet}"))
    } else {
        StoryError::generation(format!("{model}: {status}: {snippet}"))
    }
}

/// Parse the model's reply into scene plans. Tolerates a fenced code
/// block or prose around the JSON array.
fn parse_scene_plans(text: &str) -> StoryResult<Vec<ScenePlan>> {
    let json = extract_json_array(text)
        .ok_or_else(|| StoryError::generation("Script reply contained no JSON array"))?;

    let plans: Vec<ScenePlan> = serde_json::from_str(json)
        .map_err(|e| StoryError::generation(format!("Script reply was not valid scene JSON: {e}")))?;

    if plans.is_empty() {
        return Err(StoryError::generation("Script reply contained no scenes"));
    }
    Ok(plans)
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Wrap raw 16-bit little-endian mono PCM in a WAV container.
fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> StoryResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| StoryError::generation(format!("Failed to start WAV writer: {e}")))?;
        for chunk in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            writer
                .write_sample(sample)
                .map_err(|e| StoryError::generation(format!("Failed to write WAV sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| StoryError::generation(format!("Failed to finalize WAV: {e}")))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_array_from_fenced_reply() {
        let reply = "Here you go:\n```json\n[{\"narration\":\"hi\",\"visualPrompt\":\"x\"}]\n```";
        let json = extract_json_array(reply).unwrap();
        assert!(json.starts_with('['));
        assert!(json.ends_with(']'));
    }

    #[test]
    fn test_parse_scene_plans() {
        let reply = r#"[
            {"narration": "The sun rises.", "visualPrompt": "sunrise over hills"},
            {"narration": "Birds wake.", "visual_prompt": "birds on a branch"}
        ]"#;
        let plans = parse_scene_plans(reply).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].visual_prompt, "sunrise over hills");
        assert_eq!(plans[1].visual_prompt, "birds on a branch");
    }

    #[test]
    fn test_parse_scene_plans_rejects_empty() {
        assert!(parse_scene_plans("[]").is_err());
        assert!(parse_scene_plans("no json here").is_err());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_api_failure("m", StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_rate_limited());

        let err = classify_api_failure(
            "m",
            StatusCode::FORBIDDEN,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(err.is_rate_limited());

        let err = classify_api_failure("m", StatusCode::BAD_REQUEST, "bad prompt");
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_pcm_to_wav_round_trip() {
        let pcm: Vec<u8> = [100i16, -200, 32000, -32000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        let wav = pcm_to_wav(&pcm, 24_000).unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(samples, vec![100, -200, 32000, -32000]);
    }
}
