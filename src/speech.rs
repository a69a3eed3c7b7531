//! Speech synthesis and playback state.
//!
//! The synthesizer contract returns raw PCM: 24 kHz, 16-bit signed
//! little-endian, mono. [`pcm_to_samples`] normalizes that to `f32` in
//! [-1.0, 1.0] for playback; [`write_wav`] wraps it in a RIFF header for the
//! CLI. [`Playback`] tracks which message is audible — at most one at any
//! time, enforced structurally by holding a single optional slot.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

use crate::config::TtsConfig;

/// Sample rate of synthesized PCM.
pub const SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesis not configured")]
    NotConfigured,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote returned HTTP {0}")]
    Status(u16),
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// Turns text into raw PCM bytes (24 kHz, 16-bit LE, mono).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

pub struct GeminiTts {
    client: reqwest::Client,
    config: TtsConfig,
    api_key: String,
    endpoint: String,
}

impl GeminiTts {
    /// Build the synthesizer from config, or `None` when the provider is
    /// disabled or the key environment variable is unset. The endpoint is
    /// shared with the chat model.
    pub fn from_config(config: &TtsConfig, endpoint: &str) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    env = %config.api_key_env,
                    "tts provider enabled but API key env var is unset"
                );
                return None;
            }
        };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            client,
            config: config.clone(),
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn build_request(config: &TtsConfig, text: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": config.voice }
                    }
                }
            }
        })
    }

    fn parse_response(body: &Value) -> Result<Vec<u8>, SpeechError> {
        let data = body
            .pointer("/candidates/0/content/parts/0/inlineData/data")
            .and_then(Value::as_str)
            .ok_or_else(|| SpeechError::Malformed("no audio data in response".to_string()))?;
        BASE64
            .decode(data)
            .map_err(|e| SpeechError::Malformed(format!("invalid base64 audio: {}", e)))
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.config.model, self.api_key
        );
        let request = Self::build_request(&self.config, text);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SpeechError::Malformed(e.to_string()))?;
        GeminiTts::parse_response(&body)
    }
}

/// Normalize raw 16-bit LE PCM to `f32` samples in [-1.0, 1.0].
/// A trailing odd byte is dropped.
pub fn pcm_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Write samples as a 16-bit mono WAV file at [`SAMPLE_RATE`].
pub fn write_wav(path: &std::path::Path, samples: &[f32]) -> anyhow::Result<()> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = SAMPLE_RATE * 2;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        let clamped = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        out.extend_from_slice(&clamped.to_le_bytes());
    }

    std::fs::write(path, out)
        .map_err(|e| anyhow::anyhow!("Failed to write WAV file {}: {}", path.display(), e))
}

/// Lifecycle of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Synthesis requested, audio not yet audible.
    Preparing,
    /// Audio is audible.
    Playing,
}

/// Outcome of a toggle request for the caller to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Start synthesis and playback for this message.
    Start,
    /// The message was active; playback was stopped.
    Stopped,
}

/// At-most-one-active playback tracker. The single optional slot makes the
/// invariant structural: activating a message replaces whatever was active.
#[derive(Default)]
pub struct Playback {
    current: Option<(String, PlaybackPhase)>,
}

impl Playback {
    /// Toggle playback of a message: stop it if it is the active one,
    /// otherwise make it the active one in the preparing phase (implicitly
    /// stopping any other message).
    pub fn toggle(&mut self, message_id: &str) -> ToggleOutcome {
        match &self.current {
            Some((active, _)) if active == message_id => {
                self.current = None;
                ToggleOutcome::Stopped
            }
            _ => {
                self.current = Some((message_id.to_string(), PlaybackPhase::Preparing));
                ToggleOutcome::Start
            }
        }
    }

    /// Mark the active message as audible. Ignored when the message is no
    /// longer active (the user toggled away during synthesis).
    pub fn mark_playing(&mut self, message_id: &str) {
        if let Some((active, phase)) = &mut self.current {
            if active == message_id {
                *phase = PlaybackPhase::Playing;
            }
        }
    }

    /// Stop whatever is active.
    pub fn stop_all(&mut self) {
        self.current = None;
    }

    pub fn phase_of(&self, message_id: &str) -> Option<PlaybackPhase> {
        self.current
            .as_ref()
            .filter(|(active, _)| active == message_id)
            .map(|(_, phase)| *phase)
    }

    pub fn active(&self) -> Option<(&str, PlaybackPhase)> {
        self.current
            .as_ref()
            .map(|(id, phase)| (id.as_str(), *phase))
    }
}
