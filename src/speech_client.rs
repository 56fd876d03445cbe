// Speech synthesis client
// Turns narration text into one continuous WAV per shot.

use crate::error::PipelineError;
use crate::types::AudioArtifact;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One block of mono samples as emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// A speech engine that may emit its waveform in several chunks.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize_chunks(
        &self,
        text: &str,
        speaker: &str,
    ) -> Result<Vec<SpeechChunk>, PipelineError>;
}

/// Narration text in, one audio artifact out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        index: usize,
        narration: &str,
        output: &Path,
    ) -> Result<AudioArtifact, PipelineError>;
}

/// Joins chunks in emission order along the time axis.
pub fn merge_chunks(chunks: Vec<SpeechChunk>) -> Result<SpeechChunk, PipelineError> {
    let mut iter = chunks.into_iter();
    let mut merged = iter
        .next()
        .ok_or_else(|| PipelineError::speech("engine returned no audio chunks"))?;

    for chunk in iter {
        if chunk.sample_rate != merged.sample_rate {
            return Err(PipelineError::speech(format!(
                "chunk sample rate {} differs from {}",
                chunk.sample_rate, merged.sample_rate
            )));
        }
        merged.samples.extend(chunk.samples);
    }

    if merged.sample_rate == 0 {
        return Err(PipelineError::speech("engine reported a zero sample rate"));
    }
    if merged.samples.is_empty() {
        return Err(PipelineError::speech("engine returned an empty waveform"));
    }
    Ok(merged)
}

/// Write a mono 32-bit float WAV file.
pub fn write_wav(path: &Path, waveform: &SpeechChunk) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in &waveform.samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()
}

/// [`SpeechSynthesizer`] that speaks every line with one fixed reference speaker.
pub struct ChunkedSpeechSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    speaker: String,
}

impl ChunkedSpeechSynthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, speaker: impl Into<String>) -> Self {
        Self {
            engine,
            speaker: speaker.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ChunkedSpeechSynthesizer {
    async fn synthesize(
        &self,
        index: usize,
        narration: &str,
        output: &Path,
    ) -> Result<AudioArtifact, PipelineError> {
        let chunks = self.engine.synthesize_chunks(narration, &self.speaker).await?;
        let chunk_count = chunks.len();
        let waveform = merge_chunks(chunks)?;

        let sample_rate = waveform.sample_rate;
        let duration_seconds = waveform.samples.len() as f64 / sample_rate as f64;
        let path = output.to_path_buf();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_wav(&target, &waveform))
            .await
            .map_err(|e| PipelineError::speech(format!("wav writer task failed: {}", e)))?
            .map_err(|e| PipelineError::speech(format!("failed to write {}: {}", output.display(), e)))?;

        tracing::debug!(
            index,
            chunks = chunk_count,
            duration_seconds,
            "🎙️ Narration synthesized"
        );

        Ok(AudioArtifact {
            index,
            path,
            sample_rate,
            duration_seconds,
        })
    }
}

// ============================================================================
// HTTP ENGINE
// ============================================================================

#[derive(Serialize, Debug)]
struct TtsRequest<'a> {
    text: &'a str,
    speaker: &'a str,
}

#[derive(Deserialize, Debug)]
struct TtsResponse {
    sample_rate: u32,
    /// base64 of little-endian f32 PCM
    chunks: Vec<String>,
}

/// Speech engine reached over HTTP (`POST {base_url}/tts`).
#[derive(Clone)]
pub struct HttpSpeechEngine {
    client: Client,
    base_url: String,
}

impl HttpSpeechEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn decode_pcm_f32(encoded: &str) -> Result<Vec<f32>, PipelineError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| PipelineError::speech(format!("chunk is not valid base64: {}", e)))?;
    if bytes.len() % 4 != 0 {
        return Err(PipelineError::speech(format!(
            "chunk length {} is not a whole number of f32 samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn synthesize_chunks(
        &self,
        text: &str,
        speaker: &str,
    ) -> Result<Vec<SpeechChunk>, PipelineError> {
        let url = format!("{}/tts", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&TtsRequest { text, speaker })
            .send()
            .await
            .map_err(|e| PipelineError::speech(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::speech(format!(
                "speech engine error ({}): {}",
                status, error_text
            )));
        }

        let body: TtsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::speech(format!("unreadable engine response: {}", e)))?;

        body.chunks
            .iter()
            .map(|encoded| {
                Ok(SpeechChunk {
                    samples: decode_pcm_f32(encoded)?,
                    sample_rate: body.sample_rate,
                })
            })
            .collect()
    }
}
