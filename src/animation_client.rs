// src/animation_client.rs
//! Image retrieval and image-to-video generation.

use crate::error::PipelineError;
use crate::toolkit::MediaToolkit;
use crate::types::VideoArtifact;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Resolves a shot's image reference to image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Animates one still image into a clip of the requested duration.
#[async_trait]
pub trait ImageAnimator: Send + Sync {
    async fn animate(
        &self,
        index: usize,
        image: Vec<u8>,
        target_duration: f64,
        output: &Path,
    ) -> Result<VideoArtifact, PipelineError>;
}

/// Fetches `http(s)://` image references. Any other reference, including
/// local paths and `file://` URLs, is refused.
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, PipelineError> {
        let url = reqwest::Url::parse(reference)
            .map_err(|e| PipelineError::fetch(reference, format!("not a URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::fetch(
                reference,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::fetch(reference, e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::fetch(
                reference,
                format!("HTTP {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::fetch(reference, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Image animator reached over HTTP (`POST {base_url}/animate`, multipart).
/// The response body is the encoded clip.
#[derive(Clone)]
pub struct HttpImageAnimator {
    client: Client,
    base_url: String,
    toolkit: Arc<dyn MediaToolkit>,
}

impl HttpImageAnimator {
    pub fn new(base_url: impl Into<String>, toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            toolkit,
        }
    }
}

#[async_trait]
impl ImageAnimator for HttpImageAnimator {
    async fn animate(
        &self,
        index: usize,
        image: Vec<u8>,
        target_duration: f64,
        output: &Path,
    ) -> Result<VideoArtifact, PipelineError> {
        let url = format!("{}/animate", self.base_url);
        let form = multipart::Form::new()
            .part(
                "image",
                multipart::Part::bytes(image).file_name(format!("shot_{}.png", index)),
            )
            .text("duration", target_duration.to_string());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::animation(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::animation(format!(
                "animator error ({}): {}",
                status, error_text
            )));
        }

        let clip = response
            .bytes()
            .await
            .map_err(|e| PipelineError::animation(format!("incomplete clip download: {}", e)))?;

        let mut file = tokio::fs::File::create(output).await?;
        file.write_all(&clip).await?;
        file.flush().await?;

        let info = self
            .toolkit
            .probe(output)
            .await
            .map_err(|e| PipelineError::animation(format!("animator returned an unreadable clip: {}", e)))?;

        tracing::debug!(
            index,
            bytes = clip.len(),
            duration_seconds = info.duration_seconds,
            "🎞️ Clip generated"
        );

        Ok(VideoArtifact {
            index,
            path: output.to_path_buf(),
            duration_seconds: info.duration_seconds,
            fps: info.fps,
            width: info.width,
            height: info.height,
        })
    }
}
