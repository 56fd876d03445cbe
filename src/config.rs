// src/config.rs
//! Service configuration from the environment (`.env` is loaded by main).

use crate::error::ConfigError;
use crate::pipeline::OrchestratorSettings;
use crate::types::CaptionStyle;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub storage_root: PathBuf,
    pub public_base_url: String,
    pub speech_engine_url: String,
    pub speaker_profile: String,
    pub animator_url: String,
    pub shot_video_seconds: f64,
    pub generation_timeout: Duration,
    pub output_fps: u32,
    pub caption_font_size: u32,
    pub caption_font_file: Option<PathBuf>,
    pub job_retention: chrono::Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            storage_root: PathBuf::from("storage"),
            public_base_url: "http://localhost:5000".to_string(),
            speech_engine_url: "http://127.0.0.1:9880".to_string(),
            speaker_profile: "default".to_string(),
            animator_url: "http://127.0.0.1:9881".to_string(),
            shot_video_seconds: 10.0,
            generation_timeout: Duration::from_secs(600),
            output_fps: 24,
            caption_font_size: 50,
            caption_font_file: None,
            job_retention: chrono::Duration::hours(24),
        }
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn positive<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse::<T>(key, raw)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = get("STORAGE_ROOT") {
            config.storage_root = PathBuf::from(v);
        }
        if let Some(v) = get("PUBLIC_BASE_URL") {
            config.public_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("SPEECH_ENGINE_URL") {
            config.speech_engine_url = v;
        }
        if let Some(v) = get("SPEAKER_PROFILE") {
            config.speaker_profile = v;
        }
        if let Some(v) = get("ANIMATOR_URL") {
            config.animator_url = v;
        }
        if let Some(v) = get("SHOT_VIDEO_SECONDS") {
            config.shot_video_seconds = positive("SHOT_VIDEO_SECONDS", &v)?;
        }
        if let Some(v) = get("GENERATION_TIMEOUT_SECS") {
            config.generation_timeout =
                Duration::from_secs(positive("GENERATION_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("OUTPUT_FPS") {
            config.output_fps = positive("OUTPUT_FPS", &v)?;
        }
        if let Some(v) = get("CAPTION_FONT_SIZE") {
            config.caption_font_size = positive("CAPTION_FONT_SIZE", &v)?;
        }
        if let Some(v) = get("CAPTION_FONT_FILE") {
            config.caption_font_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("JOB_RETENTION_HOURS") {
            config.job_retention = chrono::Duration::hours(positive("JOB_RETENTION_HOURS", &v)?);
        }

        Ok(config)
    }

    pub fn caption_style(&self) -> CaptionStyle {
        CaptionStyle {
            font_size: self.caption_font_size,
            font_file: self.caption_font_file.clone(),
            ..CaptionStyle::default()
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            shot_video_seconds: self.shot_video_seconds,
            call_timeout: self.generation_timeout,
            public_base_url: Some(self.public_base_url.clone()),
            caption_style: self.caption_style(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.shot_video_seconds, 10.0);
        assert_eq!(config.generation_timeout, Duration::from_secs(600));
        assert_eq!(config.job_retention, chrono::Duration::hours(24));
        assert!(config.caption_font_file.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STORAGE_ROOT", "/srv/media"),
            ("PUBLIC_BASE_URL", "https://cdn.example.com/"),
            ("SHOT_VIDEO_SECONDS", "6.5"),
            ("OUTPUT_FPS", " 30 "),
            ("CAPTION_FONT_FILE", "/fonts/Arial.ttf"),
            ("GENERATION_TIMEOUT_SECS", ""),
        ]))
        .unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/srv/media"));
        assert_eq!(config.public_base_url, "https://cdn.example.com");
        assert_eq!(config.shot_video_seconds, 6.5);
        assert_eq!(config.output_fps, 30);
        assert_eq!(config.generation_timeout, Duration::from_secs(600));

        let settings = config.orchestrator_settings();
        assert_eq!(
            settings.caption_style.font_file,
            Some(PathBuf::from("/fonts/Arial.ttf"))
        );
        assert_eq!(settings.public_base_url.as_deref(), Some("https://cdn.example.com"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("OUTPUT_FPS", "fast")])).unwrap_err();
        assert!(err.to_string().contains("OUTPUT_FPS"));
        assert!(AppConfig::from_lookup(lookup(&[("SHOT_VIDEO_SECONDS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("JOB_RETENTION_HOURS", "-3")])).is_err());
    }
}
