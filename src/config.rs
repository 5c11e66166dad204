use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, WhisubError};

fn default_batch_size() -> usize {
    16
}

fn default_pivot_language() -> String {
    "en".to_string()
}

fn default_fallback_on_any_error() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to the speech recognition binary (e.g., whisper)
    pub binary_path: String,
    /// Model name passed to the recognizer
    pub model: String,
    /// Nominal duration of each audio chunk in seconds
    pub chunk_seconds: u32,
    /// Language used when a job does not force one ("auto" = detect)
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Base URL of the translation model server
    pub endpoint: String,
    /// Model name template; `{src}` and `{tgt}` are replaced by language codes
    pub model_template: String,
    /// Number of texts sent per engine call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Intermediate language used when no direct model exists
    #[serde(default = "default_pivot_language")]
    pub pivot_language: String,
    /// Fall back to the pivot route on any direct failure, not only on a missing model
    #[serde(default = "default_fallback_on_any_error")]
    pub fallback_on_any_error: bool,
    /// HTTP timeout for a single engine call
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Sample rate of produced chunks
    pub sample_rate: u32,
    /// Channel count of produced chunks
    pub channels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Root directory holding one working directory per job
    pub data_dir: PathBuf,
    /// Largest accepted source file
    pub max_upload_mb: u64,
    /// Optional wall-clock limit for a single transcription job
    pub job_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig {
                binary_path: "whisper".to_string(),
                model: "small".to_string(),
                chunk_seconds: 30,
                default_language: "auto".to_string(),
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:8765".to_string(),
                model_template: "Helsinki-NLP/opus-mt-{src}-{tgt}".to_string(),
                batch_size: default_batch_size(),
                pivot_language: default_pivot_language(),
                fallback_on_any_error: default_fallback_on_any_error(),
                timeout_secs: 300,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                sample_rate: 16000,
                channels: 1,
            },
            jobs: JobsConfig {
                data_dir: std::env::temp_dir().join("jobs"),
                max_upload_mb: 2048,
                job_timeout_secs: None,
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WhisubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| WhisubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WhisubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| WhisubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply deployment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CHUNK_SECONDS") {
            self.transcriber.chunk_seconds = parse_number("CHUNK_SECONDS", &value)?;
        }
        if let Some(value) = lookup("WHISPER_MODEL") {
            self.transcriber.model = value;
        }
        if let Some(value) = lookup("DEFAULT_LANG") {
            self.transcriber.default_language = value;
        }
        if let Some(value) = lookup("DATA_DIR") {
            self.jobs.data_dir = PathBuf::from(value).join("jobs");
        }
        if let Some(value) = lookup("MAX_UPLOAD_MB") {
            self.jobs.max_upload_mb = parse_number("MAX_UPLOAD_MB", &value)?;
        }
        if let Some(value) = lookup("TRANSLATE_ENDPOINT") {
            self.translate.endpoint = value;
        }

        if self.transcriber.chunk_seconds == 0 {
            return Err(WhisubError::Config("chunk_seconds must be positive".to_string()));
        }
        if self.translate.batch_size == 0 {
            return Err(WhisubError::Config("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WhisubError::Config(format!("{} must be a number, got '{}'", key, value)))
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
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("CHUNK_SECONDS", "45"), ("DATA_DIR", "/srv/data"), ("WHISPER_MODEL", "tiny")]))
            .unwrap();

        assert_eq!(config.transcriber.chunk_seconds, 45);
        assert_eq!(config.transcriber.model, "tiny");
        assert_eq!(config.jobs.data_dir, PathBuf::from("/srv/data/jobs"));
        assert_eq!(config.jobs.max_upload_mb, 2048);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_overrides(lookup(&[("CHUNK_SECONDS", "half")])).unwrap_err();
        assert!(matches!(err, WhisubError::Config(_)));

        let err = config.apply_overrides(lookup(&[("CHUNK_SECONDS", "0")])).unwrap_err();
        assert!(matches!(err, WhisubError::Config(_)));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whisub.toml");

        let mut config = Config::default();
        config.translate.batch_size = 8;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.batch_size, 8);
        assert_eq!(loaded.transcriber.chunk_seconds, 30);
    }
}
