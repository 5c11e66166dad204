use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::TranscriberConfig;
use crate::error::EngineError;
use super::{Recognition, RecognizedSpan, SpeechEngine, SpeechEngineLoader};

/// Whisper CLI JSON output format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCliOutput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<WhisperCliSegment>,
    pub language: Option<String>,
}

/// Whisper CLI segment format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCliSegment {
    #[serde(default)]
    pub id: u64,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl From<WhisperCliOutput> for Recognition {
    fn from(output: WhisperCliOutput) -> Self {
        Self {
            language: output.language.filter(|l| !l.is_empty()),
            spans: output
                .segments
                .into_iter()
                .map(|seg| RecognizedSpan {
                    start: seg.start,
                    end: seg.end,
                    text: seg.text,
                })
                .collect(),
        }
    }
}

/// Checks the binary once and hands out per-job handles.
///
/// Only the executable check happens here; each chunk still runs its own
/// whisper process, which loads the model again.
pub struct WhisperCliLoader {
    config: TranscriberConfig,
}

impl WhisperCliLoader {
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SpeechEngineLoader for WhisperCliLoader {
    async fn load(&self) -> Result<Box<dyn SpeechEngine>, EngineError> {
        let output = Command::new(&self.config.binary_path)
            .arg("--help")
            .output()
            .await
            .map_err(|e| EngineError::ModelUnavailable(format!("{}: {}", self.config.binary_path, e)))?;

        if !output.status.success() {
            return Err(EngineError::ModelUnavailable(format!(
                "{} is not usable",
                self.config.binary_path
            )));
        }

        info!("Using whisper model '{}'", self.config.model);
        Ok(Box::new(WhisperCliEngine {
            binary_path: self.config.binary_path.clone(),
            model: self.config.model.clone(),
        }))
    }
}

/// One whisper process per chunk, JSON output read back from a temp directory
pub struct WhisperCliEngine {
    binary_path: String,
    model: String,
}

impl WhisperCliEngine {
    fn build_command(&self, audio_path: &Path, output_dir: &Path, language: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg(audio_path)
            .arg("--model").arg(&self.model)
            .arg("--task").arg("transcribe")
            .arg("--output_dir").arg(output_dir)
            .arg("--output_format").arg("json")
            .arg("--verbose").arg("False")
            .kill_on_drop(true);

        if let Some(lang) = language {
            cmd.arg("--language").arg(lang);
        }
        cmd
    }
}

#[async_trait]
impl SpeechEngine for WhisperCliEngine {
    async fn transcribe(
        &mut self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<Recognition, EngineError> {
        debug!("Transcribing chunk {}", audio_path.display());

        let temp_dir = tempfile::tempdir()
            .map_err(|e| EngineError::Failed(format!("Failed to create temp directory: {}", e)))?;
        let output_dir = temp_dir.path();

        let output = self
            .build_command(audio_path, output_dir, language)
            .output()
            .await
            .map_err(|e| EngineError::Failed(format!("Failed to execute whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed(format!("Whisper failed: {}", stderr.trim())));
        }

        let json_file = json_output_path(audio_path, output_dir)?;
        let json_content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| EngineError::Failed(format!("Failed to read output: {}", e)))?;

        parse_output(&json_content)
    }
}

fn json_output_path(audio_path: &Path, output_dir: &Path) -> Result<PathBuf, EngineError> {
    let stem = audio_path
        .file_stem()
        .ok_or_else(|| EngineError::Failed("Invalid audio filename".to_string()))?;
    Ok(output_dir.join(format!("{}.json", stem.to_string_lossy())))
}

fn parse_output(json_content: &str) -> Result<Recognition, EngineError> {
    let output: WhisperCliOutput = serde_json::from_str(json_content)
        .map_err(|e| EngineError::Failed(format!("Failed to parse whisper JSON: {}", e)))?;
    Ok(output.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        let json = r#"{
            "text": " Hallo Welt. Wie geht's?",
            "segments": [
                {"id": 0, "seek": 0, "start": 0.0, "end": 2.5, "text": " Hallo Welt.", "tokens": [1, 2]},
                {"id": 1, "seek": 0, "start": 2.5, "end": 4.0, "text": " Wie geht's?"}
            ],
            "language": "de"
        }"#;

        let recognition = parse_output(json).unwrap();
        assert_eq!(recognition.language.as_deref(), Some("de"));
        assert_eq!(recognition.spans.len(), 2);
        assert_eq!(recognition.spans[1].start, 2.5);
        assert_eq!(recognition.spans[1].text, " Wie geht's?");
    }

    #[test]
    fn test_parse_output_rejects_garbage() {
        assert!(matches!(parse_output("not json"), Err(EngineError::Failed(_))));
    }

    #[test]
    fn test_json_output_path_uses_stem() {
        let path = json_output_path(Path::new("/jobs/a/chunks/chunk_0003.wav"), Path::new("/tmp/out")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/out/chunk_0003.json"));
    }

    #[tokio::test]
    async fn test_loader_reports_missing_binary() {
        let loader = WhisperCliLoader::new(TranscriberConfig {
            binary_path: "/nonexistent/whisper".to_string(),
            model: "tiny".to_string(),
            chunk_seconds: 30,
            default_language: "auto".to_string(),
        });

        assert!(matches!(loader.load().await, Err(EngineError::ModelUnavailable(_))));
    }
}
