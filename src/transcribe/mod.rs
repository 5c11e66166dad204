// Speech recognition seam and the chunked transcription pipeline.
//
// - WhisperCli: runs the whisper command line tool on one chunk at a time
// - Pipeline: splits a job's media, drives the engine over every chunk and
//   stitches the results onto one timeline
//
// To add another recognizer, implement SpeechEngine for a per-job handle and
// SpeechEngineLoader for whatever builds it, then extend the factory.

pub mod whisper_cli;
pub mod pipeline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use pipeline::TranscriptionPipeline;
use crate::config::TranscriberConfig;
use crate::error::EngineError;

/// A recognized span, relative to the start of its chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSpan {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Engine output for one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub language: Option<String>,
    pub spans: Vec<RecognizedSpan>,
}

/// A loaded recognizer.
///
/// Handles are owned by a single job and called once per chunk, strictly in
/// sequence, hence `&mut self` and no `Sync` bound. Whether model weights stay
/// resident between calls is up to the backend: the whisper CLI handle starts a
/// process per chunk and so reloads the model each time.
#[async_trait]
pub trait SpeechEngine: Send {
    /// Recognize speech in one audio chunk. `language` is a hint; `None` means detect.
    async fn transcribe(
        &mut self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> std::result::Result<Recognition, EngineError>;
}

/// Builds engine handles. Loading is paid once per job, not per chunk.
#[async_trait]
pub trait SpeechEngineLoader: Send + Sync {
    async fn load(&self) -> std::result::Result<Box<dyn SpeechEngine>, EngineError>;
}

/// Factory for creating speech engine loaders
pub struct SpeechEngineFactory;

impl SpeechEngineFactory {
    /// Create the default loader (whisper command line tool)
    pub fn create_loader(config: TranscriberConfig) -> Box<dyn SpeechEngineLoader> {
        Box::new(whisper_cli::WhisperCliLoader::new(config))
    }
}
