use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, WhisubError};
use crate::jobs::{JobId, JobRegistry, JobStatus};
use crate::media::MediaSplitter;
use crate::subtitle::{self, Segment};
use super::{Recognition, SpeechEngineLoader};

pub const OUTPUT_FILE_NAME: &str = "output.srt";
const CHUNKS_DIR_NAME: &str = "chunks";

// Progress window reserved for per-chunk recognition.
const TRANSCRIBE_START_PCT: f64 = 30.0;
const TRANSCRIBE_SPAN_PCT: f64 = 65.0;

/// Drives one job from source media to a saved subtitle track.
///
/// Chunks go through the engine strictly one after another; the engine handle
/// is loaded once per job and never shared.
pub struct TranscriptionPipeline {
    registry: JobRegistry,
    splitter: Arc<dyn MediaSplitter>,
    loader: Arc<dyn SpeechEngineLoader>,
    chunk_seconds: u32,
    timeout: Option<Duration>,
}

impl TranscriptionPipeline {
    pub fn new(
        registry: JobRegistry,
        splitter: Arc<dyn MediaSplitter>,
        loader: Arc<dyn SpeechEngineLoader>,
        chunk_seconds: u32,
    ) -> Self {
        Self {
            registry,
            splitter,
            loader,
            chunk_seconds,
            timeout: None,
        }
    }

    /// Fail jobs that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a queued job to a terminal state.
    ///
    /// The job's working directory is the directory holding `source_path`.
    /// Every failure ends up in [`JobRegistry::fail`]; nothing is left running.
    pub async fn run(&self, job_id: JobId, source_path: &Path, cancel: CancellationToken) {
        if let Err(e) = self.registry.set_status(job_id, JobStatus::Running) {
            warn!("Job {} cannot start: {}", job_id, e);
            return;
        }
        info!("Job {} started for {}", job_id, source_path.display());

        let job_dir = source_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let chunks_dir = job_dir.join(CHUNKS_DIR_NAME);

        let work = self.transcribe(job_id, source_path, &job_dir, &chunks_dir, &cancel);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(WhisubError::Cancelled(format!("job exceeded {:?} limit", limit))),
            },
            None => work.await,
        };

        if let Err(e) = tokio::fs::remove_dir_all(&chunks_dir).await {
            debug!("Chunk cleanup for job {} skipped: {}", job_id, e);
        }

        match result {
            Ok(subtitle_path) => {
                info!("Job {} finished: {}", job_id, subtitle_path.display());
                self.registry.complete(job_id, subtitle_path, "Done");
            }
            Err(e) => self.registry.fail(job_id, e.to_string()),
        }
    }

    async fn transcribe(
        &self,
        job_id: JobId,
        source_path: &Path,
        job_dir: &Path,
        chunks_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.registry.set_progress(job_id, 5.0, "Analyzing media");
        let language_hint = self.language_hint(job_id)?;

        self.registry.set_progress(job_id, 15.0, "Extracting audio and splitting into chunks");
        let chunks = until_cancelled(
            cancel,
            "splitting",
            self.splitter.split(source_path, chunks_dir, self.chunk_seconds),
        )
        .await??;
        if chunks.is_empty() {
            return Err(WhisubError::Media("no audio could be extracted".to_string()));
        }

        self.registry.set_progress(job_id, 25.0, "Loading speech model");
        let mut engine = until_cancelled(cancel, "model loading", self.loader.load()).await??;

        self.registry.set_progress(job_id, TRANSCRIBE_START_PCT, "Transcribing");
        let total = chunks.len();
        let mut segments: Vec<Segment> = Vec::new();

        for (position, chunk) in chunks.iter().enumerate() {
            let i = position + 1;
            let recognition = until_cancelled(
                cancel,
                "transcription",
                engine.transcribe(&chunk.path, language_hint.as_deref()),
            )
            .await??;

            if i == 1 {
                self.registry.set_source_language(job_id, recognition.language.clone());
            }

            segments.extend(place_on_timeline(recognition, chunk.offset_seconds()));

            let pct = TRANSCRIBE_START_PCT + TRANSCRIBE_SPAN_PCT * (i as f64 / total as f64);
            self.registry.set_progress(job_id, pct, format!("Transcribing {}/{}", i, total));
            debug!("Job {} chunk {}/{} done, {} segments so far", job_id, i, total, segments.len());
        }

        self.registry.set_progress(job_id, 96.0, "Saving subtitles");
        let subtitle_path = job_dir.join(OUTPUT_FILE_NAME);
        subtitle::write_srt(&segments, &subtitle_path).await?;

        Ok(subtitle_path)
    }

    fn language_hint(&self, job_id: JobId) -> Result<Option<String>> {
        let job = self.registry.get(job_id)?;
        Ok(job.forced_language.filter(|lang| !lang.is_empty() && lang != "auto"))
    }
}

/// Shift chunk-relative spans by `offset` seconds onto the job's timeline.
pub fn place_on_timeline(recognition: Recognition, offset: f64) -> impl Iterator<Item = Segment> {
    recognition.spans.into_iter().filter_map(move |span| {
        let text = span.text.trim();
        if text.is_empty() {
            return None;
        }
        let start = span.start + offset;
        let end = (span.end + offset).max(start);
        Some(Segment::new(start, end, text))
    })
}

async fn until_cancelled<F, T>(cancel: &CancellationToken, stage: &str, work: F) -> Result<T>
where
    F: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(WhisubError::Cancelled(format!("cancelled before {}", stage)));
    }
    tokio::select! {
        output = work => Ok(output),
        _ = cancel.cancelled() => Err(WhisubError::Cancelled(format!("cancelled during {}", stage))),
    }
}
