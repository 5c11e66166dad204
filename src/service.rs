use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, WhisubError};
use crate::jobs::{Job, JobId, JobRegistry, ProgressReport};
use crate::media::{MediaSplitter, MediaSplitterFactory};
use crate::transcribe::{SpeechEngineFactory, SpeechEngineLoader, TranscriptionPipeline};
use crate::translate::{TranslationEngineFactory, TranslationPipeline, TranslatorFactory, AUTO_LANGUAGE};

/// Entry point for front ends: submit media, poll jobs, fetch and translate results.
pub struct SubtitleService {
    config: Config,
    registry: JobRegistry,
    splitter: Arc<dyn MediaSplitter>,
    transcription: Arc<TranscriptionPipeline>,
    translation: TranslationPipeline,
    shutdown: CancellationToken,
}

impl SubtitleService {
    /// Build a service backed by ffmpeg, the whisper CLI and the translation model server
    pub fn new(config: Config) -> Result<Self> {
        let splitter: Arc<dyn MediaSplitter> = MediaSplitterFactory::create_splitter(config.media.clone()).into();
        let loader: Arc<dyn SpeechEngineLoader> =
            SpeechEngineFactory::create_loader(config.transcriber.clone()).into();
        let translators: Arc<dyn TranslationEngineFactory> =
            TranslatorFactory::create_factory(config.translate.clone())?.into();

        Ok(Self::with_components(config, splitter, loader, translators))
    }

    pub fn with_components(
        config: Config,
        splitter: Arc<dyn MediaSplitter>,
        loader: Arc<dyn SpeechEngineLoader>,
        translators: Arc<dyn TranslationEngineFactory>,
    ) -> Self {
        let registry = JobRegistry::new();
        let transcription = TranscriptionPipeline::new(
            registry.clone(),
            splitter.clone(),
            loader,
            config.transcriber.chunk_seconds,
        )
        .with_timeout(config.jobs.job_timeout_secs.map(Duration::from_secs));
        let translation = TranslationPipeline::new(translators, &config.translate);

        Self {
            config,
            registry,
            splitter,
            transcription: Arc::new(transcription),
            translation,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check that the media tool can be executed
    pub async fn check_health(&self) -> Result<()> {
        self.splitter.check_availability().await
    }

    /// Copy `source_path` into a fresh job directory and start transcribing it in the background.
    ///
    /// `forced_language` of `None` uses the configured default; "auto" means detect.
    pub async fn submit(&self, source_path: &Path, forced_language: Option<&str>) -> Result<JobId> {
        let metadata = fs::metadata(source_path)
            .await
            .map_err(|_| WhisubError::NotFound(source_path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(WhisubError::Validation(format!("{} is not a file", source_path.display())));
        }

        let max_bytes = self.config.jobs.max_upload_mb.saturating_mul(1024 * 1024);
        if metadata.len() > max_bytes {
            return Err(WhisubError::Validation(format!(
                "file is larger than {} MB",
                self.config.jobs.max_upload_mb
            )));
        }

        let file_name = source_path
            .file_name()
            .ok_or_else(|| WhisubError::Validation("source has no file name".to_string()))?;

        let forced_language = forced_language
            .map(str::to_string)
            .unwrap_or_else(|| self.config.transcriber.default_language.clone());
        let job_id = self.registry.create_with_language(Some(forced_language));

        let job_dir = self.job_dir(&job_id.to_string());
        let staged_path = job_dir.join(file_name);
        let staged = async {
            fs::create_dir_all(&job_dir).await?;
            fs::copy(source_path, &staged_path).await?;
            Ok::<_, WhisubError>(())
        }
        .await;
        if let Err(e) = staged {
            self.registry.fail(job_id, e.to_string());
            return Err(e);
        }

        info!("Job {} queued for {}", job_id, source_path.display());

        let pipeline = self.transcription.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            pipeline.run(job_id, &staged_path, cancel).await;
        });

        Ok(job_id)
    }

    pub fn job(&self, job_id: JobId) -> Result<Job> {
        self.registry.get(job_id)
    }

    pub fn progress(&self, job_id: JobId) -> Result<ProgressReport> {
        self.registry.progress(job_id)
    }

    /// Location of a finished job's subtitle track
    pub fn subtitle_path(&self, job_id: JobId) -> Result<PathBuf> {
        let job = self.registry.get(job_id)?;
        match job.subtitle_path {
            Some(path) if job.error.is_none() => Ok(path),
            _ => Err(WhisubError::NotFound(format!("subtitles for job {} are not ready", job_id))),
        }
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait(&self, job_id: JobId, poll_interval: Duration) -> Result<Job> {
        loop {
            let job = self.registry.get(job_id)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Translate a finished job's track; written next to it as `output.<lang>.srt`
    pub async fn translate_job(&self, job_id: JobId, target_lang: &str) -> Result<PathBuf> {
        validate_language_code(target_lang)?;
        let subtitle_path = self.subtitle_path(job_id)?;
        let source_lang = self.registry.get(job_id)?.translation_source_language();

        let output_path = translated_file_path(&subtitle_path, target_lang);
        self.translate_to(&subtitle_path, &output_path, &source_lang, target_lang).await?;
        Ok(output_path)
    }

    /// Location of a previously produced translation
    pub fn translated_path(&self, job_id: JobId, lang: &str) -> Result<PathBuf> {
        validate_language_code(lang)?;
        let path = translated_file_path(&self.subtitle_path(job_id)?, lang);
        if path.is_file() {
            Ok(path)
        } else {
            Err(WhisubError::NotFound(format!("no {} translation for job {}", lang, job_id)))
        }
    }

    /// Translate an arbitrary subtitle file in its own working directory
    pub async fn translate_file(
        &self,
        srt_path: &Path,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> Result<PathBuf> {
        validate_language_code(target_lang)?;
        if !srt_path.is_file() {
            return Err(WhisubError::NotFound(srt_path.display().to_string()));
        }
        let file_name = srt_path
            .file_name()
            .ok_or_else(|| WhisubError::Validation("subtitle file has no name".to_string()))?;

        let work_dir = self.job_dir(&Uuid::new_v4().to_string());
        fs::create_dir_all(&work_dir).await?;
        let staged = work_dir.join(file_name);
        fs::copy(srt_path, &staged).await?;

        let output_path = translated_file_path(&staged, target_lang);
        self.translate_to(&staged, &output_path, source_lang.unwrap_or(AUTO_LANGUAGE), target_lang)
            .await?;
        Ok(output_path)
    }

    pub async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        self.splitter.probe_duration(media_path).await
    }

    /// Cancel every running job
    pub fn shutdown(&self) {
        warn!("Cancelling all running jobs");
        self.shutdown.cancel();
    }

    async fn translate_to(&self, input: &Path, output: &Path, source_lang: &str, target_lang: &str) -> Result<()> {
        let srt = fs::read_to_string(input).await?;
        let translated = self
            .translation
            .translate_with_cancel(&srt, source_lang, target_lang, &self.shutdown)
            .await?;
        fs::write(output, translated).await?;
        info!("Translation written to {}", output.display());
        Ok(())
    }

    fn job_dir(&self, name: &str) -> PathBuf {
        self.config.jobs.data_dir.join(name)
    }
}

/// `movie.srt` -> `movie.<lang>.srt`
pub fn translated_file_path(subtitle_path: &Path, lang: &str) -> PathBuf {
    subtitle_path.with_extension(format!("{}.srt", lang))
}

fn validate_language_code(code: &str) -> Result<()> {
    let valid = !code.is_empty()
        && code.len() <= 16
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid && code != AUTO_LANGUAGE {
        Ok(())
    } else {
        Err(WhisubError::Validation(format!("invalid language code '{}'", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translated_file_path() {
        assert_eq!(
            translated_file_path(Path::new("/jobs/a/output.srt"), "de"),
            PathBuf::from("/jobs/a/output.de.srt")
        );
    }

    #[test]
    fn test_validate_language_code() {
        assert!(validate_language_code("de").is_ok());
        assert!(validate_language_code("zh-TW").is_ok());
        assert!(validate_language_code("auto").is_err());
        assert!(validate_language_code("").is_err());
        assert!(validate_language_code("../etc").is_err());
    }
}
