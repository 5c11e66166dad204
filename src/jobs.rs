//! In-memory job registry.
//!
//! Every job is written by the single worker that runs it and read by any number
//! of status pollers. All access goes through one `RwLock`, so readers always get
//! a consistent snapshot of a job's fields.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, WhisubError};

const MAX_RUNNING_PROGRESS: u8 = 99;

/// Opaque job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    // `failed` is only reachable through `JobRegistry::fail`, which also records the error.
    fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!((self, next), (Self::Queued, Self::Running) | (Self::Running, Self::Done))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// 0-100, never decreases
    pub progress: u8,
    pub message: String,
    /// Language reported by the recognizer for the first chunk
    pub source_language: Option<String>,
    /// Language requested at submission ("auto" = detect)
    pub forced_language: Option<String>,
    pub subtitle_path: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn new(id: JobId, forced_language: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            message: "Preparing".to_string(),
            source_language: None,
            forced_language,
            subtitle_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once a subtitle track has been produced without error
    pub fn is_ready(&self) -> bool {
        self.subtitle_path.is_some() && self.error.is_none()
    }

    /// Language to translate this job's track from
    pub fn translation_source_language(&self) -> String {
        self.source_language
            .clone()
            .or_else(|| self.forced_language.clone())
            .unwrap_or_else(|| "auto".to_string())
    }
}

/// What a polling client sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub ready: bool,
    pub error: Option<String>,
}

impl From<&Job> for ProgressReport {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            ready: job.is_ready(),
            error: job.error.clone(),
        }
    }
}

/// Concurrency-safe map from job id to job state
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh queued job
    pub fn create(&self) -> JobId {
        self.create_with_language(None)
    }

    pub fn create_with_language(&self, forced_language: Option<String>) -> JobId {
        let id = JobId::new();
        self.jobs.write().insert(id, Job::new(id, forced_language));
        debug!("Created job {}", id);
        id
    }

    /// Snapshot of a job
    pub fn get(&self, id: JobId) -> Result<Job> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| WhisubError::NotFound(format!("job {}", id)))
    }

    pub fn progress(&self, id: JobId) -> Result<ProgressReport> {
        self.jobs
            .read()
            .get(&id)
            .map(ProgressReport::from)
            .ok_or_else(|| WhisubError::NotFound(format!("job {}", id)))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Clamp to [0, 100], round, and never move backwards. No-op for unknown or finished jobs.
    ///
    /// Unfinished jobs stop at 99; only [`complete`](Self::complete) and [`fail`](Self::fail) reach 100.
    pub fn set_progress(&self, id: JobId, pct: f64, message: impl Into<String>) {
        let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0).round() };
        let pct = (pct as u8).min(MAX_RUNNING_PROGRESS);
        self.update(id, |job| {
            job.progress = job.progress.max(pct);
            job.message = message.into();
        });
    }

    pub fn set_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| WhisubError::NotFound(format!("job {}", id)))?;

        if job.status == status {
            return Ok(());
        }
        if !job.status.can_transition_to(status) {
            return Err(WhisubError::InvalidTransition {
                from: job.status.to_string(),
                to: status.to_string(),
            });
        }

        job.status = status;
        if status.is_terminal() {
            job.progress = 100;
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_source_language(&self, id: JobId, language: Option<String>) {
        self.update(id, |job| job.source_language = language);
    }

    /// Record the produced track without changing status
    pub fn set_result(&self, id: JobId, subtitle_path: PathBuf) {
        self.update(id, |job| job.subtitle_path = Some(subtitle_path));
    }

    /// Record the produced track and finish the job in a single step.
    pub fn complete(&self, id: JobId, subtitle_path: PathBuf, message: impl Into<String>) {
        self.update(id, |job| {
            job.subtitle_path = Some(subtitle_path);
            job.progress = 100;
            job.message = message.into();
            job.status = JobStatus::Done;
        });
    }

    /// Move a job to `failed` with a readable message. Terminal jobs are left alone.
    pub fn fail(&self, id: JobId, error_text: impl Into<String>) {
        let error_text = error_text.into();
        warn!("Job {} failed: {}", id, error_text);
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.progress = 100;
            job.message = format!("Error: {}", error_text);
            job.error = Some(error_text);
        });
    }

    fn update<F>(&self, id: JobId, f: F)
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(&id) {
            if job.status.is_terminal() {
                debug!("Ignoring update to finished job {}", id);
                return;
            }
            f(job);
            job.updated_at = Utc::now();
        }
    }
}
