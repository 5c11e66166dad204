//! Whisub - chunked media transcription jobs and subtitle translation
//!
//! Splits long media into fixed-length chunks, runs speech recognition over each
//! one while reporting progress, stitches the results into a single SRT track,
//! and translates tracks through a direct or English-pivot model route.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod media;
pub mod service;
pub mod subtitle;
pub mod transcribe;
pub mod translate;

pub use config::Config;
pub use error::{EngineError, Result, WhisubError};
pub use jobs::{Job, JobId, JobRegistry, JobStatus, ProgressReport};
pub use service::SubtitleService;
