// Media processing: cutting a source into fixed-length PCM chunks and probing durations.
//
// - Commands: builders for ffmpeg / ffprobe invocations
// - Splitter: the ffmpeg-backed implementation of MediaSplitter

pub mod commands;
pub mod splitter;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use splitter::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// A fixed-duration slice of the source audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position in the source
    pub index: usize,
    pub path: PathBuf,
    /// Nominal length; the final chunk may be shorter
    pub nominal_seconds: u32,
}

impl Chunk {
    /// Start of this chunk on the global timeline
    pub fn offset_seconds(&self) -> f64 {
        self.index as f64 * self.nominal_seconds as f64
    }
}

/// Main trait for media splitting operations
#[async_trait]
pub trait MediaSplitter: Send + Sync {
    /// Cut `source_path` into mono PCM chunks of `segment_seconds` inside a fresh
    /// `destination_dir`. Chunks are returned in temporal order.
    async fn split(
        &self,
        source_path: &Path,
        destination_dir: &Path,
        segment_seconds: u32,
    ) -> Result<Vec<Chunk>>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Check if the media tool is available
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media splitter instances
pub struct MediaSplitterFactory;

impl MediaSplitterFactory {
    /// Create the default splitter implementation (FFmpeg-based)
    pub fn create_splitter(config: MediaConfig) -> Box<dyn MediaSplitter> {
        Box::new(splitter::FfmpegSplitter::new(config))
    }
}
