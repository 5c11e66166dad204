use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, WhisubError};
use super::{Chunk, MediaCommandBuilder, MediaSplitter};

const CHUNK_PREFIX: &str = "chunk_";
const CHUNK_EXTENSION: &str = "wav";

/// ffmpeg/ffprobe backed splitter
pub struct FfmpegSplitter {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegSplitter {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaSplitter for FfmpegSplitter {
    async fn split(
        &self,
        source_path: &Path,
        destination_dir: &Path,
        segment_seconds: u32,
    ) -> Result<Vec<Chunk>> {
        if segment_seconds == 0 {
            return Err(WhisubError::Media("segment length must be positive".to_string()));
        }

        info!(
            "Splitting {} into {}s chunks under {}",
            source_path.display(),
            segment_seconds,
            destination_dir.display()
        );

        fs::create_dir_all(destination_dir).await?;
        let pattern = destination_dir.join(format!("{}%04d.{}", CHUNK_PREFIX, CHUNK_EXTENSION));

        self.command_builder
            .split_audio(
                source_path,
                pattern.as_path(),
                segment_seconds,
                self.config.sample_rate,
                self.config.channels,
            )
            .execute()
            .await?;

        let chunks = collect_chunks(destination_dir, segment_seconds).await?;
        if chunks.is_empty() {
            return Err(WhisubError::Media(format!(
                "no audio could be extracted from {}",
                source_path.display()
            )));
        }

        info!("Created {} audio chunks", chunks.len());
        Ok(chunks)
    }

    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        let stdout = self.command_builder.probe_duration(media_path).execute().await?;
        parse_duration(&stdout)
    }

    async fn check_availability(&self) -> Result<()> {
        let version = self.command_builder.version_check().execute().await?;
        debug!("Media tool: {}", version.lines().next().unwrap_or("unknown version"));
        Ok(())
    }
}

/// List chunk files in `dir`, ordered by their zero-padded sequence number.
pub async fn collect_chunks(dir: &Path, segment_seconds: u32) -> Result<Vec<Chunk>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_chunk = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(CHUNK_PREFIX) && name.ends_with(&format!(".{}", CHUNK_EXTENSION)))
            .unwrap_or(false);
        if is_chunk {
            paths.push(path);
        }
    }

    paths.sort();

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| Chunk {
            index,
            path,
            nominal_seconds: segment_seconds,
        })
        .collect())
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let text = stdout.trim();
    text.parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| WhisubError::Media(format!("unparsable duration '{}'", text)))
}
