use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, WhisubError};

/// External media tool invocation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Cut output into fixed-length pieces using the segment muxer
    pub fn segment_time(self, seconds: u32) -> Self {
        self.arg("-f").arg("segment").arg("-segment_time").arg(seconds.to_string())
    }

    /// Execute the command, returning its standard output
    pub async fn execute(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WhisubError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WhisubError::Media(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builder for the media operations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    /// Build the command that decodes a source into numbered PCM chunks
    pub fn split_audio<P: AsRef<Path>>(
        &self,
        source_path: P,
        output_pattern: P,
        segment_seconds: u32,
        sample_rate: u32,
        channels: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio splitting")
            .overwrite()
            .input(source_path)
            .no_video()
            .audio_channels(channels)
            .audio_sample_rate(sample_rate)
            .segment_time(segment_seconds)
            .audio_codec("pcm_s16le")
            .output(output_pattern)
    }

    /// Build the command that prints a container's duration in seconds
    pub fn probe_duration<P: AsRef<Path>>(&self, media_path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Duration probe")
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "default=nw=1:nk=1"])
            .arg(media_path.as_ref().to_string_lossy().to_string())
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_audio_arguments() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.split_audio(
            Path::new("/jobs/a/movie.mp4"),
            Path::new("/jobs/a/chunks/chunk_%04d.wav"),
            30,
            16000,
            1,
        );

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-y", "-i", "/jobs/a/movie.mp4", "-vn", "-ac", "1", "-ar", "16000",
                "-f", "segment", "-segment_time", "30", "-c:a", "pcm_s16le",
                "/jobs/a/chunks/chunk_%04d.wav",
            ]
        );
    }

    #[test]
    fn test_probe_arguments() {
        let builder = MediaCommandBuilder::new("ffmpeg", "/opt/bin/ffprobe");
        let cmd = builder.probe_duration("clip.mkv");

        assert_eq!(cmd.binary_path, "/opt/bin/ffprobe");
        assert_eq!(cmd.args.last().map(String::as_str), Some("clip.mkv"));
        assert!(cmd.args.contains(&"format=duration".to_string()));
    }

    #[tokio::test]
    async fn test_execute_reports_nonzero_exit() {
        let err = MediaCommand::new("false", "Always failing").execute().await.unwrap_err();
        match err {
            WhisubError::Media(msg) => assert!(msg.starts_with("Always failing failed")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_reports_missing_binary() {
        let err = MediaCommand::new("/nonexistent/whisub-tool", "Missing").execute().await.unwrap_err();
        assert!(matches!(err, WhisubError::Media(_)));
    }
}
